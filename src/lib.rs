//! Fleet Resource Client
//!
//! A typed client for the fleet management resource-state service. Every
//! resource kind (clusters, machines, machine sets, config patches, ...) is
//! served by one generic code path; adding a kind is one registration.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Per-Kind Facades                                  │
//! │   KindClient<ClusterSpec>   KindClient<MachineSpec> (lock/unlock)  ...   │
//! │              declarative WriteAction guards                              │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                     Generic Resource Client                              │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────────────┐  │
//! │  │ Type         │  │ Write Gate   │  │ Get / List / Watch / Create   │  │
//! │  │ Registry     │  │ (read-only   │  │ Update / Delete / Apply       │  │
//! │  │ (dashmap)    │  │  veto)       │  │ DeleteMany / ApplyYaml / File │  │
//! │  └──────────────┘  └──────────────┘  └───────────────┬───────────────┘  │
//! │                                                      │                   │
//! │                    sign once ─► deadline ─► call ─► decode w/ fallback   │
//! ├──────────────────────────────────────────────────────┼──────────────────┤
//! │                      Transport Ports                 │                   │
//! │   ResourceTransport   TransportConnector   RequestSigner                 │
//! │   MemoryTransport (in-process service emulation)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`client`]: Generic resource client
//! - [`operations`]: Per-kind facades
//! - [`registry`]: Kind to wire-name registry
//! - [`resource`]: Resource, metadata, selector and event model
//! - [`kinds`]: Kinds shipped with the crate
//! - [`gate`]: Read-only write gate
//! - [`transport`]: Transport ports and the in-memory service
//! - [`auth`]: Request signing port
//! - [`config`]: Client configuration
//! - [`metrics`]: Client counters
//! - [`telemetry`]: Logging setup
//! - [`error`]: Error types and handling

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gate;
pub mod kinds;
pub mod metrics;
pub mod operations;
pub mod registry;
pub mod resource;
pub mod telemetry;
pub mod transport;

// Re-export commonly used types
pub use auth::{NoopSigner, RequestSigner, RequestSignerRef, StaticHeaderSigner};

pub use client::{
    DeleteManyReport, EventStream, ListOptions, ResourceClient, ResourceStream, WatchOptions,
};

pub use config::{ClientConfig, LogConfig, TlsConfig};

pub use error::{Code, Error, Result, Status};

pub use gate::{actions, ClientMode, WriteAction, WriteActionKind, WriteGate};

pub use kinds::{
    ClusterSpec, ClusterStatus, ConfigPatchSpec, MachineRole, MachineSetSpec, MachineSetStatus,
    MachineSpec, MachineStatus,
};

pub use metrics::{ClientMetrics, ClientMetricsSnapshot};

pub use operations::KindClient;

pub use registry::TypeRegistry;

pub use resource::{
    EventKind, LabelSelector, Phase, Resource, ResourceEvent, ResourceMetadata, ResourceSpec,
    SpecPayload,
};

pub use transport::{
    MemoryConnector, MemoryTransport, ResourceTransport, SortField, TransportConnector, Verb,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
