//! Transport Ports
//!
//! The resource-state protocol as seen by the client. Adapters implement
//! [`ResourceTransport`] to carry calls to a concrete service; the client only
//! speaks in these wire types.

pub mod memory;

pub use memory::{MemoryConnector, MemoryTransport, TransportCalls};

use crate::auth::RequestMetadata;
use crate::config::TlsConfig;
use crate::error::Result;
use crate::resource::{EventKind, SpecPayload};
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::time::Instant;

// =============================================================================
// Method Paths
// =============================================================================

/// Fully qualified method paths, handed to the request signer
pub mod methods {
    pub const GET: &str = "/fleet.resources.v1.ResourceService/Get";
    pub const LIST: &str = "/fleet.resources.v1.ResourceService/List";
    pub const WATCH: &str = "/fleet.resources.v1.ResourceService/Watch";
    pub const CREATE: &str = "/fleet.resources.v1.ResourceService/Create";
    pub const UPDATE: &str = "/fleet.resources.v1.ResourceService/Update";
    pub const DESTROY: &str = "/fleet.resources.v1.ResourceService/Destroy";
}

/// Transport verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Verb {
    Get,
    List,
    Watch,
    Create,
    Update,
    Destroy,
}

impl Verb {
    pub const ALL: [Verb; 6] = [
        Verb::Get,
        Verb::List,
        Verb::Watch,
        Verb::Create,
        Verb::Update,
        Verb::Destroy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::Get => "Get",
            Verb::List => "List",
            Verb::Watch => "Watch",
            Verb::Create => "Create",
            Verb::Update => "Update",
            Verb::Destroy => "Destroy",
        }
    }

    pub fn method(self) -> &'static str {
        match self {
            Verb::Get => methods::GET,
            Verb::List => methods::LIST,
            Verb::Watch => methods::WATCH,
            Verb::Create => methods::CREATE,
            Verb::Update => methods::UPDATE,
            Verb::Destroy => methods::DESTROY,
        }
    }

    pub fn is_mutation(self) -> bool {
        matches!(self, Verb::Create | Verb::Update | Verb::Destroy)
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Verb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Wire Types
// =============================================================================

/// Seconds + nanos since the Unix epoch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct WireTimestamp {
    pub seconds: i64,
    pub nanos: i32,
}

/// Metadata as carried on the wire
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireMetadata {
    pub namespace: String,
    pub resource_type: String,
    pub id: String,
    pub version: String,
    pub owner: String,
    /// 0 = running, 1 = tearing down
    pub phase: i32,
    pub created: Option<WireTimestamp>,
    pub updated: Option<WireTimestamp>,
    pub finalizers: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
}

/// Resource envelope on the wire
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WireResource {
    pub metadata: WireMetadata,
    pub spec: SpecPayload,
    pub status: SpecPayload,
}

/// Watch notification on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct WireEvent {
    pub kind: EventKind,
    pub resource: WireResource,
    pub old: Option<WireResource>,
    pub total: i32,
}

// =============================================================================
// Requests
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GetRequest {
    pub namespace: String,
    pub resource_type: String,
    pub id: String,
}

/// Sort key for list calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    Id,
    Created,
    Updated,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListRequest {
    pub namespace: String,
    pub resource_type: String,
    pub selector: String,
    pub id_pattern: Option<String>,
    pub offset: u32,
    /// 0 means no limit
    pub limit: u32,
    pub sort_by: Option<SortField>,
    pub sort_desc: bool,
    pub search_terms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WatchRequest {
    pub namespace: String,
    pub resource_type: String,
    pub selector: String,
    pub id: Option<String>,
    pub tail_events: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateRequest {
    pub resource: WireResource,
    pub current_version: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DestroyRequest {
    pub namespace: String,
    pub resource_type: String,
    pub id: String,
}

// =============================================================================
// Call Context
// =============================================================================

/// Per-call context: signed headers plus the absolute deadline
#[derive(Debug, Clone)]
pub struct CallContext {
    pub method: &'static str,
    pub headers: RequestMetadata,
    pub deadline: Instant,
}

/// Server-streamed items
pub type WireStream<T> = BoxStream<'static, Result<T>>;

// =============================================================================
// Resource Transport Port
// =============================================================================

/// Port for the resource-state service
#[async_trait]
pub trait ResourceTransport: Send + Sync {
    /// Fetch a single resource
    async fn get(&self, ctx: &CallContext, request: GetRequest) -> Result<WireResource>;

    /// Stream every matching resource, then end
    async fn list(&self, ctx: &CallContext, request: ListRequest) -> Result<WireStream<WireResource>>;

    /// Stream change events until the stream is dropped
    async fn watch(&self, ctx: &CallContext, request: WatchRequest) -> Result<WireStream<WireEvent>>;

    /// Create a resource, returning it as stored
    async fn create(&self, ctx: &CallContext, resource: WireResource) -> Result<WireResource>;

    /// Replace a resource if `current_version` still matches
    async fn update(&self, ctx: &CallContext, request: UpdateRequest) -> Result<WireResource>;

    /// Destroy a resource
    async fn destroy(&self, ctx: &CallContext, request: DestroyRequest) -> Result<()>;
}

// =============================================================================
// Transport Connector Port
// =============================================================================

/// Port for establishing transports; owns connection lifecycle
#[async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, endpoint: &str, tls: &TlsConfig) -> Result<ResourceTransportRef>;
}

pub type ResourceTransportRef = Arc<dyn ResourceTransport>;
pub type TransportConnectorRef = Arc<dyn TransportConnector>;
