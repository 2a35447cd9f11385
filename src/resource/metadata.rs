//! Resource metadata
//!
//! Local metadata mirrors the wire metadata field for field. Conversions in
//! both directions keep timestamps, finalizers, labels and annotations intact.

use crate::transport::{WireMetadata, WireTimestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Phase
// =============================================================================

/// Lifecycle phase of a resource
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Running,
    #[serde(rename = "tearingDown")]
    TearingDown,
}

impl Phase {
    pub(crate) fn from_wire(value: i32) -> Self {
        match value {
            1 => Phase::TearingDown,
            _ => Phase::Running,
        }
    }

    pub(crate) fn to_wire(self) -> i32 {
        match self {
            Phase::Running => 0,
            Phase::TearingDown => 1,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Running => write!(f, "running"),
            Phase::TearingDown => write!(f, "tearingDown"),
        }
    }
}

// =============================================================================
// Resource Metadata
// =============================================================================

/// Metadata of a resource instance.
///
/// `(namespace, resource_type, id)` identifies an instance. `version` is an
/// opaque optimistic-concurrency token owned by the server.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetadata {
    #[serde(default)]
    pub namespace: String,

    #[serde(default, rename = "type")]
    pub resource_type: String,

    #[serde(default, alias = "name")]
    pub id: String,

    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub owner: String,

    #[serde(default)]
    pub phase: Phase,

    #[serde(default)]
    pub created: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,

    #[serde(default)]
    pub finalizers: Vec<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

impl ResourceMetadata {
    pub fn new(namespace: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
            ..Default::default()
        }
    }

    /// Alias of `id`
    pub fn name(&self) -> &str {
        &self.id
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }
}

// =============================================================================
// Wire Conversion
// =============================================================================

fn timestamp_from_wire(ts: Option<WireTimestamp>) -> Option<DateTime<Utc>> {
    let ts = ts?;
    let nanos = u32::try_from(ts.nanos).ok()?;
    DateTime::from_timestamp(ts.seconds, nanos)
}

fn timestamp_to_wire(ts: Option<DateTime<Utc>>) -> Option<WireTimestamp> {
    ts.map(|ts| WireTimestamp {
        seconds: ts.timestamp(),
        nanos: ts.timestamp_subsec_nanos() as i32,
    })
}

impl From<WireMetadata> for ResourceMetadata {
    fn from(wire: WireMetadata) -> Self {
        Self {
            namespace: wire.namespace,
            resource_type: wire.resource_type,
            id: wire.id,
            version: wire.version,
            owner: wire.owner,
            phase: Phase::from_wire(wire.phase),
            created: timestamp_from_wire(wire.created),
            updated: timestamp_from_wire(wire.updated),
            finalizers: wire.finalizers,
            labels: wire.labels,
            annotations: wire.annotations,
        }
    }
}

impl From<ResourceMetadata> for WireMetadata {
    fn from(meta: ResourceMetadata) -> Self {
        Self {
            namespace: meta.namespace,
            resource_type: meta.resource_type,
            id: meta.id,
            version: meta.version,
            owner: meta.owner,
            phase: meta.phase.to_wire(),
            created: timestamp_to_wire(meta.created),
            updated: timestamp_to_wire(meta.updated),
            finalizers: meta.finalizers,
            labels: meta.labels,
            annotations: meta.annotations,
        }
    }
}
