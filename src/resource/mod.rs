//! Resource & event model
//!
//! A resource is a metadata envelope around a typed spec (desired state) and
//! an optional status (observed state reported by the server).

pub mod event;
pub mod metadata;
pub mod selector;
pub mod spec;

pub use event::{EventKind, ResourceEvent};
pub use metadata::{Phase, ResourceMetadata};
pub use selector::{LabelSelector, SelectorTerm};
pub use spec::{Decoded, ResourceSpec, ResourceStatus, SpecPayload};

use crate::error::Result;
use crate::transport::WireResource;

/// A typed resource instance
#[derive(Debug, Clone, PartialEq)]
pub struct Resource<S: ResourceSpec> {
    pub metadata: ResourceMetadata,
    pub spec: S,
    pub status: Option<S::Status>,
}

impl<S: ResourceSpec> Default for Resource<S> {
    fn default() -> Self {
        Self {
            metadata: ResourceMetadata::default(),
            spec: S::default(),
            status: None,
        }
    }
}

impl<S: ResourceSpec> Resource<S> {
    /// New resource; an empty namespace resolves to the client's default
    pub fn new(id: impl Into<String>, spec: S) -> Self {
        Self {
            metadata: ResourceMetadata::new("", id),
            spec,
            status: None,
        }
    }

    pub fn from_parts(metadata: ResourceMetadata, spec: S, status: Option<S::Status>) -> Self {
        Self {
            metadata,
            spec,
            status,
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.metadata.namespace = namespace.into();
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.labels.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }

    pub fn namespace(&self) -> &str {
        &self.metadata.namespace
    }

    pub fn version(&self) -> &str {
        &self.metadata.version
    }

    /// Encode for a write call: spec always in textual form, status only
    /// when the caller carries one read back from the server. Creates drop
    /// the status again; only updates pass it through.
    pub(crate) fn to_wire(&self) -> Result<WireResource> {
        let status = match &self.status {
            Some(status) => SpecPayload::encode(status)?,
            None => SpecPayload::Absent,
        };

        Ok(WireResource {
            metadata: self.metadata.clone().into(),
            spec: SpecPayload::encode(&self.spec)?,
            status,
        })
    }
}
