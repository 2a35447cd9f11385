//! Watch events
//!
//! Events are produced once per watch notification and handed straight to
//! the caller's iteration loop.

use super::{Resource, ResourceSpec};
use serde::{Deserialize, Serialize};

/// Kind of change carried by a watch event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Created,
    Updated,
    Destroyed,
    /// Initial state has been fully delivered
    Bootstrapped,
    #[default]
    Unknown,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventKind::Created => write!(f, "created"),
            EventKind::Updated => write!(f, "updated"),
            EventKind::Destroyed => write!(f, "destroyed"),
            EventKind::Bootstrapped => write!(f, "bootstrapped"),
            EventKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// A typed change notification
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent<S: ResourceSpec> {
    pub kind: EventKind,
    pub resource: Resource<S>,
    /// Only populated for `Updated`
    pub previous: Option<Resource<S>>,
    /// Best-effort count of matching resources; for display only
    pub total: u32,
}

impl<S: ResourceSpec> ResourceEvent<S> {
    pub fn id(&self) -> &str {
        &self.resource.metadata.id
    }

    pub fn is_bootstrapped(&self) -> bool {
        self.kind == EventKind::Bootstrapped
    }
}
