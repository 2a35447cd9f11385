//! Write-action gate
//!
//! Vetoes mutating calls on a read-only client. Hand-written methods call
//! [`WriteGate::check`] with an operation name; forwarding methods declare a
//! [`WriteAction`] and call [`WriteGate::enforce`]. Both raise the same
//! [`Error::ReadOnlyMode`] and both run before any transport call.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

// =============================================================================
// Client Mode
// =============================================================================

/// Access mode, fixed for the lifetime of a client
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientMode {
    ReadOnly,
    #[default]
    ReadWrite,
}

impl std::fmt::Display for ClientMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientMode::ReadOnly => write!(f, "read-only"),
            ClientMode::ReadWrite => write!(f, "read-write"),
        }
    }
}

// =============================================================================
// Write Action Descriptors
// =============================================================================

/// Kind of mutation a method performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteActionKind {
    Create,
    Update,
    Delete,
    Stop,
}

impl WriteActionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            WriteActionKind::Create => "Create",
            WriteActionKind::Update => "Update",
            WriteActionKind::Delete => "Delete",
            WriteActionKind::Stop => "Stop",
        }
    }
}

impl std::fmt::Display for WriteActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Machine-readable descriptor attached to a mutating method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WriteAction {
    pub kind: WriteActionKind,
    pub description: &'static str,
}

impl WriteAction {
    pub const fn new(kind: WriteActionKind, description: &'static str) -> Self {
        Self { kind, description }
    }

    /// Operation name reported when the action is rejected
    pub fn operation(&self) -> &'static str {
        self.kind.as_str()
    }
}

/// Descriptors for the generic operations
pub mod actions {
    use super::{WriteAction, WriteActionKind};

    pub const CREATE: WriteAction = WriteAction::new(WriteActionKind::Create, "create a resource");
    pub const UPDATE: WriteAction = WriteAction::new(WriteActionKind::Update, "update a resource");
    pub const APPLY: WriteAction =
        WriteAction::new(WriteActionKind::Update, "create or update a resource");
    pub const DELETE: WriteAction = WriteAction::new(WriteActionKind::Delete, "delete a resource");
    pub const DELETE_MANY: WriteAction =
        WriteAction::new(WriteActionKind::Delete, "delete every matching resource");
    pub const LOCK: WriteAction = WriteAction::new(WriteActionKind::Update, "lock a machine");
    pub const UNLOCK: WriteAction = WriteAction::new(WriteActionKind::Update, "unlock a machine");
}

// =============================================================================
// Write Gate
// =============================================================================

/// Per-client veto on mutating calls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteGate {
    mode: ClientMode,
}

impl WriteGate {
    pub const fn new(mode: ClientMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ClientMode {
        self.mode
    }

    pub fn is_read_only(&self) -> bool {
        self.mode == ClientMode::ReadOnly
    }

    /// Explicit guard for hand-written mutating methods
    pub fn check(&self, operation: &str, resource_type: &str) -> Result<()> {
        match self.mode {
            ClientMode::ReadWrite => Ok(()),
            ClientMode::ReadOnly => {
                warn!(operation, resource_type, "write rejected by read-only client");
                Err(Error::ReadOnlyMode {
                    operation: operation.to_string(),
                    resource_type: resource_type.to_string(),
                })
            }
        }
    }

    /// Declarative guard driven by a method's [`WriteAction`] descriptor
    pub fn enforce(&self, action: &WriteAction, resource_type: &str) -> Result<()> {
        self.check(action.operation(), resource_type)
    }
}

impl From<ClientMode> for WriteGate {
    fn from(mode: ClientMode) -> Self {
        Self::new(mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_read_write_allows_everything() {
        let gate = WriteGate::new(ClientMode::ReadWrite);
        assert!(gate.check("Create", "Clusters.fleet.dev").is_ok());
        assert!(gate.enforce(&actions::DELETE, "Clusters.fleet.dev").is_ok());
    }

    #[test]
    fn test_both_paths_raise_identical_errors() {
        let gate = WriteGate::new(ClientMode::ReadOnly);

        let explicit = gate.check("Delete", "Machines.fleet.dev").unwrap_err();
        let declarative = gate.enforce(&actions::DELETE, "Machines.fleet.dev").unwrap_err();

        assert_eq!(explicit.to_string(), declarative.to_string());
        assert_matches!(
            declarative,
            Error::ReadOnlyMode { operation, resource_type }
                if operation == "Delete" && resource_type == "Machines.fleet.dev"
        );
    }

    #[test]
    fn test_stop_action() {
        let stop = WriteAction::new(WriteActionKind::Stop, "stop a workload");
        let gate = WriteGate::from(ClientMode::ReadOnly);
        assert!(gate.is_read_only());
        assert_matches!(
            gate.enforce(&stop, "Workloads"),
            Err(Error::ReadOnlyMode { operation, .. }) if operation == "Stop"
        );
    }

    #[test]
    fn test_mode_serde() {
        let mode: ClientMode = serde_yaml::from_str("readOnly").unwrap();
        assert_eq!(mode, ClientMode::ReadOnly);
        assert_eq!(ClientMode::default(), ClientMode::ReadWrite);
    }
}
