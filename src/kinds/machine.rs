//! Machine kind

use crate::resource::ResourceSpec;
use serde::{Deserialize, Serialize};

/// Desired state of a machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSpec {
    #[serde(default)]
    pub management_address: String,

    #[serde(default)]
    pub connected: bool,
}

/// Observed state of a machine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineStatus {
    #[serde(default)]
    pub cluster: String,

    #[serde(default)]
    pub role: MachineRole,

    /// Locked machines are skipped by upgrades and config rollouts
    #[serde(default)]
    pub locked: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MachineRole {
    #[default]
    Unassigned,
    ControlPlane,
    Worker,
}

impl ResourceSpec for MachineSpec {
    type Status = MachineStatus;
    const LABEL: &'static str = "Machine";
    const WIRE_TYPE: &'static str = "Machines.fleet.dev";
}
