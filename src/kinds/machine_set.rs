//! MachineSet kind

use crate::resource::ResourceSpec;
use serde::{Deserialize, Serialize};

/// A group of machines sharing a role within a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetSpec {
    #[serde(default)]
    pub cluster: String,

    #[serde(default)]
    pub machine_count: u32,

    #[serde(default)]
    pub update_strategy: UpdateStrategy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateStrategy {
    #[default]
    Rolling,
    Unset,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineSetStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub machines_ready: u32,
}

impl ResourceSpec for MachineSetSpec {
    type Status = MachineSetStatus;
    const LABEL: &'static str = "MachineSet";
    const WIRE_TYPE: &'static str = "MachineSets.fleet.dev";
}
