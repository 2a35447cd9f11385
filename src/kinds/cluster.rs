//! Cluster kind

use crate::resource::ResourceSpec;
use serde::{Deserialize, Serialize};

/// Desired state of a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterSpec {
    #[serde(default)]
    pub kubernetes_version: String,

    #[serde(default)]
    pub talos_version: String,

    #[serde(default)]
    pub features: ClusterFeatures,
}

/// Optional cluster features
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterFeatures {
    #[serde(default)]
    pub enable_workload_proxy: bool,

    #[serde(default)]
    pub disk_encryption: bool,
}

/// Observed state of a cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub machines_total: u32,

    #[serde(default)]
    pub machines_healthy: u32,
}

impl ResourceSpec for ClusterSpec {
    type Status = ClusterStatus;
    const LABEL: &'static str = "Cluster";
    const WIRE_TYPE: &'static str = "Clusters.fleet.dev";
}
