//! ConfigPatch kind

use crate::resource::ResourceSpec;
use serde::{Deserialize, Serialize};

/// A configuration patch applied to the machines its labels select
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigPatchSpec {
    #[serde(default)]
    pub data: String,
}

impl ResourceSpec for ConfigPatchSpec {
    type Status = ();
    const LABEL: &'static str = "ConfigPatch";
    const WIRE_TYPE: &'static str = "ConfigPatches.fleet.dev";
}
