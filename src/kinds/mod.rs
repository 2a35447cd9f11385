//! Resource kinds shipped with the client
//!
//! Each kind is a spec type implementing [`ResourceSpec`]; the domain fields
//! are carried as-is and not interpreted by the client.

pub mod cluster;
pub mod config_patch;
pub mod machine;
pub mod machine_set;

pub use cluster::{ClusterFeatures, ClusterSpec, ClusterStatus};
pub use config_patch::ConfigPatchSpec;
pub use machine::{MachineRole, MachineSpec, MachineStatus};
pub use machine_set::{MachineSetSpec, MachineSetStatus, UpdateStrategy};

use crate::registry::TypeRegistry;

/// Register every shipped kind under its declared wire name
pub fn register_builtin(registry: &TypeRegistry) {
    registry.register_kind::<ClusterSpec>();
    registry.register_kind::<MachineSpec>();
    registry.register_kind::<MachineSetSpec>();
    registry.register_kind::<ConfigPatchSpec>();
}
