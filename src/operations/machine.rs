//! Machine conveniences

use super::KindClient;
use crate::error::Result;
use crate::gate::{actions, WriteAction};
use crate::kinds::MachineSpec;
use crate::resource::Resource;
use tracing::{debug, info};

impl KindClient<MachineSpec> {
    /// Mark a machine as locked so upgrades and config rollouts skip it
    pub async fn lock(&self, id: &str, namespace: Option<&str>) -> Result<Resource<MachineSpec>> {
        self.set_locked(&actions::LOCK, id, namespace, true).await
    }

    /// Clear the lock flag
    pub async fn unlock(&self, id: &str, namespace: Option<&str>) -> Result<Resource<MachineSpec>> {
        self.set_locked(&actions::UNLOCK, id, namespace, false).await
    }

    /// Get, flip the flag, update against the version just read
    async fn set_locked(
        &self,
        action: &WriteAction,
        id: &str,
        namespace: Option<&str>,
        locked: bool,
    ) -> Result<Resource<MachineSpec>> {
        self.guard(action)?;

        let mut machine = self.client().get::<MachineSpec>(id, namespace).await?;
        let status = machine.status.get_or_insert_with(Default::default);
        if status.locked == locked {
            debug!(id, locked, "Machine lock already in requested state");
            return Ok(machine);
        }

        status.locked = locked;
        info!(id, locked, "Updating machine lock");
        self.client().update(&machine, None).await
    }
}
