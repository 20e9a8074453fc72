//! Workspace key lifecycle.
//!
//! Combines the master key source, the key envelope, and a key-record store.
//! Unwrapped keys are handed to the caller for one operation and never
//! cached here.

use crate::error::{EngineError, EngineResult};
use fieldseal_crypto::{
    MasterKeySource, WorkspaceKey, generate_workspace_key, unwrap_workspace_key,
    wrap_workspace_key,
};
use fieldseal_storage::{KeyRecordStore, WorkspaceKeyRecord};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Creates, unwraps, and destroys workspace keys.
#[derive(Clone)]
pub struct Keyring {
    master: MasterKeySource,
    keys: Arc<dyn KeyRecordStore>,
}

impl Keyring {
    pub fn new(master: MasterKeySource, keys: Arc<dyn KeyRecordStore>) -> Self {
        Self { master, keys }
    }

    pub fn master_key_source(&self) -> &MasterKeySource {
        &self.master
    }

    /// True if a wrapped key record exists for the workspace.
    pub async fn has_key(&self, workspace_id: &str) -> EngineResult<bool> {
        Ok(self.keys.get_key(workspace_id).await?.is_some())
    }

    /// Creates the workspace key if none exists.
    ///
    /// Returns `true` when this call created it and `false` when a key was
    /// already present. Fails with `Configuration` when no master key is
    /// configured, even if a key record exists.
    pub async fn create(&self, workspace_id: &str) -> EngineResult<bool> {
        let master = self.master.get_master_key()?;

        if self.has_key(workspace_id).await? {
            debug!("workspace {workspace_id} already has an encryption key");
            return Ok(false);
        }

        let key = generate_workspace_key();
        let wrapped = wrap_workspace_key(&key, &master)?;
        let created = self
            .keys
            .insert_key_if_absent(WorkspaceKeyRecord::new(workspace_id, wrapped))
            .await?;

        if created {
            info!("created encryption key for workspace {workspace_id}");
        } else {
            debug!("lost key creation race for workspace {workspace_id}");
        }
        Ok(created)
    }

    /// Deletes the workspace key. Data encrypted under it becomes
    /// permanently unreadable.
    pub async fn destroy(&self, workspace_id: &str) -> EngineResult<bool> {
        let removed = self.keys.delete_key(workspace_id).await?;
        if removed {
            warn!("destroyed encryption key for workspace {workspace_id}");
        }
        Ok(removed)
    }

    /// Unwraps the workspace key for the duration of one operation.
    pub async fn unwrap(&self, workspace_id: &str) -> EngineResult<WorkspaceKey> {
        let record = self.keys.get_key(workspace_id).await?.ok_or_else(|| {
            EngineError::NotFound(format!("encryption key for workspace {workspace_id}"))
        })?;
        let master = self.master.get_master_key()?;
        Ok(unwrap_workspace_key(&record.wrapped_key, &master)?)
    }
}
