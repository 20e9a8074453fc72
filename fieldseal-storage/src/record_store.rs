//! Store contracts consumed by the engine.
//!
//! `list` may be delivered more than once for the same data and `update` is
//! not guaranteed exactly-once, so callers must keep their writes
//! idempotent.

use crate::error::StorageResult;
use crate::types::{EncryptableRecord, RecordFilter, RecordPatch, WorkspaceKeyRecord};
use async_trait::async_trait;

/// Read/update access to encryptable records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Lists a workspace's records matching `filter`, ordered by id.
    async fn list(
        &self,
        workspace_id: &str,
        filter: RecordFilter,
    ) -> StorageResult<Vec<EncryptableRecord>>;

    /// Applies a partial update. Fails with `NotFound` for an unknown id.
    async fn update(&self, id: &str, patch: RecordPatch) -> StorageResult<()>;

    /// Counts a workspace's records matching `filter`.
    async fn count(&self, workspace_id: &str, filter: RecordFilter) -> StorageResult<usize> {
        Ok(self.list(workspace_id, filter).await?.len())
    }
}

/// Persistence for wrapped workspace keys.
#[async_trait]
pub trait KeyRecordStore: Send + Sync {
    async fn get_key(&self, workspace_id: &str) -> StorageResult<Option<WorkspaceKeyRecord>>;

    /// Inserts unless a record already exists for the workspace. Returns
    /// `true` when this call created it.
    async fn insert_key_if_absent(&self, record: WorkspaceKeyRecord) -> StorageResult<bool>;

    /// Deletes the workspace's key record. Returns `true` if one existed.
    async fn delete_key(&self, workspace_id: &str) -> StorageResult<bool>;
}
