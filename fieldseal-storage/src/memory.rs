//! In-memory backends.

use crate::error::{StorageError, StorageResult};
use crate::record_store::{KeyRecordStore, RecordStore};
use crate::types::{EncryptableRecord, RecordFilter, RecordPatch, WorkspaceKeyRecord};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Thread-safe in-memory record store, ordered by record id.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<BTreeMap<String, EncryptableRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a record.
    pub async fn insert(&self, record: EncryptableRecord) {
        self.records.write().await.insert(record.id.clone(), record);
    }

    pub async fn get(&self, id: &str) -> Option<EncryptableRecord> {
        self.records.read().await.get(id).cloned()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn list(
        &self,
        workspace_id: &str,
        filter: RecordFilter,
    ) -> StorageResult<Vec<EncryptableRecord>> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.workspace_id == workspace_id && filter.matches(r.is_encrypted))
            .cloned()
            .collect())
    }

    async fn update(&self, id: &str, patch: RecordPatch) -> StorageResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        record.apply(&patch);
        Ok(())
    }
}

/// Thread-safe in-memory key-record store.
#[derive(Clone, Default)]
pub struct MemoryKeyStore {
    keys: Arc<RwLock<HashMap<String, WorkspaceKeyRecord>>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyRecordStore for MemoryKeyStore {
    async fn get_key(&self, workspace_id: &str) -> StorageResult<Option<WorkspaceKeyRecord>> {
        Ok(self.keys.read().await.get(workspace_id).cloned())
    }

    async fn insert_key_if_absent(&self, record: WorkspaceKeyRecord) -> StorageResult<bool> {
        let mut keys = self.keys.write().await;
        if keys.contains_key(&record.workspace_id) {
            return Ok(false);
        }
        keys.insert(record.workspace_id.clone(), record);
        Ok(true)
    }

    async fn delete_key(&self, workspace_id: &str) -> StorageResult<bool> {
        Ok(self.keys.write().await.remove(workspace_id).is_some())
    }
}
