#![allow(dead_code)]

use async_trait::async_trait;
use fieldseal_crypto::{KdfParams, MasterKeySource, WorkspaceKey, encrypt_field};
use fieldseal_engine::{
    AuthorizationDecision, AuthorizationPolicy, DenialReason, EncryptionService, EngineConfig,
};
use fieldseal_storage::{
    EncryptableRecord, MemoryKeyStore, MemoryRecordStore, RecordFilter, RecordPatch, RecordStore,
    StorageError, StorageResult,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const WS: &str = "ws-main";
pub const OTHER_WS: &str = "ws-other";
pub const CALLER: &str = "user-1";
pub const MASTER: &str = "test-master-key-for-unit-testing-only";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn master() -> MasterKeySource {
    MasterKeySource::from_passphrase(MASTER).with_kdf_params(KdfParams::test())
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        kdf: KdfParams::test(),
        ..Default::default()
    }
}

// ── Fixture ──────────────────────────────────────────────────────

pub struct Fixture {
    pub service: EncryptionService,
    pub records: Arc<MemoryRecordStore>,
    pub keys: Arc<MemoryKeyStore>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        init_tracing();
        let records = Arc::new(MemoryRecordStore::new());
        let keys = Arc::new(MemoryKeyStore::new());
        let service = EncryptionService::new(config, master(), records.clone(), keys.clone());
        Self {
            service,
            records,
            keys,
        }
    }

    /// Enables encryption for `workspace_id` and returns its unwrapped key.
    pub async fn enable(&self, workspace_id: &str) -> WorkspaceKey {
        self.service.enable(workspace_id, CALLER).await.unwrap();
        self.service.keyring().unwrap(workspace_id).await.unwrap()
    }

    /// Legacy records with no flag.
    pub async fn seed_plain(&self, workspace_id: &str, count: usize) {
        for i in 0..count {
            self.records
                .insert(
                    EncryptableRecord::new(
                        format!("{workspace_id}-plain-{i:03}"),
                        workspace_id,
                        format!("Meeting number {i}"),
                    )
                    .with_description(format!("Agenda for meeting {i}")),
                )
                .await;
        }
    }

    /// Correctly encrypted, flagged records.
    pub async fn seed_encrypted(&self, workspace_id: &str, key: &WorkspaceKey, count: usize) {
        for i in 0..count {
            self.records
                .insert(
                    EncryptableRecord::new(
                        format!("{workspace_id}-good-{i:03}"),
                        workspace_id,
                        encrypt_field(&format!("Sealed event {i}"), key).unwrap(),
                    )
                    .with_description(encrypt_field("Private notes", key).unwrap())
                    .with_location(encrypt_field("Room 101", key).unwrap())
                    .with_flag(true),
                )
                .await;
        }
    }

    /// Flagged encrypted but holding plaintext.
    pub async fn seed_drifted(&self, workspace_id: &str, count: usize) {
        for i in 0..count {
            self.records
                .insert(
                    EncryptableRecord::new(
                        format!("{workspace_id}-drift-{i:03}"),
                        workspace_id,
                        format!("Drifted event {i}"),
                    )
                    .with_description("Left in plaintext")
                    .with_flag(true),
                )
                .await;
        }
    }

    pub async fn all(&self, workspace_id: &str) -> Vec<EncryptableRecord> {
        self.records.list(workspace_id, RecordFilter::All).await.unwrap()
    }
}

// ── Policies ─────────────────────────────────────────────────────

/// Allows only the listed callers; everyone else gets `reason`.
pub struct MembersOnlyPolicy {
    pub members: HashSet<String>,
    pub reason: DenialReason,
}

impl MembersOnlyPolicy {
    pub fn new(members: &[&str], reason: DenialReason) -> Self {
        Self {
            members: members.iter().map(|m| m.to_string()).collect(),
            reason,
        }
    }
}

#[async_trait]
impl AuthorizationPolicy for MembersOnlyPolicy {
    async fn authorize(&self, _workspace_id: &str, caller: &str) -> AuthorizationDecision {
        if self.members.contains(caller) {
            AuthorizationDecision::allow()
        } else {
            AuthorizationDecision::deny(self.reason)
        }
    }
}

// ── Failure injection ────────────────────────────────────────────

/// Wraps a memory store and fails updates for chosen record ids.
pub struct FlakyRecordStore {
    pub inner: MemoryRecordStore,
    pub fail_ids: HashSet<String>,
    pub updates: AtomicUsize,
}

impl FlakyRecordStore {
    pub fn new(inner: MemoryRecordStore, fail_ids: &[&str]) -> Self {
        Self {
            inner,
            fail_ids: fail_ids.iter().map(|id| id.to_string()).collect(),
            updates: AtomicUsize::new(0),
        }
    }

    pub fn update_attempts(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordStore for FlakyRecordStore {
    async fn list(
        &self,
        workspace_id: &str,
        filter: RecordFilter,
    ) -> StorageResult<Vec<EncryptableRecord>> {
        self.inner.list(workspace_id, filter).await
    }

    async fn update(&self, id: &str, patch: RecordPatch) -> StorageResult<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        if self.fail_ids.contains(id) {
            return Err(StorageError::Backend(format!("injected failure for {id}")));
        }
        self.inner.update(id, patch).await
    }
}
