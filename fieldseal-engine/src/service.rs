//! The external operations: status, enable, disable, verify, migrate, and
//! repair, each authorized before anything is read or written.

use crate::authz::{AllowAllPolicy, AuthorizationPolicy};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::keyring::Keyring;
use crate::locks::WorkspaceLocks;
use crate::migration::{MigrationJob, MigrationReport};
use crate::progress::{ProgressEvent, ProgressStream, progress_channel};
use crate::reader::decrypt_records;
use crate::repair::{IntegrityRepairJob, RepairReport};
use crate::verify::{VerifyReport, verify_workspace};
use fieldseal_crypto::MasterKeySource;
use fieldseal_storage::{EncryptableRecord, KeyRecordStore, RecordFilter, RecordStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionStatus {
    /// A master key is configured.
    pub enabled: bool,
    /// The workspace has a key record.
    pub has_key: bool,
    pub unencrypted_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnableOutcome {
    pub success: bool,
    pub already_exists: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisableOutcome {
    pub success: bool,
}

/// A batch job running in the background.
///
/// Keep `stream` alive while the job should continue: dropping it cancels
/// the job at its next record boundary.
#[derive(Debug)]
pub struct JobRun<R> {
    pub stream: ProgressStream,
    pub handle: JobHandle<R>,
}

impl<R> JobRun<R> {
    /// Drains every event, then waits for the report.
    pub async fn finish(self) -> EngineResult<(Vec<ProgressEvent>, R)> {
        let events = self.stream.collect_all().await;
        let report = self.handle.join().await?;
        Ok((events, report))
    }
}

/// Completion handle of a background job.
#[derive(Debug)]
pub struct JobHandle<R> {
    inner: JoinHandle<R>,
}

impl<R> JobHandle<R> {
    pub async fn join(self) -> EngineResult<R> {
        self.inner
            .await
            .map_err(|e| EngineError::Internal(format!("job task failed: {e}")))
    }

    pub fn is_finished(&self) -> bool {
        self.inner.is_finished()
    }
}

/// Entry point for every workspace encryption operation.
pub struct EncryptionService {
    config: EngineConfig,
    keyring: Keyring,
    records: Arc<dyn RecordStore>,
    policy: Arc<dyn AuthorizationPolicy>,
    locks: WorkspaceLocks,
}

impl EncryptionService {
    /// Builds a service that authorizes every caller.
    pub fn new(
        config: EngineConfig,
        master: MasterKeySource,
        records: Arc<dyn RecordStore>,
        keys: Arc<dyn KeyRecordStore>,
    ) -> Self {
        Self {
            config,
            keyring: Keyring::new(master, keys),
            records,
            policy: Arc::new(AllowAllPolicy),
            locks: WorkspaceLocks::new(),
        }
    }

    /// Validates `config` and reads the master key from its environment
    /// variable.
    pub fn from_config(
        config: EngineConfig,
        records: Arc<dyn RecordStore>,
        keys: Arc<dyn KeyRecordStore>,
    ) -> EngineResult<Self> {
        config.validate()?;
        let master = config.master_key_source();
        Ok(Self::new(config, master, records, keys))
    }

    pub fn with_policy(mut self, policy: Arc<dyn AuthorizationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    async fn authorize(&self, workspace_id: &str, caller: &str) -> EngineResult<()> {
        let decision = self.policy.authorize(workspace_id, caller).await;
        if !decision.authorized {
            warn!("caller {caller} denied for workspace {workspace_id}: {:?}", decision.reason);
        }
        decision.into_result(workspace_id)
    }

    /// Reports whether encryption is configured and enabled for a workspace.
    pub async fn status(
        &self,
        workspace_id: &str,
        caller: &str,
    ) -> EngineResult<EncryptionStatus> {
        self.authorize(workspace_id, caller).await?;
        Ok(EncryptionStatus {
            enabled: self.keyring.master_key_source().is_encryption_enabled(),
            has_key: self.keyring.has_key(workspace_id).await?,
            unencrypted_count: self
                .records
                .count(workspace_id, RecordFilter::Unencrypted)
                .await?,
        })
    }

    /// Creates the workspace key. Idempotent.
    pub async fn enable(&self, workspace_id: &str, caller: &str) -> EngineResult<EnableOutcome> {
        self.authorize(workspace_id, caller).await?;
        let created = self.keyring.create(workspace_id).await?;
        Ok(EnableOutcome {
            success: true,
            already_exists: !created,
        })
    }

    /// Destroys the workspace key. Irreversible: previously encrypted data
    /// becomes unreadable. Refused while a job runs on the workspace.
    pub async fn disable(&self, workspace_id: &str, caller: &str) -> EngineResult<DisableOutcome> {
        self.authorize(workspace_id, caller).await?;
        let _lease = self.locks.try_acquire(workspace_id)?;
        let removed = self.keyring.destroy(workspace_id).await?;
        if !removed {
            info!("disable requested for workspace {workspace_id} with no key");
        }
        Ok(DisableOutcome { success: true })
    }

    /// Counts records by flag and samples drifted ones. Never writes.
    pub async fn verify(&self, workspace_id: &str, caller: &str) -> EngineResult<VerifyReport> {
        self.authorize(workspace_id, caller).await?;
        verify_workspace(
            self.records.as_ref(),
            workspace_id,
            self.config.verify_sample_limit,
        )
        .await
    }

    /// Encrypts every unencrypted record and returns the final counts.
    pub async fn migrate(&self, workspace_id: &str, caller: &str) -> EngineResult<MigrationReport> {
        self.authorize(workspace_id, caller).await?;
        let job = self.prepare_migration(workspace_id).await?;
        Ok(job.run(None).await)
    }

    /// Starts a migration in the background, streaming its progress.
    pub async fn migrate_streaming(
        &self,
        workspace_id: &str,
        caller: &str,
    ) -> EngineResult<JobRun<MigrationReport>> {
        self.authorize(workspace_id, caller).await?;
        let job = self.prepare_migration(workspace_id).await?;

        let (sink, stream) = progress_channel(self.config.progress_channel_capacity);
        let inner = tokio::spawn(async move { job.run(Some(&sink)).await });
        Ok(JobRun {
            stream,
            handle: JobHandle { inner },
        })
    }

    /// Starts an integrity repair in the background, streaming its progress.
    pub async fn repair(
        &self,
        workspace_id: &str,
        caller: &str,
    ) -> EngineResult<JobRun<RepairReport>> {
        self.authorize(workspace_id, caller).await?;
        let job = IntegrityRepairJob::prepare(
            workspace_id,
            &self.keyring,
            Arc::clone(&self.records),
            &self.locks,
            self.config.progress_interval,
        )
        .await?;

        let (sink, stream) = progress_channel(self.config.progress_channel_capacity);
        let inner = tokio::spawn(async move { job.run(&sink).await });
        Ok(JobRun {
            stream,
            handle: JobHandle { inner },
        })
    }

    /// Lists a workspace's records for display, decrypting flagged ones.
    /// Without a key record, records are returned as stored.
    pub async fn read_records(
        &self,
        workspace_id: &str,
        caller: &str,
    ) -> EngineResult<Vec<EncryptableRecord>> {
        self.authorize(workspace_id, caller).await?;
        let records = self.records.list(workspace_id, RecordFilter::All).await?;
        if !self.keyring.has_key(workspace_id).await? {
            return Ok(records);
        }
        let key = self.keyring.unwrap(workspace_id).await?;
        Ok(decrypt_records(&records, &key))
    }

    async fn prepare_migration(&self, workspace_id: &str) -> EngineResult<MigrationJob> {
        MigrationJob::prepare(
            workspace_id,
            &self.keyring,
            Arc::clone(&self.records),
            &self.locks,
            self.config.progress_interval,
        )
        .await
    }
}
