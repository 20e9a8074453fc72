//! Bulk encryption of a workspace's legacy plaintext records.
//!
//! Records are processed one at a time: seal every field, write the record
//! back with `is_encrypted = true`, report, move on. A failing record is
//! counted and skipped. Running the job again after it finishes migrates
//! nothing, because finished records no longer match the unencrypted filter.

use crate::error::EngineResult;
use crate::keyring::Keyring;
use crate::locks::{WorkspaceLease, WorkspaceLocks};
use crate::progress::{Cadence, ProgressEvent, ProgressSink};
use fieldseal_crypto::{
    CryptoResult, WorkspaceKey, decrypt_field, encrypt_field, looks_like_ciphertext,
};
use fieldseal_storage::{EncryptableRecord, RecordFilter, RecordPatch, RecordStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of a migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationReport {
    pub migrated_count: usize,
    pub error_count: usize,
    pub total: usize,
    /// The consumer disconnected before the run delivered its completion.
    pub cancelled: bool,
}

/// A prepared migration: authorized, leased, key unwrapped, candidates
/// fetched. Running it cannot fail as a whole.
pub struct MigrationJob {
    job_id: Uuid,
    workspace_id: String,
    key: WorkspaceKey,
    records: Vec<EncryptableRecord>,
    store: Arc<dyn RecordStore>,
    cadence: Cadence,
    _lease: WorkspaceLease,
}

impl MigrationJob {
    /// Takes the workspace lease, unwraps the key, and fetches every record
    /// whose flag is false or absent.
    ///
    /// Fails with `JobInProgress` if another job holds the workspace and with
    /// `NotFound` if encryption was never enabled.
    pub async fn prepare(
        workspace_id: &str,
        keyring: &Keyring,
        store: Arc<dyn RecordStore>,
        locks: &WorkspaceLocks,
        progress_interval: usize,
    ) -> EngineResult<Self> {
        let lease = locks.try_acquire(workspace_id)?;
        let key = keyring.unwrap(workspace_id).await?;
        let records = store.list(workspace_id, RecordFilter::Unencrypted).await?;

        Ok(Self {
            job_id: Uuid::now_v7(),
            workspace_id: workspace_id.to_string(),
            key,
            records,
            store,
            cadence: Cadence::new(progress_interval),
            _lease: lease,
        })
    }

    /// Number of records the run will attempt.
    pub fn total(&self) -> usize {
        self.records.len()
    }

    /// Migrates every candidate, reporting through `sink` if given.
    pub async fn run(self, sink: Option<&ProgressSink>) -> MigrationReport {
        let total = self.records.len();
        let mut report = MigrationReport {
            total,
            ..Default::default()
        };

        if total == 0 {
            debug!(
                "migration {}: nothing to migrate in workspace {}",
                self.job_id, self.workspace_id
            );
            if let Some(sink) = sink {
                if !sink
                    .emit(ProgressEvent::complete(0, 0, 0, "No records to migrate"))
                    .await
                {
                    warn!("migration {}: consumer gone before completion", self.job_id);
                    report.cancelled = true;
                }
            }
            return report;
        }

        info!(
            "migration {} started for workspace {}: {} records",
            self.job_id, self.workspace_id, total
        );

        if let Some(sink) = sink {
            if self.cadence.reports_start(total)
                && !sink
                    .emit(ProgressEvent::progress(
                        0,
                        total,
                        0,
                        0,
                        format!("Migrating {total} records"),
                    ))
                    .await
            {
                report.cancelled = true;
            }
        }

        for (index, record) in self.records.iter().enumerate() {
            if report.cancelled || sink.is_some_and(ProgressSink::is_closed) {
                report.cancelled = true;
                break;
            }

            match self.migrate_record(record).await {
                Ok(()) => report.migrated_count += 1,
                Err(e) => {
                    warn!("migration {}: record {} failed: {e}", self.job_id, record.id);
                    report.error_count += 1;
                }
            }

            let current = index + 1;
            if let Some(sink) = sink {
                if self.cadence.reports_after(current, total)
                    && !sink
                        .emit(ProgressEvent::progress(
                            current,
                            total,
                            report.migrated_count,
                            report.error_count,
                            format!("Migrated {current} of {total} records"),
                        ))
                        .await
                {
                    report.cancelled = true;
                }
            }
        }

        if report.cancelled {
            warn!(
                "migration {} cancelled by consumer after {} of {} records",
                self.job_id,
                report.migrated_count + report.error_count,
                total
            );
            return report;
        }

        if let Some(sink) = sink {
            let delivered = sink
                .emit(ProgressEvent::complete(
                    total,
                    report.migrated_count,
                    report.error_count,
                    format!(
                        "Migrated {} of {} records ({} errors)",
                        report.migrated_count, total, report.error_count
                    ),
                ))
                .await;
            if !delivered {
                warn!("migration {}: consumer gone before completion", self.job_id);
                report.cancelled = true;
            }
        }

        info!(
            "migration {} finished for workspace {}: migrated={} errors={} total={}",
            self.job_id, self.workspace_id, report.migrated_count, report.error_count, total
        );
        report
    }

    async fn migrate_record(&self, record: &EncryptableRecord) -> EngineResult<()> {
        let patch = RecordPatch {
            title: Some(seal_value(record.title.as_deref(), &self.key)?),
            description: Some(seal_value(record.description.as_deref(), &self.key)?),
            location: record
                .location
                .as_deref()
                .map(|loc| seal_value(Some(loc), &self.key))
                .transpose()?,
            is_encrypted: Some(true),
        };
        self.store.update(&record.id, patch).await?;
        Ok(())
    }
}

/// Encrypts a field unless it is already ciphertext under `key`.
///
/// A record can hold ciphertext without its flag set if an earlier run wrote
/// the fields but not the flag. The classifier only pre-filters; a value is
/// kept as-is only if it actually decrypts. Absent values become `""`.
fn seal_value(value: Option<&str>, key: &WorkspaceKey) -> CryptoResult<String> {
    let value = value.unwrap_or_default();
    if looks_like_ciphertext(Some(value)) && decrypt_field(value, key).is_ok() {
        return Ok(value.to_string());
    }
    encrypt_field(value, key)
}
