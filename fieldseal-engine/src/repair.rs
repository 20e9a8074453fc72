//! Integrity repair of records whose flag and content have drifted apart.
//!
//! A record is drifted when it is flagged `is_encrypted = true` but its
//! title does not look like ciphertext. Only drifted records are written,
//! and within them only fields that fail the classifier are re-encrypted.
//! Re-encrypting a value that is already ciphertext would bury it under a
//! second layer that the read path cannot undo.

use crate::error::EngineResult;
use crate::keyring::Keyring;
use crate::locks::{WorkspaceLease, WorkspaceLocks};
use crate::progress::{Cadence, ProgressEvent, ProgressSink};
use fieldseal_crypto::{CryptoResult, WorkspaceKey, encrypt_field, looks_like_ciphertext};
use fieldseal_storage::{EncryptableRecord, RecordFilter, RecordPatch, RecordStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Outcome of a repair run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairReport {
    /// Records flagged encrypted.
    pub total_scanned: usize,
    pub total_corrupt: usize,
    pub fixed_count: usize,
    pub error_count: usize,
    pub cancelled: bool,
}

/// True for a record flagged encrypted whose title is not ciphertext.
/// An absent title counts as drifted.
pub fn is_drifted(record: &EncryptableRecord) -> bool {
    record.is_flagged_encrypted() && !looks_like_ciphertext(record.title.as_deref())
}

/// A prepared repair: leased, key unwrapped, drifted records selected.
pub struct IntegrityRepairJob {
    job_id: Uuid,
    workspace_id: String,
    key: WorkspaceKey,
    scanned: usize,
    corrupt: Vec<EncryptableRecord>,
    store: Arc<dyn RecordStore>,
    cadence: Cadence,
    _lease: WorkspaceLease,
}

impl IntegrityRepairJob {
    /// Takes the workspace lease, unwraps the key, and scans every record
    /// flagged encrypted.
    pub async fn prepare(
        workspace_id: &str,
        keyring: &Keyring,
        store: Arc<dyn RecordStore>,
        locks: &WorkspaceLocks,
        progress_interval: usize,
    ) -> EngineResult<Self> {
        let lease = locks.try_acquire(workspace_id)?;
        let key = keyring.unwrap(workspace_id).await?;
        let flagged = store.list(workspace_id, RecordFilter::Encrypted).await?;
        let scanned = flagged.len();
        let corrupt: Vec<EncryptableRecord> = flagged.into_iter().filter(is_drifted).collect();

        debug!(
            "repair scan of workspace {workspace_id}: {} of {scanned} flagged records drifted",
            corrupt.len()
        );

        Ok(Self {
            job_id: Uuid::now_v7(),
            workspace_id: workspace_id.to_string(),
            key,
            scanned,
            corrupt,
            store,
            cadence: Cadence::new(progress_interval),
            _lease: lease,
        })
    }

    pub fn total_corrupt(&self) -> usize {
        self.corrupt.len()
    }

    /// Re-encrypts every drifted record, streaming progress to `sink`.
    pub async fn run(self, sink: &ProgressSink) -> RepairReport {
        let total = self.corrupt.len();
        let mut report = RepairReport {
            total_scanned: self.scanned,
            total_corrupt: total,
            ..Default::default()
        };

        info!(
            "repair {} started for workspace {}: {} corrupt of {} scanned",
            self.job_id, self.workspace_id, total, self.scanned
        );

        if self.cadence.reports_start(total)
            && !sink
                .emit(ProgressEvent::progress(
                    0,
                    total,
                    0,
                    0,
                    format!("Found {total} corrupt records out of {}", self.scanned),
                ))
                .await
        {
            report.cancelled = true;
        }

        for (index, record) in self.corrupt.iter().enumerate() {
            if report.cancelled || sink.is_closed() {
                report.cancelled = true;
                break;
            }

            match self.repair_record(record).await {
                Ok(()) => report.fixed_count += 1,
                Err(e) => {
                    warn!("repair {}: record {} failed: {e}", self.job_id, record.id);
                    report.error_count += 1;
                }
            }

            let current = index + 1;
            if self.cadence.reports_after(current, total)
                && !sink
                    .emit(ProgressEvent::progress(
                        current,
                        total,
                        report.fixed_count,
                        report.error_count,
                        format!("Repaired {current} of {total} records"),
                    ))
                    .await
            {
                report.cancelled = true;
            }
        }

        if report.cancelled {
            warn!(
                "repair {} cancelled by consumer after {} of {} records",
                self.job_id,
                report.fixed_count + report.error_count,
                total
            );
            return report;
        }

        let message = if total == 0 {
            format!("No corrupt records among {} scanned", self.scanned)
        } else {
            format!(
                "Repaired {} of {} corrupt records ({} errors)",
                report.fixed_count, total, report.error_count
            )
        };
        if !sink
            .emit(ProgressEvent::complete(
                total,
                report.fixed_count,
                report.error_count,
                message,
            ))
            .await
        {
            warn!("repair {}: consumer gone before completion", self.job_id);
            report.cancelled = true;
        }

        info!(
            "repair {} finished for workspace {}: fixed={} errors={} corrupt={}",
            self.job_id, self.workspace_id, report.fixed_count, report.error_count, total
        );
        report
    }

    async fn repair_record(&self, record: &EncryptableRecord) -> EngineResult<()> {
        let patch = RecordPatch {
            title: repair_value(record.title.as_deref(), &self.key)?,
            description: repair_value(record.description.as_deref(), &self.key)?,
            location: match record.location.as_deref() {
                Some(loc) => repair_value(Some(loc), &self.key)?,
                None => None,
            },
            is_encrypted: Some(true),
        };
        self.store.update(&record.id, patch).await?;
        Ok(())
    }
}

/// The replacement for one field of a drifted record, or `None` to leave
/// the stored value alone. Absent values are written as `""`.
fn repair_value(value: Option<&str>, key: &WorkspaceKey) -> CryptoResult<Option<String>> {
    match value {
        None => Ok(Some(String::new())),
        Some(v) if looks_like_ciphertext(Some(v)) => Ok(None),
        Some(v) => encrypt_field(v, key).map(Some),
    }
}
