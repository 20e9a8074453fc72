//! Read-only consistency scan of a workspace.

use crate::error::EngineResult;
use crate::repair::is_drifted;
use fieldseal_crypto::looks_like_ciphertext;
use fieldseal_storage::{EncryptableRecord, RecordFilter, RecordStore};
use serde::{Deserialize, Serialize};

/// Counts of records by flag, plus how many flagged records are drifted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyReport {
    pub total: usize,
    /// Flagged `is_encrypted = true`.
    pub true_encrypted: usize,
    /// Flag false or absent.
    pub false_encrypted: usize,
    /// Flagged encrypted, but the title fails the classifier.
    pub marked_encrypted_but_plaintext: usize,
    pub samples: Vec<VerifySample>,
}

/// A drifted record, described without exposing its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifySample {
    pub id: String,
    pub failing_fields: Vec<String>,
    pub title_len: usize,
}

impl VerifySample {
    fn from_record(record: &EncryptableRecord) -> Self {
        let mut failing_fields = Vec::new();
        if !looks_like_ciphertext(record.title.as_deref()) {
            failing_fields.push("title".to_string());
        }
        if !looks_like_ciphertext(record.description.as_deref()) {
            failing_fields.push("description".to_string());
        }
        if record.location.is_some() && !looks_like_ciphertext(record.location.as_deref()) {
            failing_fields.push("location".to_string());
        }
        Self {
            id: record.id.clone(),
            failing_fields,
            title_len: record.title.as_deref().map_or(0, |t| t.chars().count()),
        }
    }
}

/// Scans every record of a workspace. Never writes.
pub async fn verify_workspace(
    store: &dyn RecordStore,
    workspace_id: &str,
    sample_limit: usize,
) -> EngineResult<VerifyReport> {
    let records = store.list(workspace_id, RecordFilter::All).await?;

    let mut report = VerifyReport {
        total: records.len(),
        ..Default::default()
    };
    for record in &records {
        if !record.is_flagged_encrypted() {
            report.false_encrypted += 1;
            continue;
        }
        report.true_encrypted += 1;
        if is_drifted(record) {
            report.marked_encrypted_but_plaintext += 1;
            if report.samples.len() < sample_limit {
                report.samples.push(VerifySample::from_record(record));
            }
        }
    }
    Ok(report)
}
