//! Batch helpers for the record read and write paths.

use crate::error::EngineResult;
use fieldseal_crypto::{WorkspaceKey, decrypt_field, encrypt_field};
use fieldseal_storage::EncryptableRecord;
use tracing::warn;

/// Encrypts records for storage and marks them encrypted. Absent title and
/// description become `""`; an absent location stays absent.
pub fn encrypt_records(
    records: &[EncryptableRecord],
    key: &WorkspaceKey,
) -> EngineResult<Vec<EncryptableRecord>> {
    records
        .iter()
        .map(|record| {
            Ok(EncryptableRecord {
                id: record.id.clone(),
                workspace_id: record.workspace_id.clone(),
                title: Some(encrypt_field(record.title.as_deref().unwrap_or_default(), key)?),
                description: Some(encrypt_field(
                    record.description.as_deref().unwrap_or_default(),
                    key,
                )?),
                location: record
                    .location
                    .as_deref()
                    .map(|loc| encrypt_field(loc, key))
                    .transpose()?,
                is_encrypted: Some(true),
            })
        })
        .collect()
}

/// Decrypts records for display.
///
/// Records not flagged encrypted pass through untouched. A field that fails
/// to decrypt is returned as stored, so legacy or drifted data stays
/// readable; the failure is logged, never the value.
pub fn decrypt_records(
    records: &[EncryptableRecord],
    key: &WorkspaceKey,
) -> Vec<EncryptableRecord> {
    records
        .iter()
        .map(|record| {
            if !record.is_flagged_encrypted() {
                return record.clone();
            }
            let open = |field: &str, value: &str| {
                decrypt_field(value, key).unwrap_or_else(|e| {
                    warn!("returning stored {field} of record {}: {e}", record.id);
                    value.to_string()
                })
            };
            EncryptableRecord {
                id: record.id.clone(),
                workspace_id: record.workspace_id.clone(),
                title: Some(open("title", record.title.as_deref().unwrap_or_default())),
                description: Some(open(
                    "description",
                    record.description.as_deref().unwrap_or_default(),
                )),
                location: record.location.as_deref().map(|loc| open("location", loc)),
                is_encrypted: record.is_encrypted,
            }
        })
        .collect()
}
