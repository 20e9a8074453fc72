//! Field-level encryption of record text under a workspace key.
//!
//! Empty strings are never encrypted: `""` is a meaningful, safe-to-leak
//! state ("no description") and is treated as a valid encrypted value by the
//! classifier. Every non-empty field gets its own nonce, so equal plaintexts
//! never produce equal ciphertexts.

use crate::cipher::{open, seal};
use crate::error::{CryptoError, CryptoResult};
use crate::key::WorkspaceKey;
use serde::{Deserialize, Serialize};

/// The encryptable text fields of a record.
///
/// `location` is optional: an absent location stays absent through
/// encryption, which keeps "not provided" distinct from "provided but empty".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFields {
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// Encrypts a single field. `""` is returned unchanged.
pub fn encrypt_field(plaintext: &str, key: &WorkspaceKey) -> CryptoResult<String> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    seal(key.as_bytes(), plaintext.as_bytes())
}

/// Decrypts a single field. `""` is returned unchanged.
pub fn decrypt_field(ciphertext: &str, key: &WorkspaceKey) -> CryptoResult<String> {
    if ciphertext.is_empty() {
        return Ok(String::new());
    }
    let bytes = open(key.as_bytes(), ciphertext)?;
    String::from_utf8(bytes)
        .map_err(|_| CryptoError::MalformedInput("decrypted field is not valid UTF-8".into()))
}

/// Read-path decryption that returns the stored value unchanged when it
/// cannot be decrypted (legacy plaintext, wrong key, corruption).
///
/// Batch jobs must not use this: they need the error to count it.
pub fn decrypt_field_lenient(value: &str, key: &WorkspaceKey) -> String {
    decrypt_field(value, key).unwrap_or_else(|_| value.to_string())
}

/// Encrypts each field independently.
pub fn encrypt_record_fields(
    fields: &RecordFields,
    key: &WorkspaceKey,
) -> CryptoResult<RecordFields> {
    Ok(RecordFields {
        title: encrypt_field(&fields.title, key)?,
        description: encrypt_field(&fields.description, key)?,
        location: fields
            .location
            .as_deref()
            .map(|loc| encrypt_field(loc, key))
            .transpose()?,
    })
}

/// Strict inverse of [`encrypt_record_fields`].
pub fn decrypt_record_fields(
    fields: &RecordFields,
    key: &WorkspaceKey,
) -> CryptoResult<RecordFields> {
    Ok(RecordFields {
        title: decrypt_field(&fields.title, key)?,
        description: decrypt_field(&fields.description, key)?,
        location: fields
            .location
            .as_deref()
            .map(|loc| decrypt_field(loc, key))
            .transpose()?,
    })
}
