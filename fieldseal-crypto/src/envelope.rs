//! Envelope encryption of workspace keys under the master key.
//!
//! Workspace keys are wrapped with the same AES-256-GCM construction used for
//! fields, so a wrapped key is an ordinary base64 sealed value. Every wrap
//! draws a fresh nonce: wrapping one key twice yields two different strings.

use crate::cipher::{open, seal};
use crate::error::{CryptoError, CryptoResult};
use crate::key::{KEY_SIZE, MasterKey, WorkspaceKey};
use zeroize::Zeroize;

/// Wraps (encrypts) a workspace key under the master key.
pub fn wrap_workspace_key(key: &WorkspaceKey, master: &MasterKey) -> CryptoResult<String> {
    seal(master.as_bytes(), key.as_bytes())
}

/// Unwraps a workspace key.
///
/// Fails with [`CryptoError::Decryption`] under the wrong master key or after
/// tampering, and with [`CryptoError::MalformedInput`] for truncated or
/// non-base64 input. Partially decrypted material is never returned.
pub fn unwrap_workspace_key(wrapped: &str, master: &MasterKey) -> CryptoResult<WorkspaceKey> {
    let mut plaintext = open(master.as_bytes(), wrapped)?;

    if plaintext.len() != KEY_SIZE {
        let actual = plaintext.len();
        plaintext.zeroize();
        return Err(CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual,
        });
    }

    let key = WorkspaceKey::from_slice(&plaintext);
    plaintext.zeroize();
    key
}
