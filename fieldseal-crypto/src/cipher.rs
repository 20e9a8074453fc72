//! AES-256-GCM sealing shared by the key envelope and the field cipher.
//!
//! Sealed format (before base64): `[nonce:12][ciphertext:N][tag:16]`.

use crate::error::{CryptoError, CryptoResult};
use crate::key::KEY_SIZE;
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;

/// GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Smallest decoded length any sealed value can have.
pub const MIN_SEALED_LEN: usize = NONCE_SIZE + TAG_SIZE;

fn cipher_for(key: &[u8; KEY_SIZE]) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key))
}

/// Encrypts `plaintext` under `key` with a fresh random nonce and returns
/// the base64 encoding of `nonce ‖ ciphertext ‖ tag`.
pub(crate) fn seal(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> CryptoResult<String> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rng().fill_bytes(&mut nonce);

    let body = cipher_for(key)
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut sealed = Vec::with_capacity(NONCE_SIZE + body.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&body);
    Ok(STANDARD.encode(sealed))
}

/// Inverse of [`seal`]. Structural checks run before any decryption so a
/// malformed value is never confused with a wrong key.
pub(crate) fn open(key: &[u8; KEY_SIZE], encoded: &str) -> CryptoResult<Vec<u8>> {
    let sealed = STANDARD
        .decode(encoded)
        .map_err(|e| CryptoError::MalformedInput(format!("invalid base64: {e}")))?;

    if sealed.len() < MIN_SEALED_LEN {
        return Err(CryptoError::MalformedInput(format!(
            "decoded length {} is below the {MIN_SEALED_LEN}-byte minimum",
            sealed.len()
        )));
    }

    let (nonce, body) = sealed.split_at(NONCE_SIZE);
    cipher_for(key)
        .decrypt(Nonce::from_slice(nonce), body)
        .map_err(|_| CryptoError::Decryption)
}
