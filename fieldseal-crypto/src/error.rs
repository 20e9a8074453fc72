//! Crypto error types.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while deriving, wrapping, or using keys.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The master key is unset or empty. Fatal for any encryption operation.
    #[error("{source_name} is not configured")]
    MasterKeyMissing { source_name: String },

    #[error("invalid key length: expected {expected} bytes for AES-256, got {actual} bytes")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Authentication tag mismatch: wrong key or tampered data.
    #[error("decryption failed (wrong key or tampered data)")]
    Decryption,

    /// Input was rejected before decryption was attempted.
    #[error("malformed ciphertext: {0}")]
    MalformedInput(String),
}

impl CryptoError {
    /// True for failures caused by the shape of the input rather than the key.
    pub fn is_malformed(&self) -> bool {
        matches!(self, CryptoError::MalformedInput(_))
    }

    /// True when the master key could not be resolved.
    pub fn is_configuration(&self) -> bool {
        matches!(self, CryptoError::MasterKeyMissing { .. })
    }
}
