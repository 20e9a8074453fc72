//! Engine error taxonomy.

use crate::authz::DenialReason;
use fieldseal_crypto::CryptoError;
use fieldseal_storage::StorageError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by engine operations.
///
/// Configuration and authorization errors abort an operation before any
/// record is touched. Inside a batch job, per-record crypto and persistence
/// errors are counted instead of returned.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The master key is absent or the engine is misconfigured. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("not authorized for workspace {workspace_id}: {reason}")]
    Authorization {
        workspace_id: String,
        reason: DenialReason,
    },

    #[error("not found: {0}")]
    NotFound(String),

    /// Tag mismatch on unwrap or decrypt: wrong key or tampering.
    #[error("crypto error: {0}")]
    Crypto(#[source] CryptoError),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("persistence error: {0}")]
    Persistence(#[source] StorageError),

    #[error("a batch job is already running for workspace {0}")]
    JobInProgress(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Only transient store failures and lock contention are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::Persistence(_) | EngineError::JobInProgress(_)
        )
    }

    /// The policy's reason code, for authorization failures.
    pub fn denial_reason(&self) -> Option<DenialReason> {
        match self {
            EngineError::Authorization { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

impl From<CryptoError> for EngineError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::MasterKeyMissing { .. } | CryptoError::KeyDerivation(_) => {
                EngineError::Configuration(err.to_string())
            }
            CryptoError::MalformedInput(msg) => EngineError::MalformedInput(msg),
            CryptoError::InvalidKeyLength { .. } => EngineError::MalformedInput(err.to_string()),
            CryptoError::Encryption(_) | CryptoError::Decryption => EngineError::Crypto(err),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => EngineError::NotFound(format!("record {id}")),
            other => EngineError::Persistence(other),
        }
    }
}
