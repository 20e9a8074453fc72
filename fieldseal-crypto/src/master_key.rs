//! Resolution of the process-wide master key.
//!
//! A [`MasterKeySource`] is an explicit handle passed to whatever needs the
//! master key; there is no global. The configured value is re-read on every
//! call so a changed value takes effect immediately. Only the Argon2id
//! stretching is cached, keyed by a digest of the passphrase.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{KdfParams, MasterKey, derive_master_key};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::{Arc, Mutex};
use zeroize::Zeroizing;

/// Default environment variable holding the master passphrase.
pub const DEFAULT_MASTER_KEY_ENV: &str = "ENCRYPTION_MASTER_KEY";

#[derive(Clone)]
enum Origin {
    Env(String),
    Fixed(Arc<Zeroizing<String>>),
}

struct CachedKey {
    fingerprint: Vec<u8>,
    key: MasterKey,
}

/// Resolves the master key from external configuration.
#[derive(Clone)]
pub struct MasterKeySource {
    origin: Origin,
    params: KdfParams,
    cache: Arc<Mutex<Option<CachedKey>>>,
}

impl MasterKeySource {
    /// Reads the passphrase from `var` at call time.
    pub fn from_env(var: impl Into<String>) -> Self {
        Self::with_origin(Origin::Env(var.into()))
    }

    /// Uses a fixed passphrase supplied by the embedder.
    pub fn from_passphrase(passphrase: impl Into<String>) -> Self {
        Self::with_origin(Origin::Fixed(Arc::new(Zeroizing::new(passphrase.into()))))
    }

    fn with_origin(origin: Origin) -> Self {
        Self {
            origin,
            params: KdfParams::default(),
            cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Overrides the Argon2id cost parameters.
    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.params = params;
        self
    }

    /// True iff the master key is present and non-empty. Whitespace counts
    /// as present.
    pub fn is_encryption_enabled(&self) -> bool {
        self.raw_value().is_some()
    }

    /// Resolves and stretches the master key.
    ///
    /// Fails with [`CryptoError::MasterKeyMissing`] when unset or empty. That
    /// is a configuration error; callers must not retry it.
    pub fn get_master_key(&self) -> CryptoResult<MasterKey> {
        let passphrase = self.raw_value().ok_or_else(|| CryptoError::MasterKeyMissing {
            source_name: self.source_name(),
        })?;
        let fingerprint = Sha256::digest(passphrase.as_bytes()).to_vec();

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(cached) = cache.as_ref() {
            if cached.fingerprint == fingerprint {
                return Ok(cached.key.clone());
            }
        }

        let key = derive_master_key(&passphrase, &self.params)?;
        *cache = Some(CachedKey {
            fingerprint,
            key: key.clone(),
        });
        Ok(key)
    }

    fn raw_value(&self) -> Option<Zeroizing<String>> {
        let value = match &self.origin {
            Origin::Env(var) => Zeroizing::new(std::env::var(var).ok()?),
            Origin::Fixed(passphrase) => Zeroizing::new(passphrase.as_str().to_owned()),
        };
        (!value.is_empty()).then_some(value)
    }

    fn source_name(&self) -> String {
        match &self.origin {
            Origin::Env(var) => format!("{var} environment variable"),
            Origin::Fixed(_) => "fixed master key".to_string(),
        }
    }
}

impl Default for MasterKeySource {
    fn default() -> Self {
        Self::from_env(DEFAULT_MASTER_KEY_ENV)
    }
}

impl fmt::Debug for MasterKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKeySource")
            .field("source", &self.source_name())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
