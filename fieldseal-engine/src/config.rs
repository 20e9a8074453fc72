//! Engine configuration.

use crate::error::{EngineError, EngineResult};
use fieldseal_crypto::{DEFAULT_MASTER_KEY_ENV, KdfParams, MasterKeySource};
use serde::{Deserialize, Serialize};

/// Configuration for the encryption engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Environment variable holding the master passphrase.
    pub master_key_env: String,

    /// Emit a progress event every this many records.
    pub progress_interval: usize,

    /// Events buffered between a running job and its consumer.
    pub progress_channel_capacity: usize,

    /// Maximum samples returned by a verify scan.
    pub verify_sample_limit: usize,

    /// Argon2id cost for stretching the master passphrase.
    pub kdf: KdfParams,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            master_key_env: DEFAULT_MASTER_KEY_ENV.to_string(),
            progress_interval: 5,
            progress_channel_capacity: 32,
            verify_sample_limit: 5,
            kdf: KdfParams::default(),
        }
    }
}

impl EngineConfig {
    /// Rejects values that would stall or break a job.
    pub fn validate(&self) -> EngineResult<()> {
        if self.master_key_env.trim().is_empty() {
            return Err(EngineError::Configuration(
                "master_key_env must name an environment variable".into(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(EngineError::Configuration(
                "progress_interval must be at least 1".into(),
            ));
        }
        if self.progress_channel_capacity == 0 {
            return Err(EngineError::Configuration(
                "progress_channel_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Master key source reading `master_key_env` on every call.
    pub fn master_key_source(&self) -> MasterKeySource {
        MasterKeySource::from_env(self.master_key_env.clone()).with_kdf_params(self.kdf)
    }
}
