//! Key material and master-key derivation.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// Domain-separated fixed salt for master key stretching. The master key is
/// process configuration, not a user password, so there is no per-user salt
/// to store.
const MASTER_KEY_SALT: &[u8] = b"fieldseal-master-key-v1";

/// Unwrapped per-workspace data key.
///
/// Lives only for the duration of one operation and is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct WorkspaceKey {
    bytes: [u8; KEY_SIZE],
}

impl WorkspaceKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Builds a key from an arbitrary slice, rejecting anything but 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let bytes: [u8; KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeyLength {
            expected: KEY_SIZE,
            actual: bytes.len(),
        })?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for WorkspaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WorkspaceKey(..)")
    }
}

/// Master key stretched from the configured passphrase. Never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct MasterKey {
    bytes: [u8; KEY_SIZE],
}

impl MasterKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(..)")
    }
}

/// Argon2id cost parameters used to stretch the master passphrase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    /// Cheap parameters for tests. Never use in production.
    pub fn test() -> Self {
        Self {
            memory_kib: 64,
            iterations: 1,
            parallelism: 1,
        }
    }
}

/// Generates a fresh 256-bit workspace key from the OS-seeded CSPRNG.
pub fn generate_workspace_key() -> WorkspaceKey {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rng().fill_bytes(&mut bytes);
    let key = WorkspaceKey::from_bytes(bytes);
    bytes.zeroize();
    key
}

/// Stretches a master passphrase of any length into an AES-256 key.
pub fn derive_master_key(passphrase: &str, params: &KdfParams) -> CryptoResult<MasterKey> {
    let argon_params = Params::new(
        params.memory_kib,
        params.iterations,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(|e| CryptoError::KeyDerivation(format!("invalid KDF parameters: {e}")))?;
    let argon = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon_params);

    let mut out = [0u8; KEY_SIZE];
    argon
        .hash_password_into(passphrase.as_bytes(), MASTER_KEY_SALT, &mut out)
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;

    let key = MasterKey::from_bytes(out);
    out.zeroize();
    Ok(key)
}
