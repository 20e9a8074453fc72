//! Encryption layer for fieldseal.
//!
//! Protects per-record text fields at rest using:
//! - Argon2id to stretch the configured master passphrase
//! - AES-256-GCM for authenticated encryption of keys and fields
//! - Zeroization of key material on drop
//!
//! # Architecture
//!
//! Keys form a two-tier envelope:
//!
//! 1. **Master Key**: One per process, resolved from configuration by a
//!    [`MasterKeySource`]. Never persisted by this crate.
//!
//! 2. **Workspace Key**: A random 256-bit key per workspace. It is stored
//!    only in wrapped form (encrypted under the master key) and unwrapped
//!    for the duration of a single operation.
//!
//! Every sealed value, wrapped key or field, is
//! `base64(nonce[12] ‖ ciphertext ‖ tag[16])`.

mod cipher;
pub mod classifier;
pub mod envelope;
mod error;
pub mod field;
mod key;
pub mod master_key;

pub use cipher::{MIN_SEALED_LEN, NONCE_SIZE, TAG_SIZE};
pub use classifier::{MIN_CIPHERTEXT_CHARS, looks_like_ciphertext};
pub use envelope::{unwrap_workspace_key, wrap_workspace_key};
pub use error::{CryptoError, CryptoResult};
pub use field::{
    RecordFields, decrypt_field, decrypt_field_lenient, decrypt_record_fields, encrypt_field,
    encrypt_record_fields,
};
pub use key::{
    KEY_SIZE, KdfParams, MasterKey, WorkspaceKey, derive_master_key, generate_workspace_key,
};
pub use master_key::{DEFAULT_MASTER_KEY_ENV, MasterKeySource};
