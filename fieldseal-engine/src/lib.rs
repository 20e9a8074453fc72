//! Workspace encryption engine.
//!
//! Ties the crypto layer to the record store:
//!
//! - [`Keyring`] creates, unwraps, and destroys per-workspace keys
//! - [`MigrationJob`] encrypts a workspace's legacy plaintext records
//! - [`IntegrityRepairJob`] re-encrypts records flagged encrypted whose
//!   content is still plaintext
//! - [`EncryptionService`] exposes status, enable, disable, verify, migrate,
//!   and repair behind an [`AuthorizationPolicy`]
//!
//! Batch jobs run one record at a time within a workspace, hold a
//! per-workspace lease for their whole run, and stream [`ProgressEvent`]s to
//! the caller. Per-record failures are counted, never fatal.

pub mod authz;
mod config;
mod error;
mod keyring;
mod locks;
pub mod migration;
pub mod progress;
pub mod reader;
pub mod repair;
mod service;
pub mod verify;

pub use authz::{AllowAllPolicy, AuthorizationDecision, AuthorizationPolicy, DenialReason};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use keyring::Keyring;
pub use locks::{WorkspaceLease, WorkspaceLocks};
pub use migration::{MigrationJob, MigrationReport};
pub use progress::{ProgressEvent, ProgressPhase, ProgressSink, ProgressStream, progress_channel};
pub use reader::{decrypt_records, encrypt_records};
pub use repair::{IntegrityRepairJob, RepairReport, is_drifted};
pub use service::{
    DisableOutcome, EnableOutcome, EncryptionService, EncryptionStatus, JobHandle, JobRun,
};
pub use verify::{VerifyReport, VerifySample, verify_workspace};
