//! Storage layer for fieldseal.
//!
//! The engine consumes storage through two narrow async contracts:
//!
//! - [`RecordStore`]: list a workspace's records by encryption flag and
//!   apply partial updates keyed by record id
//! - [`KeyRecordStore`]: at most one wrapped key per workspace
//!
//! Two backends are provided. The in-memory one suits tests and embedders;
//! the DuckDB one keeps records and keys in a single database file.

mod duck_store;
mod error;
mod memory;
mod record_store;
mod types;

pub use duck_store::DuckRecordStore;
pub use error::{StorageError, StorageResult};
pub use memory::{MemoryKeyStore, MemoryRecordStore};
pub use record_store::{KeyRecordStore, RecordStore};
pub use types::{EncryptableRecord, RecordFilter, RecordPatch, WorkspaceKeyRecord};
