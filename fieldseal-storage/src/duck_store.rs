//! DuckDB-backed record and key-record store.

use crate::error::{StorageError, StorageResult};
use crate::record_store::{KeyRecordStore, RecordStore};
use crate::types::{EncryptableRecord, RecordFilter, RecordPatch, WorkspaceKeyRecord};
use async_trait::async_trait;
use chrono::DateTime;
use duckdb::{Connection, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::warn;

const MEMORY_LIMIT: &str = "128MB";
const THREADS: u32 = 1;

/// Persists encryptable records and wrapped workspace keys in one database.
#[derive(Clone)]
pub struct DuckRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckRecordStore {
    /// Opens or creates a store at the given path.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = open_with_wal_recovery(path)?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Inserts or replaces a record.
    pub fn insert_record(&self, record: &EncryptableRecord) -> StorageResult<()> {
        let conn = lock(&self.conn)?;
        conn.execute(
            "INSERT OR REPLACE INTO encryptable_records \
             (id, workspace_id, title, description, location, is_encrypted) \
             VALUES (?, ?, ?, ?, ?, ?)",
            params![
                record.id,
                record.workspace_id,
                record.title,
                record.description,
                record.location,
                record.is_encrypted,
            ],
        )?;
        Ok(())
    }

    /// Gets a single record by id.
    pub fn get_record(&self, id: &str) -> StorageResult<Option<EncryptableRecord>> {
        let conn = lock(&self.conn)?;
        let result = conn.query_row(
            "SELECT id, workspace_id, title, description, location, is_encrypted \
             FROM encryptable_records WHERE id = ?",
            params![id],
            row_to_record,
        );

        match result {
            Ok(record) => Ok(Some(record)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Runs blocking database work off the async runtime.
    async fn with_conn<T, F>(&self, f: F) -> StorageResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StorageResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = lock(&conn)?;
            f(&guard)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("blocking task failed: {e}")))?
    }
}

fn lock(conn: &Mutex<Connection>) -> StorageResult<std::sync::MutexGuard<'_, Connection>> {
    conn.lock()
        .map_err(|e| StorageError::Backend(format!("connection lock poisoned: {e}")))
}

fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS encryptable_records (
            id VARCHAR PRIMARY KEY,
            workspace_id VARCHAR NOT NULL,
            title VARCHAR,
            description VARCHAR,
            location VARCHAR,
            is_encrypted BOOLEAN
        );

        CREATE TABLE IF NOT EXISTS workspace_keys (
            workspace_id VARCHAR PRIMARY KEY,
            wrapped_key VARCHAR NOT NULL,
            created_at BIGINT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

fn filter_clause(filter: RecordFilter) -> &'static str {
    match filter {
        RecordFilter::All => "TRUE",
        RecordFilter::Unencrypted => "COALESCE(is_encrypted, FALSE) = FALSE",
        RecordFilter::Encrypted => "COALESCE(is_encrypted, FALSE) = TRUE",
    }
}

fn row_to_record(row: &duckdb::Row<'_>) -> duckdb::Result<EncryptableRecord> {
    Ok(EncryptableRecord {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        is_encrypted: row.get(5)?,
    })
}

/// Retries once without the WAL if it is what keeps the database from opening.
fn open_with_wal_recovery(path: &Path) -> StorageResult<Connection> {
    let conn = match Connection::open(path) {
        Ok(conn) => conn,
        Err(err) => {
            let wal = wal_path(path);
            if !wal.exists() {
                return Err(err.into());
            }
            warn!(wal = %wal.display(), "record store failed to open, discarding stale WAL");
            std::fs::remove_file(&wal)?;
            Connection::open(path)?
        }
    };
    conn.execute_batch(&format!(
        "PRAGMA memory_limit='{MEMORY_LIMIT}'; PRAGMA threads={THREADS};"
    ))?;
    Ok(conn)
}

fn wal_path(path: &Path) -> PathBuf {
    let mut wal = path.as_os_str().to_owned();
    wal.push(".wal");
    PathBuf::from(wal)
}

#[async_trait]
impl RecordStore for DuckRecordStore {
    async fn list(
        &self,
        workspace_id: &str,
        filter: RecordFilter,
    ) -> StorageResult<Vec<EncryptableRecord>> {
        let workspace_id = workspace_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT id, workspace_id, title, description, location, is_encrypted \
                 FROM encryptable_records WHERE workspace_id = ? AND {} ORDER BY id",
                filter_clause(filter)
            );
            let mut stmt = conn.prepare(&sql)?;
            let records = stmt
                .query_map(params![workspace_id], row_to_record)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(records)
        })
        .await
    }

    async fn update(&self, id: &str, patch: RecordPatch) -> StorageResult<()> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE encryptable_records SET \
                 title = COALESCE(CAST(? AS VARCHAR), title), \
                 description = COALESCE(CAST(? AS VARCHAR), description), \
                 location = COALESCE(CAST(? AS VARCHAR), location), \
                 is_encrypted = COALESCE(CAST(? AS BOOLEAN), is_encrypted) \
                 WHERE id = ?",
                params![
                    patch.title,
                    patch.description,
                    patch.location,
                    patch.is_encrypted,
                    id,
                ],
            )?;
            if changed == 0 {
                return Err(StorageError::NotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn count(&self, workspace_id: &str, filter: RecordFilter) -> StorageResult<usize> {
        let workspace_id = workspace_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT COUNT(*) FROM encryptable_records WHERE workspace_id = ? AND {}",
                filter_clause(filter)
            );
            let count: i64 = conn.query_row(&sql, params![workspace_id], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

#[async_trait]
impl KeyRecordStore for DuckRecordStore {
    async fn get_key(&self, workspace_id: &str) -> StorageResult<Option<WorkspaceKeyRecord>> {
        let workspace_id = workspace_id.to_string();
        self.with_conn(move |conn| {
            let result = conn.query_row(
                "SELECT workspace_id, wrapped_key, created_at FROM workspace_keys \
                 WHERE workspace_id = ?",
                params![workspace_id],
                |row| {
                    let workspace_id: String = row.get(0)?;
                    let wrapped_key: String = row.get(1)?;
                    let created_at: i64 = row.get(2)?;
                    Ok((workspace_id, wrapped_key, created_at))
                },
            );

            let (workspace_id, wrapped_key, created_ms) = match result {
                Ok(row) => row,
                Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e.into()),
            };
            let created_at = DateTime::from_timestamp_millis(created_ms).ok_or_else(|| {
                StorageError::Backend(format!("invalid created_at for {workspace_id}"))
            })?;

            Ok(Some(WorkspaceKeyRecord {
                workspace_id,
                wrapped_key,
                created_at,
            }))
        })
        .await
    }

    async fn insert_key_if_absent(&self, record: WorkspaceKeyRecord) -> StorageResult<bool> {
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO workspace_keys (workspace_id, wrapped_key, created_at) \
                 VALUES (?, ?, ?)",
                params![
                    record.workspace_id,
                    record.wrapped_key,
                    record.created_at.timestamp_millis(),
                ],
            )?;
            Ok(inserted > 0)
        })
        .await
    }

    async fn delete_key(&self, workspace_id: &str) -> StorageResult<bool> {
        let workspace_id = workspace_id.to_string();
        self.with_conn(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM workspace_keys WHERE workspace_id = ?",
                params![workspace_id],
            )?;
            Ok(deleted > 0)
        })
        .await
    }
}
