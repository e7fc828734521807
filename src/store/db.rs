use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{Connection, ErrorCode, params};
use serde_json::{Map, Value};
use tracing::debug;

use super::models::{WorkflowRecord, WorkflowUpdate};
use crate::errors::StoreError;

/// How long a single store operation waits on another writer's lock before
/// giving up. Reporting calls come from batch jobs at unpredictable times,
/// so a stalled call must fail rather than hang the host computation.
const BUSY_TIMEOUT_MS: u64 = 5_000;

/// Durable hash -> [`WorkflowRecord`] store, shared by every process that
/// runs a tracked workflow.
///
/// Backed by a single SQLite file on the shared filesystem. The journal mode
/// stays at SQLite's rollback default: WAL needs a shared-memory index that
/// the network filesystems cluster nodes mount cannot provide. Writers are
/// serialized by SQLite's file locking; each `update` is one statement, so
/// one call's fields land together and racing calls to different hashes
/// cannot interleave.
pub struct WorkflowDb {
    conn: Connection,
    path: PathBuf,
}

impl WorkflowDb {
    /// Open (or create) the store at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::Unavailable {
            path: path.to_path_buf(),
            source: e,
        })?;
        let db = Self {
            conn,
            path: path.to_path_buf(),
        };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let path = PathBuf::from(":memory:");
        let conn = Connection::open_in_memory().map_err(|e| StoreError::Unavailable {
            path: path.clone(),
            source: e,
        })?;
        let db = Self { conn, path };
        db.init()?;
        Ok(db)
    }

    /// Path of the backing file, for diagnostics.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init(&self) -> Result<(), StoreError> {
        self.conn
            .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))
            .map_err(|e| self.store_err(e))?;
        self.run_migrations()
    }

    fn run_migrations(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS workflows (
                    hash TEXT PRIMARY KEY,
                    run_directory TEXT NOT NULL DEFAULT '',
                    stage TEXT NOT NULL DEFAULT '',
                    attributes TEXT NOT NULL DEFAULT '{}',
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                );
                ",
            )
            .map_err(|e| self.store_err(e))
    }

    fn store_err(&self, e: rusqlite::Error) -> StoreError {
        if is_busy(&e) {
            StoreError::Busy {
                path: self.path.clone(),
            }
        } else {
            StoreError::Unavailable {
                path: self.path.clone(),
                source: e,
            }
        }
    }

    /// Read every record, keyed by hash. An empty store is an empty map,
    /// not an error.
    pub fn read_all(&self) -> Result<BTreeMap<String, WorkflowRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT hash, run_directory, stage, attributes, created_at, updated_at
                 FROM workflows ORDER BY hash",
            )
            .map_err(|e| self.store_err(e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(WorkflowRow {
                    hash: row.get(0)?,
                    run_directory: row.get(1)?,
                    stage: row.get(2)?,
                    attributes: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })
            .map_err(|e| self.store_err(e))?;

        let mut records = BTreeMap::new();
        for row in rows {
            let record = row.map_err(|e| self.store_err(e))?.into_record()?;
            records.insert(record.hash.clone(), record);
        }
        Ok(records)
    }

    /// Read one record by hash. Absent is `Ok(None)`.
    pub fn read(&self, hash: &str) -> Result<Option<WorkflowRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT hash, run_directory, stage, attributes, created_at, updated_at
                 FROM workflows WHERE hash = ?1",
            )
            .map_err(|e| self.store_err(e))?;
        let mut rows = stmt
            .query_map(params![hash], |row| {
                Ok(WorkflowRow {
                    hash: row.get(0)?,
                    run_directory: row.get(1)?,
                    stage: row.get(2)?,
                    attributes: row.get(3)?,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            })
            .map_err(|e| self.store_err(e))?;
        match rows.next() {
            Some(row) => Ok(Some(row.map_err(|e| self.store_err(e))?.into_record()?)),
            None => Ok(None),
        }
    }

    /// Merge the given fields into the record for `hash`, creating a minimal
    /// record if none exists. Unset fields keep their stored values;
    /// attribute entries are merged into the existing map.
    ///
    /// Retries once when another writer holds the lock past the busy
    /// timeout, then surfaces [`StoreError::Busy`].
    pub fn update(&self, hash: &str, update: &WorkflowUpdate) -> Result<(), StoreError> {
        match self.try_update(hash, update) {
            Err(e) if is_busy(&e) => {
                debug!(hash, "workflow store busy, retrying update once");
                self.try_update(hash, update).map_err(|e| self.store_err(e))
            }
            other => other.map_err(|e| self.store_err(e)),
        }
        .map(|_| ())
    }

    fn try_update(&self, hash: &str, update: &WorkflowUpdate) -> Result<usize, rusqlite::Error> {
        let run_directory = update
            .run_directory
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned());
        // Always a JSON object; merging an empty patch is a no-op.
        let attributes = Value::Object(update.attributes.clone()).to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO workflows (hash, run_directory, stage, attributes, created_at, updated_at)
             VALUES (?1, COALESCE(?2, ''), COALESCE(?3, ''), json_patch('{}', ?4), ?5, ?5)
             ON CONFLICT(hash) DO UPDATE SET
                run_directory = COALESCE(?2, workflows.run_directory),
                stage         = COALESCE(?3, workflows.stage),
                attributes    = json_patch(workflows.attributes, ?4),
                updated_at    = ?5",
            params![hash, run_directory, update.stage, attributes, now],
        )
    }

    /// Number of records in the store.
    pub fn count(&self) -> Result<usize, StoreError> {
        let n: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM workflows", [], |row| row.get(0))
            .map_err(|e| self.store_err(e))?;
        Ok(n as usize)
    }
}

fn is_busy(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(inner, _) if inner.code == ErrorCode::DatabaseBusy
    )
}

/// Intermediate row struct, converted into a [`WorkflowRecord`] once the
/// attributes column has been parsed.
struct WorkflowRow {
    hash: String,
    run_directory: String,
    stage: String,
    attributes: String,
    created_at: String,
    updated_at: String,
}

impl WorkflowRow {
    fn into_record(self) -> Result<WorkflowRecord, StoreError> {
        let attributes: Map<String, Value> =
            serde_json::from_str(&self.attributes).map_err(|e| StoreError::Corrupt {
                hash: self.hash.clone(),
                message: format!("attributes column is not a JSON object: {}", e),
            })?;
        Ok(WorkflowRecord {
            hash: self.hash,
            run_directory: PathBuf::from(self.run_directory),
            stage: self.stage,
            attributes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
