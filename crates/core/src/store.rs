// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable store for queued operations.
//!
//! The store outlives any single execution context: the foreground process,
//! the `tilld` daemon and the CLI all open the same SQLite file. Every write
//! is a single statement or a single transaction, so no reader ever sees a
//! partially applied change.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::{Error, Result};
use crate::operation::{OpState, PendingOperation};
use crate::status::{QueueStats, SyncMetadata, OPERATIONS_TABLE};

/// SQL schema for the operation queue.
pub const SCHEMA: &str = r#"
-- Queued mutations. `seq` breaks ties between identical enqueue timestamps.
CREATE TABLE IF NOT EXISTS pending_operations (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    op_type TEXT NOT NULL,
    entity_kind TEXT NOT NULL,
    payload TEXT NOT NULL,
    enqueued_at INTEGER NOT NULL,   -- microseconds since Unix epoch
    retry_count INTEGER NOT NULL DEFAULT 0 CHECK (retry_count >= 0),
    state TEXT NOT NULL DEFAULT 'pending'
);

-- Sync progress and the completed-operations counter
CREATE TABLE IF NOT EXISTS sync_metadata (
    table_name TEXT PRIMARY KEY,
    last_sync_at INTEGER,
    sync_version INTEGER NOT NULL DEFAULT 0,
    completed_operations INTEGER NOT NULL DEFAULT 0
);

-- Per-entity drain leases. A context applies an entity's operations only
-- while it holds the lease, so two contexts never interleave them.
CREATE TABLE IF NOT EXISTS entity_leases (
    entity_key TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    expires_at INTEGER NOT NULL     -- microseconds since Unix epoch
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_ops_enqueued ON pending_operations(enqueued_at, seq);
CREATE INDEX IF NOT EXISTS idx_ops_retry ON pending_operations(retry_count);
CREATE INDEX IF NOT EXISTS idx_ops_state ON pending_operations(state);
"#;

const SELECT_COLUMNS: &str =
    "SELECT id, op_type, entity_kind, payload, enqueued_at, retry_count, state
     FROM pending_operations";

/// Keyed record store for queued operations.
///
/// Implementations must make every method atomic with respect to other
/// handles on the same underlying storage.
pub trait OperationStore: Send + Sync {
    /// Insert or update an operation by id.
    ///
    /// An existing record keeps its payload and enqueue time; only the retry
    /// count (which never decreases) and state are updated.
    fn put(&self, op: &PendingOperation) -> Result<()>;

    /// Look up one operation.
    fn get(&self, id: &str) -> Result<Option<PendingOperation>>;

    /// All operations ordered by enqueue time, oldest first.
    fn get_all(&self) -> Result<Vec<PendingOperation>>;

    /// Delete an operation. Returns whether a record was removed; removing an
    /// unknown id is not an error.
    fn remove(&self, id: &str) -> Result<bool>;

    /// Delete every operation.
    fn clear(&self) -> Result<()>;

    /// Delete an acknowledged operation and count it as completed, atomically.
    /// Returns false (and counts nothing) if the id was already gone.
    fn complete(&self, id: &str) -> Result<bool>;

    /// Return a Failed operation to the Pending state with a fresh retry
    /// budget. Returns false if the id is unknown.
    fn reset(&self, id: &str) -> Result<bool>;

    /// Queue counters, classifying records against the retry cap.
    fn stats(&self, max_retries: u32) -> Result<QueueStats>;

    /// Current sync progress for the operations table.
    fn sync_metadata(&self) -> Result<SyncMetadata>;

    /// Record a successful sync at `at` and bump the sync version.
    fn record_sync(&self, at: DateTime<Utc>) -> Result<SyncMetadata>;

    /// Take or renew the lease on `entity_key` for `owner` until `until`.
    ///
    /// Succeeds when the key is free, already held by `owner`, or held by a
    /// lease that expired at or before `now`. Returns false otherwise.
    fn claim_entity(
        &self,
        entity_key: &str,
        owner: &str,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<bool>;

    /// Drop every lease held by `owner`.
    fn release_entities(&self, owner: &str) -> Result<()>;
}

/// Build a conversion error for a malformed column value.
fn corrupted(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        Box::new(Error::CorruptedData(message)),
    )
}

/// Parse a microsecond timestamp from the database.
fn parse_micros(
    value: i64,
    column: usize,
    name: &str,
) -> std::result::Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::from_timestamp_micros(value)
        .ok_or_else(|| corrupted(column, format!("invalid timestamp '{value}' in column '{name}'")))
}

fn row_to_operation(row: &Row<'_>) -> std::result::Result<PendingOperation, rusqlite::Error> {
    let op_type: String = row.get(1)?;
    let payload: String = row.get(3)?;
    let enqueued_at: i64 = row.get(4)?;
    let retry_count: i64 = row.get(5)?;
    let state: String = row.get(6)?;

    Ok(PendingOperation {
        id: row.get(0)?,
        op_type: op_type
            .parse()
            .map_err(|_| corrupted(1, format!("invalid value '{op_type}' in column 'op_type'")))?,
        entity_kind: row.get(2)?,
        payload: serde_json::from_str(&payload)
            .map_err(|e| corrupted(3, format!("invalid payload json: {e}")))?,
        enqueued_at: parse_micros(enqueued_at, 4, "enqueued_at")?,
        retry_count: u32::try_from(retry_count)
            .map_err(|_| corrupted(5, format!("invalid retry count '{retry_count}'")))?,
        state: state
            .parse()
            .map_err(|_| corrupted(6, format!("invalid value '{state}' in column 'state'")))?,
    })
}

/// Run schema creation and seed the metadata row.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT OR IGNORE INTO sync_metadata (table_name) VALUES (?1)",
        params![OPERATIONS_TABLE],
    )?;
    Ok(())
}

/// SQLite-backed [`OperationStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open the store at the given path, creating and migrating if needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        // WAL lets the daemon and the foreground process share the file
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;

        run_migrations(&conn)?;
        tracing::debug!("opened operation store at {}", path.display());
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::StoreUnavailable("connection lock poisoned".to_string()))
    }
}

impl OperationStore for SqliteStore {
    fn put(&self, op: &PendingOperation) -> Result<()> {
        let payload = serde_json::to_string(&op.payload)?;
        self.conn()?.execute(
            "INSERT INTO pending_operations
                 (id, op_type, entity_kind, payload, enqueued_at, retry_count, state)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(id) DO UPDATE SET
                 retry_count = MAX(retry_count, excluded.retry_count),
                 state = excluded.state",
            params![
                op.id,
                op.op_type.as_str(),
                op.entity_kind,
                payload,
                op.enqueued_at.timestamp_micros(),
                i64::from(op.retry_count),
                op.state.as_str(),
            ],
        )?;
        Ok(())
    }

    fn get(&self, id: &str) -> Result<Option<PendingOperation>> {
        let conn = self.conn()?;
        let op = conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE id = ?1"),
                params![id],
                row_to_operation,
            )
            .optional()?;
        Ok(op)
    }

    fn get_all(&self) -> Result<Vec<PendingOperation>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY enqueued_at, seq"))?;
        let ops = stmt
            .query_map([], row_to_operation)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ops)
    }

    fn remove(&self, id: &str) -> Result<bool> {
        let affected = self
            .conn()?
            .execute("DELETE FROM pending_operations WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    fn clear(&self) -> Result<()> {
        self.conn()?.execute("DELETE FROM pending_operations", [])?;
        Ok(())
    }

    fn complete(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM pending_operations WHERE id = ?1", params![id])?;
        if removed > 0 {
            tx.execute(
                "UPDATE sync_metadata SET completed_operations = completed_operations + 1
                 WHERE table_name = ?1",
                params![OPERATIONS_TABLE],
            )?;
        }
        tx.commit()?;
        Ok(removed > 0)
    }

    fn reset(&self, id: &str) -> Result<bool> {
        let affected = self.conn()?.execute(
            "UPDATE pending_operations SET state = ?1, retry_count = 0 WHERE id = ?2",
            params![OpState::Pending.as_str(), id],
        )?;
        Ok(affected > 0)
    }

    fn stats(&self, max_retries: u32) -> Result<QueueStats> {
        let conn = self.conn()?;
        let (pending, failed): (i64, i64) = conn.query_row(
            "SELECT
                 COALESCE(SUM(CASE WHEN state = ?1 AND retry_count < ?3 THEN 1 ELSE 0 END), 0),
                 COALESCE(SUM(CASE WHEN state = ?2 OR retry_count >= ?3 THEN 1 ELSE 0 END), 0)
             FROM pending_operations",
            params![
                OpState::Pending.as_str(),
                OpState::Failed.as_str(),
                i64::from(max_retries)
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let completed: i64 = conn.query_row(
            "SELECT completed_operations FROM sync_metadata WHERE table_name = ?1",
            params![OPERATIONS_TABLE],
            |row| row.get(0),
        )?;

        let count = |value: i64, column: &str| {
            u64::try_from(value)
                .map_err(|_| Error::CorruptedData(format!("negative count for {column}")))
        };
        Ok(QueueStats::new(
            count(pending, "pending")?,
            count(failed, "failed")?,
            count(completed, "completed")?,
        ))
    }

    fn sync_metadata(&self) -> Result<SyncMetadata> {
        let conn = self.conn()?;
        read_metadata(&conn)
    }

    fn record_sync(&self, at: DateTime<Utc>) -> Result<SyncMetadata> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE sync_metadata SET last_sync_at = ?1, sync_version = sync_version + 1
             WHERE table_name = ?2",
            params![at.timestamp_micros(), OPERATIONS_TABLE],
        )?;
        read_metadata(&conn)
    }

    fn claim_entity(
        &self,
        entity_key: &str,
        owner: &str,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<bool> {
        let affected = self.conn()?.execute(
            "INSERT INTO entity_leases (entity_key, owner, expires_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(entity_key) DO UPDATE SET
                 owner = excluded.owner,
                 expires_at = excluded.expires_at
             WHERE entity_leases.owner = excluded.owner OR entity_leases.expires_at <= ?4",
            params![
                entity_key,
                owner,
                until.timestamp_micros(),
                now.timestamp_micros()
            ],
        )?;
        Ok(affected > 0)
    }

    fn release_entities(&self, owner: &str) -> Result<()> {
        self.conn()?
            .execute("DELETE FROM entity_leases WHERE owner = ?1", params![owner])?;
        Ok(())
    }
}

fn read_metadata(conn: &Connection) -> Result<SyncMetadata> {
    let (last_sync_at, sync_version): (Option<i64>, i64) = conn.query_row(
        "SELECT last_sync_at, sync_version FROM sync_metadata WHERE table_name = ?1",
        params![OPERATIONS_TABLE],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    let last_sync_at = match last_sync_at {
        Some(us) => Some(parse_micros(us, 0, "last_sync_at")?),
        None => None,
    };
    Ok(SyncMetadata {
        table_name: OPERATIONS_TABLE.to_string(),
        last_sync_at,
        sync_version: u64::try_from(sync_version)
            .map_err(|_| Error::CorruptedData("negative sync version".to_string()))?,
    })
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
