// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Database handle, pragmas, and forward-only migrations.
//!
//! Migrations run once per startup under the daemon's exclusive lock and
//! are tracked via `PRAGMA user_version`. Failure to open or migrate is
//! fatal at startup.

use crate::StorageError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

/// Ordered, forward-only schema migrations. Index i upgrades user_version
/// from i to i+1.
const MIGRATIONS: &[&str] = &[
    // v1: initial schema
    r#"
    CREATE TABLE sessions (
        id TEXT PRIMARY KEY,
        mux_name TEXT NOT NULL UNIQUE,
        cwd TEXT NOT NULL,
        agent TEXT NOT NULL,
        mode TEXT NOT NULL,
        title TEXT,
        status TEXT NOT NULL,
        origin TEXT NOT NULL,
        adapter_meta TEXT,
        created_at TEXT NOT NULL,
        last_activity_at TEXT NOT NULL,
        closed_at TEXT,
        computer TEXT NOT NULL
    );

    CREATE TABLE command_queue (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        source TEXT NOT NULL,
        dedup_key TEXT NOT NULL,
        payload_json TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'pending',
        attempts INTEGER NOT NULL DEFAULT 0,
        last_error TEXT,
        accepted_at TEXT NOT NULL,
        in_flight_since TEXT,
        UNIQUE(source, dedup_key)
    );
    CREATE INDEX idx_queue_claim ON command_queue(source, state, accepted_at);

    CREATE TABLE hook_outbox (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL,
        payload_json TEXT NOT NULL,
        state TEXT NOT NULL DEFAULT 'pending',
        lock_token TEXT,
        lock_expires_at TEXT,
        accepted_at TEXT NOT NULL
    );
    CREATE INDEX idx_outbox_claim ON hook_outbox(state, accepted_at);

    CREATE TABLE ux_state (
        platform TEXT NOT NULL,
        session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
        value_json TEXT NOT NULL,
        PRIMARY KEY (platform, session_id)
    );

    CREATE TABLE delivered_digests (
        adapter_id TEXT NOT NULL,
        digest TEXT NOT NULL,
        delivered_at TEXT NOT NULL,
        PRIMARY KEY (adapter_id, digest)
    );

    CREATE TABLE agent_availability (
        agent TEXT PRIMARY KEY,
        status TEXT NOT NULL,
        reason TEXT,
        unavailable_until TEXT
    );

    CREATE TABLE snapshot_cache (
        entity_kind TEXT NOT NULL,
        entity_id TEXT NOT NULL,
        snapshot_json TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        PRIMARY KEY (entity_kind, entity_id)
    );
    "#,
    // v2: per-turn checkpoint decisions (escape hatch survives restarts)
    r#"
    CREATE TABLE checkpoint_state (
        session_id TEXT PRIMARY KEY,
        turn_id TEXT NOT NULL,
        blocked INTEGER NOT NULL,
        decided_at TEXT NOT NULL
    );
    "#,
];

/// Shared handle to the daemon database.
///
/// Clones share one connection; writes serialize on the inner lock. All
/// statements are parameterized and multi-step transitions run inside
/// explicit transactions.
#[derive(Clone)]
pub struct Storage {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl Storage {
    /// Open (creating if needed) and migrate the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Migration {
                version: 0,
                message: format!("cannot create state dir: {}", e),
            })?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "busy_timeout", 5000)?;
        let storage = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        storage.migrate()?;
        Ok(storage)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let current: u32 =
            conn.query_row("SELECT user_version FROM pragma_user_version", [], |row| {
                row.get(0)
            })?;

        for (i, sql) in MIGRATIONS.iter().enumerate() {
            let target = (i + 1) as u32;
            if current >= target {
                continue;
            }
            let tx = conn.transaction()?;
            tx.execute_batch(sql)
                .map_err(|e| StorageError::Migration {
                    version: target,
                    message: e.to_string(),
                })?;
            tx.pragma_update(None, "user_version", target)?;
            tx.commit()?;
            tracing::info!(version = target, "applied schema migration");
        }
        Ok(())
    }

    /// Execute arbitrary SQL. Test-support only: used to break tables so
    /// fail-open/fail-closed paths can be exercised.
    #[cfg(any(test, feature = "test-support"))]
    pub fn execute_raw(&self, sql: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute_batch(sql)?;
        Ok(())
    }

    /// Current schema version (for status reporting).
    pub fn schema_version(&self) -> Result<u32, StorageError> {
        let conn = self.conn.lock();
        Ok(
            conn.query_row("SELECT user_version FROM pragma_user_version", [], |row| {
                row.get(0)
            })?,
        )
    }
}

/// RFC 3339 encoding used for every timestamp column.
pub(crate) fn to_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn parse_ts(
    table: &'static str,
    id: &str,
    raw: &str,
) -> Result<DateTime<Utc>, StorageError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StorageError::CorruptRow {
            table,
            id: id.to_string(),
            message: format!("bad timestamp '{}': {}", raw, e),
        })
}

#[cfg(test)]
#[path = "db_tests.rs"]
mod tests;
