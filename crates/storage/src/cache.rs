// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot cache table.
//!
//! Strictly derived state: truncating and rebuilding from the primary
//! tables (or replaying events) must reproduce the same observable rows.
//! Writes happen only through cache handlers; reads never mutate.

use crate::db::{to_ts, Storage};
use crate::StorageError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};

impl Storage {
    /// Replace the snapshot for (entity_kind, entity_id).
    pub fn put_snapshot(
        &self,
        entity_kind: &str,
        entity_id: &str,
        snapshot: &serde_json::Value,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO snapshot_cache (entity_kind, entity_id, snapshot_json, updated_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(entity_kind, entity_id) DO UPDATE SET \
                 snapshot_json = ?3, updated_at = ?4",
            params![
                entity_kind,
                entity_id,
                serde_json::to_string(snapshot)?,
                to_ts(now),
            ],
        )?;
        Ok(())
    }

    pub fn get_snapshot(
        &self,
        entity_kind: &str,
        entity_id: &str,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT snapshot_json FROM snapshot_cache \
                 WHERE entity_kind = ?1 AND entity_id = ?2",
                params![entity_kind, entity_id],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// All snapshots of a kind, keyed by entity id.
    pub fn list_snapshots(
        &self,
        entity_kind: &str,
    ) -> Result<Vec<(String, serde_json::Value)>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT entity_id, snapshot_json FROM snapshot_cache \
             WHERE entity_kind = ?1 ORDER BY entity_id",
        )?;
        let rows = stmt
            .query_map([entity_kind], |row| {
                let id: String = row.get(0)?;
                let raw: String = row.get(1)?;
                Ok((id, raw))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(id, raw)| Ok((id, serde_json::from_str(&raw)?)))
            .collect()
    }

    pub fn delete_snapshot(
        &self,
        entity_kind: &str,
        entity_id: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM snapshot_cache WHERE entity_kind = ?1 AND entity_id = ?2",
            params![entity_kind, entity_id],
        )?;
        Ok(())
    }

    /// Drop every cached snapshot (rebuild follows on next warm-up).
    pub fn truncate_snapshots(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM snapshot_cache", [])?;
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
