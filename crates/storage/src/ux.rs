// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-platform UX state and delivered-message digests.
//!
//! UX state is the ephemera a platform adapter needs to re-render after a
//! daemon restart: editable message ids, pending deletions, channel and
//! thread ids. Rows cascade-delete with their session.

use crate::db::{parse_ts, to_ts, Storage};
use crate::StorageError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tc_core::SessionId;

/// A persisted delivery digest (double-delivery suppression across restarts).
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryRecord {
    pub adapter_id: String,
    pub digest: String,
    pub delivered_at: DateTime<Utc>,
}

impl Storage {
    /// Replace the UX blob for (platform, session).
    pub fn put_ux_state(
        &self,
        platform: &str,
        session_id: &SessionId,
        value: &serde_json::Value,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO ux_state (platform, session_id, value_json) VALUES (?1, ?2, ?3) \
             ON CONFLICT(platform, session_id) DO UPDATE SET value_json = ?3",
            params![platform, session_id.as_str(), serde_json::to_string(value)?],
        )?;
        Ok(())
    }

    pub fn get_ux_state(
        &self,
        platform: &str,
        session_id: &SessionId,
    ) -> Result<Option<serde_json::Value>, StorageError> {
        let conn = self.conn.lock();
        let raw: Option<String> = conn
            .query_row(
                "SELECT value_json FROM ux_state WHERE platform = ?1 AND session_id = ?2",
                params![platform, session_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Remove all UX state for a session (called on close).
    pub fn delete_ux_state(&self, session_id: &SessionId) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM ux_state WHERE session_id = ?1",
            [session_id.as_str()],
        )?;
        Ok(removed)
    }

    /// Record a delivered-message digest. Re-recording is a no-op.
    pub fn record_delivery(
        &self,
        adapter_id: &str,
        digest: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR IGNORE INTO delivered_digests (adapter_id, digest, delivered_at) \
             VALUES (?1, ?2, ?3)",
            params![adapter_id, digest, to_ts(now)],
        )?;
        Ok(())
    }

    pub fn was_delivered(&self, adapter_id: &str, digest: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM delivered_digests WHERE adapter_id = ?1 AND digest = ?2",
                params![adapter_id, digest],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Drop digests older than `cutoff` to bound table growth.
    pub fn prune_deliveries(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM delivered_digests WHERE delivered_at < ?1",
            [to_ts(cutoff)],
        )?;
        Ok(removed)
    }

    /// All recorded deliveries for an adapter (newest first), for tests and
    /// status queries.
    pub fn list_deliveries(&self, adapter_id: &str) -> Result<Vec<DeliveryRecord>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT adapter_id, digest, delivered_at FROM delivered_digests \
             WHERE adapter_id = ?1 ORDER BY delivered_at DESC",
        )?;
        let rows = stmt
            .query_map([adapter_id], |row| {
                let adapter_id: String = row.get(0)?;
                let digest: String = row.get(1)?;
                let at_raw: String = row.get(2)?;
                Ok((adapter_id, digest, at_raw))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|(adapter_id, digest, at_raw)| {
                Ok(DeliveryRecord {
                    delivered_at: parse_ts("delivered_digests", &digest, &at_raw)?,
                    adapter_id,
                    digest,
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "ux_tests.rs"]
mod tests;
