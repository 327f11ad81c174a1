// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable hook outbox.
//!
//! Rows transition monotonically `pending → processing → delivered`.
//! Claims take a lock token with an expiry; the watchdog returns rows whose
//! lock expired back to `pending`, so a crashed processor cannot strand a
//! hook (fail-open recovery, at most one duplicate `processing` attempt).

use crate::db::{parse_ts, to_ts, Storage};
use crate::StorageError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tc_core::HookEvent;

/// Outbox-row delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboxState {
    Pending,
    Processing,
    Delivered,
}

impl OutboxState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxState::Pending => "pending",
            OutboxState::Processing => "processing",
            OutboxState::Delivered => "delivered",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OutboxState::Pending),
            "processing" => Some(OutboxState::Processing),
            "delivered" => Some(OutboxState::Delivered),
            _ => None,
        }
    }
}

/// A hook event with its outbox bookkeeping.
#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub id: i64,
    pub hook: HookEvent,
    pub state: OutboxState,
    pub lock_token: Option<String>,
    pub accepted_at: DateTime<Utc>,
}

fn entry_from_row(row: &Row<'_>) -> Result<OutboxEntry, StorageError> {
    let id: i64 = row.get(0)?;
    let payload: String = row.get(1)?;
    let state_raw: String = row.get(2)?;
    let accepted_raw: String = row.get(4)?;
    let id_str = id.to_string();

    Ok(OutboxEntry {
        id,
        hook: serde_json::from_str(&payload)?,
        state: OutboxState::parse(&state_raw).ok_or_else(|| StorageError::CorruptRow {
            table: "hook_outbox",
            id: id_str.clone(),
            message: format!("unknown state '{}'", state_raw),
        })?,
        lock_token: row.get(3)?,
        accepted_at: parse_ts("hook_outbox", &id_str, &accepted_raw)?,
    })
}

const ENTRY_COLUMNS: &str = "id, payload_json, state, lock_token, accepted_at";

impl Storage {
    /// Insert a validated hook event as a pending outbox row.
    pub fn insert_hook(&self, hook: &HookEvent) -> Result<i64, StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO hook_outbox (kind, payload_json, state, accepted_at) \
             VALUES (?1, ?2, 'pending', ?3)",
            params![
                hook.kind.as_str(),
                serde_json::to_string(hook)?,
                to_ts(hook.at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Claim the oldest pending row: atomic `pending → processing` with the
    /// given lock token and expiry.
    pub fn claim_next_hook(
        &self,
        lock_token: &str,
        lock_expires_at: DateTime<Utc>,
    ) -> Result<Option<OutboxEntry>, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let id: Option<i64> = tx
            .query_row(
                "SELECT id FROM hook_outbox WHERE state = 'pending' \
                 ORDER BY accepted_at ASC, id ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = id else {
            tx.commit()?;
            return Ok(None);
        };

        let changed = tx.execute(
            "UPDATE hook_outbox SET state = 'processing', lock_token = ?2, lock_expires_at = ?3 \
             WHERE id = ?1 AND state = 'pending'",
            params![id, lock_token, to_ts(lock_expires_at)],
        )?;
        if changed == 0 {
            tx.commit()?;
            return Ok(None);
        }

        let entry = tx.query_row(
            &format!("SELECT {} FROM hook_outbox WHERE id = ?1", ENTRY_COLUMNS),
            [id],
            |row| Ok(entry_from_row(row)),
        )??;
        tx.commit()?;
        Ok(Some(entry))
    }

    /// Claim a specific pending row by id (used by the receiver to process
    /// a hook synchronously right after insert). Same atomic transition as
    /// `claim_next_hook`.
    pub fn claim_hook(
        &self,
        id: i64,
        lock_token: &str,
        lock_expires_at: DateTime<Utc>,
    ) -> Result<Option<OutboxEntry>, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE hook_outbox SET state = 'processing', lock_token = ?2, lock_expires_at = ?3 \
             WHERE id = ?1 AND state = 'pending'",
            params![id, lock_token, to_ts(lock_expires_at)],
        )?;
        if changed == 0 {
            tx.commit()?;
            return Ok(None);
        }
        let entry = tx.query_row(
            &format!("SELECT {} FROM hook_outbox WHERE id = ?1", ENTRY_COLUMNS),
            [id],
            |row| Ok(entry_from_row(row)),
        )??;
        tx.commit()?;
        Ok(Some(entry))
    }

    /// Mark a processing row delivered. The lock token must still match;
    /// a mismatch means the watchdog reclaimed the row and another
    /// processor owns it now.
    pub fn mark_hook_delivered(&self, id: i64, lock_token: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE hook_outbox \
             SET state = 'delivered', lock_token = NULL, lock_expires_at = NULL \
             WHERE id = ?1 AND state = 'processing' AND lock_token = ?2",
            params![id, lock_token],
        )?;
        Ok(changed > 0)
    }

    /// Watchdog sweep: return expired `processing` rows to `pending`.
    pub fn requeue_expired_hooks(&self, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE hook_outbox \
             SET state = 'pending', lock_token = NULL, lock_expires_at = NULL \
             WHERE state = 'processing' AND lock_expires_at < ?1",
            [to_ts(now)],
        )?;
        if changed > 0 {
            tracing::warn!(count = changed, "requeued hooks with expired locks");
        }
        Ok(changed)
    }

    pub fn get_outbox_entry(&self, id: i64) -> Result<Option<OutboxEntry>, StorageError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM hook_outbox WHERE id = ?1", ENTRY_COLUMNS),
                [id],
                |row| Ok(entry_from_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    pub fn pending_hook_count(&self) -> Result<u64, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM hook_outbox WHERE state = 'pending'",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete delivered rows older than `cutoff`. Returns rows removed.
    pub fn prune_outbox(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM hook_outbox WHERE state = 'delivered' AND accepted_at < ?1",
            [to_ts(cutoff)],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
