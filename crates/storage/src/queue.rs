// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable command queue.
//!
//! Every accepted command becomes a `pending` row; a worker claims the
//! oldest pending row for its source class by atomically transitioning it
//! to `in_flight`, so each command reaches at most one worker at a time.
//! Terminal states are `delivered` and `failed`.

use crate::db::{parse_ts, to_ts, Storage};
use crate::StorageError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tc_core::{CommandEnvelope, CommandSource};

/// Queue-entry delivery state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    Pending,
    InFlight,
    Delivered,
    Failed,
}

impl QueueState {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueState::Pending => "pending",
            QueueState::InFlight => "in_flight",
            QueueState::Delivered => "delivered",
            QueueState::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(QueueState::Pending),
            "in_flight" => Some(QueueState::InFlight),
            "delivered" => Some(QueueState::Delivered),
            "failed" => Some(QueueState::Failed),
            _ => None,
        }
    }
}

/// A claimed or inspected queue row.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub id: i64,
    pub envelope: CommandEnvelope,
    pub state: QueueState,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub accepted_at: DateTime<Utc>,
    pub in_flight_since: Option<DateTime<Utc>>,
}

/// Result of an enqueue attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new row was created.
    Accepted(i64),
    /// The (source, dedup_key) pair already exists; prior entry id returned.
    Duplicate(i64),
}

impl EnqueueOutcome {
    pub fn entry_id(&self) -> i64 {
        match self {
            EnqueueOutcome::Accepted(id) | EnqueueOutcome::Duplicate(id) => *id,
        }
    }
}

fn entry_from_row(row: &Row<'_>) -> Result<QueueEntry, StorageError> {
    let id: i64 = row.get(0)?;
    let payload: String = row.get(1)?;
    let state_raw: String = row.get(2)?;
    let accepted_raw: String = row.get(5)?;
    let in_flight_raw: Option<String> = row.get(6)?;
    let id_str = id.to_string();

    Ok(QueueEntry {
        id,
        envelope: serde_json::from_str(&payload)?,
        state: QueueState::parse(&state_raw).ok_or_else(|| StorageError::CorruptRow {
            table: "command_queue",
            id: id_str.clone(),
            message: format!("unknown state '{}'", state_raw),
        })?,
        attempts: row.get(3)?,
        last_error: row.get(4)?,
        accepted_at: parse_ts("command_queue", &id_str, &accepted_raw)?,
        in_flight_since: match in_flight_raw {
            Some(raw) => Some(parse_ts("command_queue", &id_str, &raw)?),
            None => None,
        },
    })
}

const ENTRY_COLUMNS: &str =
    "id, payload_json, state, attempts, last_error, accepted_at, in_flight_since";

impl Storage {
    /// Append a command to the queue.
    ///
    /// Deduplicated inserts (same source + dedup key) return the previous
    /// entry id without writing.
    pub fn enqueue_command(
        &self,
        envelope: &CommandEnvelope,
    ) -> Result<EnqueueOutcome, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM command_queue WHERE source = ?1 AND dedup_key = ?2",
                params![envelope.source.as_str(), envelope.dedup_key],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            tx.commit()?;
            return Ok(EnqueueOutcome::Duplicate(id));
        }

        tx.execute(
            "INSERT INTO command_queue (kind, source, dedup_key, payload_json, state, accepted_at) \
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5)",
            params![
                envelope.command.kind().as_str(),
                envelope.source.as_str(),
                envelope.dedup_key,
                serde_json::to_string(envelope)?,
                to_ts(envelope.accepted_at),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(EnqueueOutcome::Accepted(id))
    }

    /// Atomically claim the oldest pending entry for a source, transitioning
    /// it `pending → in_flight`. Returns `None` when the class is drained.
    pub fn claim_next_command(
        &self,
        source: CommandSource,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueEntry>, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let id: Option<i64> = tx
            .query_row(
                "SELECT id FROM command_queue \
                 WHERE source = ?1 AND state = 'pending' \
                 ORDER BY accepted_at ASC, id ASC LIMIT 1",
                [source.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = id else {
            tx.commit()?;
            return Ok(None);
        };

        let changed = tx.execute(
            "UPDATE command_queue SET state = 'in_flight', in_flight_since = ?2 \
             WHERE id = ?1 AND state = 'pending'",
            params![id, to_ts(now)],
        )?;
        if changed == 0 {
            // Lost a race with a concurrent claimer; caller just retries.
            tx.commit()?;
            return Ok(None);
        }

        let entry = tx.query_row(
            &format!("SELECT {} FROM command_queue WHERE id = ?1", ENTRY_COLUMNS),
            [id],
            |row| Ok(entry_from_row(row)),
        )??;
        tx.commit()?;
        Ok(Some(entry))
    }

    pub fn mark_command_delivered(&self, id: i64) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE command_queue SET state = 'delivered', last_error = NULL \
             WHERE id = ?1 AND state = 'in_flight'",
            [id],
        )?;
        Ok(())
    }

    /// Terminal failure: the entry will not be retried.
    pub fn mark_command_failed(&self, id: i64, error: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE command_queue SET state = 'failed', last_error = ?2 WHERE id = ?1",
            params![id, error],
        )?;
        Ok(())
    }

    /// Return an in-flight entry to `pending` with an incremented attempt
    /// count, recording the error that caused the retry.
    pub fn retry_command(&self, id: i64, error: &str) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE command_queue \
             SET state = 'pending', attempts = attempts + 1, last_error = ?2, \
                 in_flight_since = NULL \
             WHERE id = ?1 AND state = 'in_flight'",
            params![id, error],
        )?;
        Ok(())
    }

    /// Crash recovery: any row still `in_flight` at startup belonged to a
    /// worker that no longer exists. Returns the number re-queued.
    pub fn recover_in_flight_commands(&self) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE command_queue \
             SET state = 'pending', attempts = attempts + 1, in_flight_since = NULL \
             WHERE state = 'in_flight'",
            [],
        )?;
        Ok(changed)
    }

    pub fn get_queue_entry(&self, id: i64) -> Result<Option<QueueEntry>, StorageError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM command_queue WHERE id = ?1", ENTRY_COLUMNS),
                [id],
                |row| Ok(entry_from_row(row)),
            )
            .optional()?;
        row.transpose()
    }

    pub fn pending_command_count(&self, source: CommandSource) -> Result<u64, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM command_queue WHERE source = ?1 AND state = 'pending'",
            [source.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Delete terminal entries older than `cutoff`. Returns rows removed.
    pub fn prune_queue(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute(
            "DELETE FROM command_queue \
             WHERE state IN ('delivered', 'failed') AND accepted_at < ?1",
            [to_ts(cutoff)],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
