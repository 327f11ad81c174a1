// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent availability table, plus per-turn checkpoint decision state.

use crate::db::{parse_ts, to_ts, Storage};
use crate::StorageError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use tc_core::{AgentAvailability, AgentKind, AvailabilityStatus, SessionId};

impl Storage {
    /// Upsert the availability tuple for an agent.
    pub fn set_availability(&self, availability: &AgentAvailability) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO agent_availability (agent, status, reason, unavailable_until) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(agent) DO UPDATE SET status = ?2, reason = ?3, unavailable_until = ?4",
            params![
                availability.agent.as_str(),
                availability.status.as_str(),
                availability.reason,
                availability.unavailable_until.map(to_ts),
            ],
        )?;
        Ok(())
    }

    /// Read the stored tuple for an agent. Absence means available.
    pub fn get_availability(
        &self,
        agent: AgentKind,
    ) -> Result<Option<AgentAvailability>, StorageError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT status, reason, unavailable_until FROM agent_availability \
                 WHERE agent = ?1",
                [agent.as_str()],
                |row| {
                    let status_raw: String = row.get(0)?;
                    let reason: Option<String> = row.get(1)?;
                    let until_raw: Option<String> = row.get(2)?;
                    Ok((status_raw, reason, until_raw))
                },
            )
            .optional()?;

        let Some((status_raw, reason, until_raw)) = row else {
            return Ok(None);
        };
        Ok(Some(AgentAvailability {
            agent,
            status: AvailabilityStatus::parse(&status_raw).ok_or_else(|| {
                StorageError::CorruptRow {
                    table: "agent_availability",
                    id: agent.as_str().to_string(),
                    message: format!("unknown status '{}'", status_raw),
                }
            })?,
            reason,
            unavailable_until: match until_raw {
                Some(raw) => Some(parse_ts("agent_availability", agent.as_str(), &raw)?),
                None => None,
            },
        }))
    }

    /// Record the last checkpoint decision for a session's turn.
    pub fn set_checkpoint_decision(
        &self,
        session_id: &SessionId,
        turn_id: &str,
        blocked: bool,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO checkpoint_state (session_id, turn_id, blocked, decided_at) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(session_id) DO UPDATE SET turn_id = ?2, blocked = ?3, decided_at = ?4",
            params![session_id.as_str(), turn_id, blocked as i64, to_ts(now)],
        )?;
        Ok(())
    }

    /// Last checkpoint decision `(turn_id, blocked)` for a session.
    pub fn get_checkpoint_decision(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<(String, bool)>, StorageError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT turn_id, blocked FROM checkpoint_state WHERE session_id = ?1",
                [session_id.as_str()],
                |row| {
                    let turn_id: String = row.get(0)?;
                    let blocked: i64 = row.get(1)?;
                    Ok((turn_id, blocked != 0))
                },
            )
            .optional()?;
        Ok(row)
    }
}

#[cfg(test)]
#[path = "availability_tests.rs"]
mod tests;
