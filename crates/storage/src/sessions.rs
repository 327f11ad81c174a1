// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed CRUD over the `sessions` table.

use crate::db::{parse_ts, to_ts, Storage};
use crate::StorageError;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tc_core::{AgentKind, Session, SessionId, SessionStatus, ThinkingMode};

fn session_from_row(row: &Row<'_>) -> Result<Session, StorageError> {
    let id: String = row.get(0)?;
    let agent_raw: String = row.get(3)?;
    let mode_raw: String = row.get(4)?;
    let status_raw: String = row.get(6)?;
    let meta_raw: Option<String> = row.get(8)?;
    let created_raw: String = row.get(9)?;
    let activity_raw: String = row.get(10)?;
    let closed_raw: Option<String> = row.get(11)?;

    let corrupt = |message: String| StorageError::CorruptRow {
        table: "sessions",
        id: id.clone(),
        message,
    };

    Ok(Session {
        id: SessionId::new(id.clone()),
        mux_name: row.get(1)?,
        cwd: std::path::PathBuf::from(row.get::<_, String>(2)?),
        agent: AgentKind::parse(&agent_raw)
            .ok_or_else(|| corrupt(format!("unknown agent '{}'", agent_raw)))?,
        mode: ThinkingMode::parse(&mode_raw)
            .ok_or_else(|| corrupt(format!("unknown mode '{}'", mode_raw)))?,
        title: row.get(5)?,
        status: SessionStatus::parse(&status_raw)
            .ok_or_else(|| corrupt(format!("unknown status '{}'", status_raw)))?,
        origin: row.get(7)?,
        adapter_meta: match meta_raw {
            Some(raw) => serde_json::from_str(&raw)?,
            None => serde_json::Value::Null,
        },
        created_at: parse_ts("sessions", &id, &created_raw)?,
        last_activity_at: parse_ts("sessions", &id, &activity_raw)?,
        closed_at: match closed_raw {
            Some(raw) => Some(parse_ts("sessions", &id, &raw)?),
            None => None,
        },
        computer: row.get(12)?,
    })
}

const SESSION_COLUMNS: &str = "id, mux_name, cwd, agent, mode, title, status, origin, \
     adapter_meta, created_at, last_activity_at, closed_at, computer";

impl Storage {
    /// Insert a new session row. Fails on id or mux-name collision.
    pub fn insert_session(&self, session: &Session) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        let meta = if session.adapter_meta.is_null() {
            None
        } else {
            Some(serde_json::to_string(&session.adapter_meta)?)
        };
        conn.execute(
            "INSERT INTO sessions (id, mux_name, cwd, agent, mode, title, status, origin, \
             adapter_meta, created_at, last_activity_at, closed_at, computer) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                session.id.as_str(),
                session.mux_name,
                session.cwd.display().to_string(),
                session.agent.as_str(),
                session.mode.as_str(),
                session.title,
                session.status.as_str(),
                session.origin,
                meta,
                to_ts(session.created_at),
                to_ts(session.last_activity_at),
                session.closed_at.map(to_ts),
                session.computer,
            ],
        )?;
        Ok(())
    }

    pub fn get_session(&self, id: &SessionId) -> Result<Option<Session>, StorageError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!("SELECT {} FROM sessions WHERE id = ?1", SESSION_COLUMNS),
                [id.as_str()],
                |row| {
                    Ok(session_from_row(row))
                },
            )
            .optional()?;
        row.transpose()
    }

    /// Resolve a session by full id or unique short-id prefix.
    pub fn find_session_by_prefix(&self, prefix: &str) -> Result<Option<Session>, StorageError> {
        let conn = self.conn.lock();
        let pattern = format!("{}%", prefix);
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM sessions WHERE id LIKE ?1 LIMIT 2",
            SESSION_COLUMNS
        ))?;
        let mut rows: Vec<Session> = stmt
            .query_map([&pattern], |row| Ok(session_from_row(row)))?
            .collect::<Result<Result<Vec<_>, _>, _>>()??;
        if rows.len() == 1 {
            Ok(Some(rows.remove(0)))
        } else {
            Ok(None)
        }
    }

    /// List sessions; `include_closed` controls whether terminal rows appear.
    pub fn list_sessions(&self, include_closed: bool) -> Result<Vec<Session>, StorageError> {
        let conn = self.conn.lock();
        let sql = if include_closed {
            format!(
                "SELECT {} FROM sessions ORDER BY created_at DESC",
                SESSION_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM sessions WHERE status NOT IN ('closed', 'failed') \
                 ORDER BY created_at DESC",
                SESSION_COLUMNS
            )
        };
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| Ok(session_from_row(row)))?
            .collect::<Result<Result<Vec<_>, _>, _>>()??;
        Ok(rows)
    }

    pub fn update_session_status(
        &self,
        id: &SessionId,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET status = ?2, last_activity_at = ?3 WHERE id = ?1",
            params![id.as_str(), status.as_str(), to_ts(now)],
        )?;
        Ok(())
    }

    pub fn update_session_title(
        &self,
        id: &SessionId,
        title: &str,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET title = ?2 WHERE id = ?1",
            params![id.as_str(), title],
        )?;
        Ok(())
    }

    pub fn touch_session_activity(
        &self,
        id: &SessionId,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE sessions SET last_activity_at = ?2 WHERE id = ?1",
            params![id.as_str(), to_ts(now)],
        )?;
        Ok(())
    }

    /// Mark a session closed. Idempotent: already-terminal rows are left
    /// untouched and `false` is returned.
    pub fn close_session(
        &self,
        id: &SessionId,
        status: SessionStatus,
        now: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE sessions SET status = ?2, closed_at = ?3, last_activity_at = ?3 \
             WHERE id = ?1 AND status NOT IN ('closed', 'failed')",
            params![id.as_str(), status.as_str(), to_ts(now)],
        )?;
        Ok(changed > 0)
    }

    /// True if a session with this multiplexer name already exists.
    pub fn mux_name_taken(&self, mux_name: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sessions WHERE mux_name = ?1 \
             AND status NOT IN ('closed', 'failed')",
            [mux_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
