// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Domain events fanned out to adapters and the snapshot cache.
//!
//! Serializes with `{"type": "session:started", ...fields}` format.

use crate::session::{AgentKind, Session, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Delivery hint for output events; adapters decide whether to honor it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Edit a single running message in place (interactive surfaces).
    StreamingEdit,
    /// Standalone chunk tagged `(N/total)` with an explicit terminal marker
    /// (AI consumption, no truncation).
    ChunkedSequential,
}

/// Agent lifecycle activity observed via hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentActivityKind {
    UserPromptSubmit,
    ToolUse,
    ToolDone,
    AgentStop,
}

/// What happened to a todo item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TodoChange {
    Created,
    Updated,
    Removed,
}

/// Events that flow through the daemon event bus.
///
/// Per-session events are emitted in poller-observation order; ordering
/// across sessions is not guaranteed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    // -- session --
    #[serde(rename = "session:started")]
    SessionStarted { session: Session },

    #[serde(rename = "session:updated")]
    SessionUpdated { session: Session },

    #[serde(rename = "session:closed")]
    SessionClosed { session_id: SessionId },

    /// The multiplexer pane vanished without an explicit close.
    #[serde(rename = "session:died")]
    SessionDied { session_id: SessionId },

    /// Incremental pane output since the previous cursor.
    #[serde(rename = "session:output")]
    OutputChanged {
        session_id: SessionId,
        text: String,
        mode: OutputMode,
        /// Chunk counter for chunked-sequential mode (1-based).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        chunk: Option<u32>,
        /// Digest over the output tail, for duplicate suppression.
        digest: String,
        at: DateTime<Utc>,
    },

    /// Exit marker observed: the keyed command finished.
    #[serde(rename = "session:completed")]
    SessionCompleted {
        session_id: SessionId,
        /// Final output with the exit marker stripped.
        body: String,
        exit_code: Option<i32>,
    },

    /// Agent lifecycle hook routed through the outbox.
    #[serde(rename = "agent:activity")]
    AgentActivity {
        session_id: SessionId,
        agent: AgentKind,
        kind: AgentActivityKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        summary: Option<String>,
        at: DateTime<Utc>,
    },

    /// A peer computer refreshed its heartbeat.
    #[serde(rename = "computer:heartbeat")]
    ComputerHeartbeat {
        computer: String,
        at: DateTime<Utc>,
    },

    /// A session's todo list changed.
    #[serde(rename = "todo:changed")]
    TodoChanged {
        session_id: SessionId,
        change: TodoChange,
        todo: serde_json::Value,
    },
}

impl Event {
    /// Event name for log spans (e.g. "session:started").
    pub fn name(&self) -> &'static str {
        match self {
            Event::SessionStarted { .. } => "session:started",
            Event::SessionUpdated { .. } => "session:updated",
            Event::SessionClosed { .. } => "session:closed",
            Event::SessionDied { .. } => "session:died",
            Event::OutputChanged { .. } => "session:output",
            Event::SessionCompleted { .. } => "session:completed",
            Event::AgentActivity { .. } => "agent:activity",
            Event::ComputerHeartbeat { .. } => "computer:heartbeat",
            Event::TodoChanged { .. } => "todo:changed",
        }
    }

    /// Session this event concerns, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Event::SessionStarted { session } | Event::SessionUpdated { session } => {
                Some(&session.id)
            }
            Event::SessionClosed { session_id }
            | Event::SessionDied { session_id }
            | Event::OutputChanged { session_id, .. }
            | Event::SessionCompleted { session_id, .. }
            | Event::AgentActivity { session_id, .. }
            | Event::TodoChanged { session_id, .. } => Some(session_id),
            Event::ComputerHeartbeat { .. } => None,
        }
    }

    /// Serialization key for per-entity cache ordering: (kind, id).
    pub fn entity_key(&self) -> (&'static str, String) {
        match self {
            Event::ComputerHeartbeat { computer, .. } => ("computer", computer.clone()),
            other => (
                "session",
                other
                    .session_id()
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
            ),
        }
    }

    /// One-line summary for logs.
    pub fn log_summary(&self) -> String {
        match self {
            Event::SessionStarted { session } => {
                format!("session:started {}", session.short_id())
            }
            Event::SessionUpdated { session } => {
                format!("session:updated {}", session.short_id())
            }
            Event::SessionClosed { session_id } => {
                format!("session:closed {}", session_id.short_id())
            }
            Event::SessionDied { session_id } => {
                format!("session:died {}", session_id.short_id())
            }
            Event::OutputChanged {
                session_id, text, ..
            } => format!(
                "session:output {} ({} bytes)",
                session_id.short_id(),
                text.len()
            ),
            Event::SessionCompleted { session_id, .. } => {
                format!("session:completed {}", session_id.short_id())
            }
            Event::AgentActivity {
                session_id, kind, ..
            } => format!("agent:activity {} {:?}", session_id.short_id(), kind),
            Event::ComputerHeartbeat { computer, .. } => {
                format!("computer:heartbeat {}", computer)
            }
            Event::TodoChanged {
                session_id, change, ..
            } => format!("todo:changed {} {:?}", session_id.short_id(), change),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
