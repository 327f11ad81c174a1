// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent session records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

crate::define_id! {
    /// Stable identifier for an agent session (UUIDv4).
    ///
    /// The first 8 hex characters serve as the short form used in the
    /// multiplexer session name and output file paths.
    pub struct SessionId;
}

/// Number of characters in the short form of a session id.
pub const SHORT_ID_LEN: usize = 8;

/// Prefix for multiplexer session names.
pub const MUX_NAME_PREFIX: &str = "tc_";

impl SessionId {
    /// Generate a fresh UUIDv4 session id.
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// The 8-character short form of this id.
    pub fn short_id(&self) -> &str {
        self.short(SHORT_ID_LEN)
    }

    /// Multiplexer session name derived from this id (`tc_{short_id}`).
    pub fn mux_name(&self) -> String {
        format!("{}{}", MUX_NAME_PREFIX, self.short_id())
    }
}

/// Which agent CLI runs inside the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Claude,
    Gemini,
    Codex,
}

impl AgentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Claude => "claude",
            AgentKind::Gemini => "gemini",
            AgentKind::Codex => "codex",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "claude" => Some(AgentKind::Claude),
            "gemini" => Some(AgentKind::Gemini),
            "codex" => Some(AgentKind::Codex),
            _ => None,
        }
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reasoning-effort mode requested for the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingMode {
    Fast,
    #[default]
    Med,
    Slow,
}

impl ThinkingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingMode::Fast => "fast",
            ThinkingMode::Med => "med",
            ThinkingMode::Slow => "slow",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fast" => Some(ThinkingMode::Fast),
            "med" => Some(ThinkingMode::Med),
            "slow" => Some(ThinkingMode::Slow),
            _ => None,
        }
    }
}

/// Lifecycle status of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Idle,
    Disconnected,
    Closed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Idle => "idle",
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Closed => "closed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(SessionStatus::Active),
            "idle" => Some(SessionStatus::Idle),
            "disconnected" => Some(SessionStatus::Disconnected),
            "closed" => Some(SessionStatus::Closed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }

    /// Terminal statuses never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Closed | SessionStatus::Failed)
    }
}

/// A persisted agent session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    /// Multiplexer session name (`tc_{short_id}`).
    pub mux_name: String,
    pub cwd: PathBuf,
    pub agent: AgentKind,
    pub mode: ThinkingMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub status: SessionStatus,
    /// Adapter that created the session (api/telegram/discord/mcp/...).
    pub origin: String,
    /// Adapter-specific metadata (chat ids, thread ids, ...).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub adapter_meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Computer that owns this session.
    pub computer: String,
}

impl Session {
    pub fn short_id(&self) -> &str {
        self.id.short_id()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
