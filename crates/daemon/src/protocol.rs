// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket protocol.
//!
//! Adapters, the MCP stdio wrapper, and the CLI all speak this. The MCP
//! wrapper injects `caller_session_id` from its environment; snapshot
//! reads back the TUI; hooks arrive from the agent-side stdio helper.

use serde::{Deserialize, Serialize};
use tc_core::{Command, CommandSource, HookEvent, Session, SessionId};

/// Requests accepted on the daemon socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Submit a command to the durable queue.
    Submit {
        command: Command,
        source: CommandSource,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dedup_key: Option<String>,
        /// Session of the agent issuing the command (MCP wrapper injects).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        caller_session_id: Option<SessionId>,
    },

    /// Deliver an agent-lifecycle hook.
    Hook { hook: HookEvent },

    /// Read one snapshot from the cache.
    GetSnapshot {
        entity_kind: String,
        entity_id: String,
    },

    /// List live sessions.
    ListSessions,

    /// Daemon status for health checks and the CLI banner.
    Status,

    /// Request graceful shutdown.
    Shutdown,
}

/// Responses on the daemon socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Command accepted into the queue.
    Accepted {
        entry_id: i64,
        dedup_key: String,
        duplicate: bool,
    },

    /// Hook accepted; `block_message` is set when the stop must block.
    HookAck {
        outbox_id: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        block_message: Option<String>,
    },

    Snapshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<serde_json::Value>,
    },

    Sessions {
        sessions: Vec<Session>,
    },

    Status {
        version: String,
        computer: String,
        uptime_secs: u64,
        active_sessions: usize,
        pending_hooks: u64,
        schema_version: u32,
    },

    Ok,

    Error {
        code: String,
        message: String,
    },
}

impl Response {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
