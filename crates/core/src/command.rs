// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed commands accepted at ingress and persisted in the durable queue.
//!
//! Serializes with `{"kind": "new_session", ...fields}` format so queued
//! payloads remain readable and forward-compatible JSON.

use crate::availability::AvailabilityStatus;
use crate::session::{AgentKind, SessionId, ThinkingMode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where a command entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandSource {
    Api,
    Telegram,
    Discord,
    Mcp,
    Cron,
    Cli,
    Redis,
}

impl CommandSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandSource::Api => "api",
            CommandSource::Telegram => "telegram",
            CommandSource::Discord => "discord",
            CommandSource::Mcp => "mcp",
            CommandSource::Cron => "cron",
            CommandSource::Cli => "cli",
            CommandSource::Redis => "redis",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "api" => Some(CommandSource::Api),
            "telegram" => Some(CommandSource::Telegram),
            "discord" => Some(CommandSource::Discord),
            "mcp" => Some(CommandSource::Mcp),
            "cron" => Some(CommandSource::Cron),
            "cli" => Some(CommandSource::Cli),
            "redis" => Some(CommandSource::Redis),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commands the queue worker executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Command {
    /// Create a new agent session.
    NewSession {
        cwd: PathBuf,
        /// Empty string means implicit selection via the routing resolver.
        #[serde(default)]
        agent: String,
        #[serde(default)]
        mode: ThinkingMode,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        /// Initial command to key into the pane after spawn.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_message: Option<String>,
    },

    /// Send text into an existing session's pane.
    SendMessage { session_id: SessionId, text: String },

    /// Close a session (idempotent).
    EndSession { session_id: SessionId },

    /// Launch the agent CLI inside an existing session's pane.
    StartAgent {
        session_id: SessionId,
        #[serde(default)]
        agent: String,
        #[serde(default)]
        mode: ThinkingMode,
    },

    /// Resume a previous agent conversation inside the session.
    ResumeAgent {
        session_id: SessionId,
        #[serde(default)]
        agent: String,
    },

    /// Kill and relaunch the agent inside the session.
    AgentRestart { session_id: SessionId },

    /// Start the agent, wait for readiness, then send a message.
    AgentThenMessage {
        session_id: SessionId,
        #[serde(default)]
        agent: String,
        #[serde(default)]
        mode: ThinkingMode,
        text: String,
    },

    /// Run an agent slash/built-in command inside the session.
    RunAgentCommand { session_id: SessionId, command: String },

    /// Pull and restart the daemon installation.
    Deploy {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        git_ref: Option<String>,
    },

    /// Mark an agent's availability.
    MarkAgentStatus {
        agent: AgentKind,
        status: AvailabilityStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        until: Option<DateTime<Utc>>,
    },
}

/// Stable kind discriminant, used for per-kind queue policy and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    NewSession,
    SendMessage,
    EndSession,
    StartAgent,
    ResumeAgent,
    AgentRestart,
    AgentThenMessage,
    RunAgentCommand,
    Deploy,
    MarkAgentStatus,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::NewSession => "new_session",
            CommandKind::SendMessage => "send_message",
            CommandKind::EndSession => "end_session",
            CommandKind::StartAgent => "start_agent",
            CommandKind::ResumeAgent => "resume_agent",
            CommandKind::AgentRestart => "agent_restart",
            CommandKind::AgentThenMessage => "agent_then_message",
            CommandKind::RunAgentCommand => "run_agent_command",
            CommandKind::Deploy => "deploy",
            CommandKind::MarkAgentStatus => "mark_agent_status",
        }
    }
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::NewSession { .. } => CommandKind::NewSession,
            Command::SendMessage { .. } => CommandKind::SendMessage,
            Command::EndSession { .. } => CommandKind::EndSession,
            Command::StartAgent { .. } => CommandKind::StartAgent,
            Command::ResumeAgent { .. } => CommandKind::ResumeAgent,
            Command::AgentRestart { .. } => CommandKind::AgentRestart,
            Command::AgentThenMessage { .. } => CommandKind::AgentThenMessage,
            Command::RunAgentCommand { .. } => CommandKind::RunAgentCommand,
            Command::Deploy { .. } => CommandKind::Deploy,
            Command::MarkAgentStatus { .. } => CommandKind::MarkAgentStatus,
        }
    }

    /// Session this command targets, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        match self {
            Command::SendMessage { session_id, .. }
            | Command::EndSession { session_id }
            | Command::StartAgent { session_id, .. }
            | Command::ResumeAgent { session_id, .. }
            | Command::AgentRestart { session_id }
            | Command::AgentThenMessage { session_id, .. }
            | Command::RunAgentCommand { session_id, .. } => Some(session_id),
            Command::NewSession { .. } | Command::Deploy { .. } | Command::MarkAgentStatus { .. } => {
                None
            }
        }
    }
}

/// A command plus its delivery metadata, as accepted at ingress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandEnvelope {
    pub command: Command,
    pub source: CommandSource,
    /// Deduplication key; (source, dedup_key) is unique in the queue.
    pub dedup_key: String,
    /// Session of the agent that issued the command, when agent-issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_session_id: Option<SessionId>,
    pub accepted_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
