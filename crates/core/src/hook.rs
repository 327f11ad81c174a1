// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized agent-lifecycle hook events.
//!
//! External agents emit hooks through a stdio helper that frames them onto
//! the daemon's Unix socket; the receiver normalizes them into this shape
//! before inserting a pending outbox row.

use crate::event::AgentActivityKind;
use crate::session::{AgentKind, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of lifecycle hook, as reported by the agent runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HookKind {
    UserPromptSubmit,
    PreToolUse,
    PostToolUse,
    Stop,
}

impl HookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::UserPromptSubmit => "user_prompt_submit",
            HookKind::PreToolUse => "pre_tool_use",
            HookKind::PostToolUse => "post_tool_use",
            HookKind::Stop => "stop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user_prompt_submit" => Some(HookKind::UserPromptSubmit),
            "pre_tool_use" => Some(HookKind::PreToolUse),
            "post_tool_use" => Some(HookKind::PostToolUse),
            "stop" => Some(HookKind::Stop),
            _ => None,
        }
    }

    /// Activity kind carried on the fan-out event for this hook.
    pub fn activity_kind(&self) -> AgentActivityKind {
        match self {
            HookKind::UserPromptSubmit => AgentActivityKind::UserPromptSubmit,
            HookKind::PreToolUse => AgentActivityKind::ToolUse,
            HookKind::PostToolUse => AgentActivityKind::ToolDone,
            HookKind::Stop => AgentActivityKind::AgentStop,
        }
    }
}

/// A normalized hook event awaiting outbox processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookEvent {
    pub kind: HookKind,
    pub session_id: SessionId,
    pub agent: AgentKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Short excerpt of the prompt or tool input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// For post_tool_use: whether the tool call succeeded. Feeds the
    /// checkpoint engine's evidence suppression.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Set by the agent runtime when this stop was itself triggered by a
    /// blocking hook response; the checkpoint engine must pass through.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stop_hook_active: bool,
    pub at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "hook_tests.rs"]
mod tests;
