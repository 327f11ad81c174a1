// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders and fixtures for other crates' tests.

use crate::config::{AgentConfig, Config};
use crate::session::{AgentKind, Session, SessionId, SessionStatus, ThinkingMode};
use chrono::Utc;
use std::collections::HashMap;
use std::path::PathBuf;

/// A session record with sensible defaults for tests.
pub fn session_fixture(id: &str) -> Session {
    let id = SessionId::new(id);
    let mux_name = id.mux_name();
    Session {
        id,
        mux_name,
        cwd: PathBuf::from("/work"),
        agent: AgentKind::Claude,
        mode: ThinkingMode::Fast,
        title: None,
        status: SessionStatus::Active,
        origin: "api".to_string(),
        adapter_meta: serde_json::Value::Null,
        created_at: Utc::now(),
        last_activity_at: Utc::now(),
        closed_at: None,
        computer: "testbox".to_string(),
    }
}

/// A config with all three agents enabled and no trust restrictions.
pub fn config_fixture() -> Config {
    let mut agents = HashMap::new();
    for name in ["claude", "gemini", "codex"] {
        agents.insert(name.to_string(), AgentConfig::default());
    }
    Config {
        computer_name: "testbox".to_string(),
        adapters: Default::default(),
        agents,
        idle_notification_seconds: 60,
        shell_name: Some("bash".to_string()),
        computers: HashMap::new(),
        redis_url: None,
    }
}
