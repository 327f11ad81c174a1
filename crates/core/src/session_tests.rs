// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[test]
fn generate_produces_uuid_with_short_form() {
    let id = SessionId::generate();
    assert_eq!(id.as_str().len(), 36);
    assert_eq!(id.short_id().len(), SHORT_ID_LEN);
    assert!(id.as_str().starts_with(id.short_id()));
}

#[test]
fn mux_name_derivation() {
    let id = SessionId::new("0a1b2c3d-0000-0000-0000-000000000000");
    assert_eq!(id.mux_name(), "tc_0a1b2c3d");
}

#[parameterized(
    claude = { "claude", AgentKind::Claude },
    gemini = { "gemini", AgentKind::Gemini },
    codex = { "codex", AgentKind::Codex },
)]
fn agent_kind_parse_roundtrip(s: &str, kind: AgentKind) {
    assert_eq!(AgentKind::parse(s), Some(kind));
    assert_eq!(kind.as_str(), s);
}

#[test]
fn agent_kind_parse_rejects_unknown() {
    assert_eq!(AgentKind::parse("gpt"), None);
    assert_eq!(AgentKind::parse(""), None);
}

#[parameterized(
    fast = { "fast", ThinkingMode::Fast },
    med = { "med", ThinkingMode::Med },
    slow = { "slow", ThinkingMode::Slow },
)]
fn thinking_mode_parse_roundtrip(s: &str, mode: ThinkingMode) {
    assert_eq!(ThinkingMode::parse(s), Some(mode));
    assert_eq!(mode.as_str(), s);
}

#[parameterized(
    active = { SessionStatus::Active, false },
    idle = { SessionStatus::Idle, false },
    disconnected = { SessionStatus::Disconnected, false },
    closed = { SessionStatus::Closed, true },
    failed = { SessionStatus::Failed, true },
)]
fn status_terminality(status: SessionStatus, terminal: bool) {
    assert_eq!(status.is_terminal(), terminal);
    assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
}

#[test]
fn session_serde_roundtrip() {
    let session = crate::test_support::session_fixture("11112222-aaaa-bbbb-cccc-333344445555");
    let json = serde_json::to_string(&session).unwrap();
    let back: Session = serde_json::from_str(&json).unwrap();
    assert_eq!(back, session);
}

#[test]
fn session_serde_omits_empty_optionals() {
    let session = crate::test_support::session_fixture("11112222-aaaa-bbbb-cccc-333344445555");
    let json = serde_json::to_value(&session).unwrap();
    assert!(json.get("title").is_none());
    assert!(json.get("closed_at").is_none());
    assert!(json.get("adapter_meta").is_none());
}
