// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

const SAMPLE: &str = r#"
computer_name = "workstation"
idle_notification_seconds = 45
redis_url = "redis://127.0.0.1/"

[adapters]
enabled = ["telegram", "api"]
telegram_bot_token = "123:abc"

[agents.claude]
enabled = true
strengths = ["refactoring"]

[agents.codex]
enabled = false

[computers.workstation]
trusted_dirs = ["/home/user/projects"]
"#;

fn write_config(text: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(text.as_bytes()).unwrap();
    (dir, path)
}

#[test]
fn load_parses_full_config() {
    let (_dir, path) = write_config(SAMPLE);
    let config = Config::load(&path).unwrap();
    assert_eq!(config.computer_name, "workstation");
    assert_eq!(config.idle_notification_seconds, 45);
    assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
    assert!(config.agent_enabled(AgentKind::Claude));
    assert!(!config.agent_enabled(AgentKind::Codex));
    // Unknown-to-config agents are not enabled
    assert!(!config.agent_enabled(AgentKind::Gemini));
}

#[test]
fn load_missing_file_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.toml");
    assert!(matches!(
        Config::load(&missing),
        Err(ConfigError::NotFound(_))
    ));
}

#[test]
fn empty_computer_name_rejected() {
    let (_dir, path) = write_config("computer_name = \"\"\n");
    assert!(matches!(
        Config::load(&path),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn unknown_agent_name_rejected() {
    let (_dir, path) = write_config(
        "computer_name = \"box\"\n[agents.gpt5]\nenabled = true\n",
    );
    assert!(matches!(
        Config::load(&path),
        Err(ConfigError::Invalid(_))
    ));
}

#[test]
fn known_agents_sorted_by_name() {
    let (_dir, path) = write_config(SAMPLE);
    let config = Config::load(&path).unwrap();
    assert_eq!(
        config.known_agents(),
        vec![AgentKind::Claude, AgentKind::Codex]
    );
}

#[test]
fn cwd_trust_enforced_per_computer() {
    let (_dir, path) = write_config(SAMPLE);
    let config = Config::load(&path).unwrap();
    assert!(config.cwd_trusted("workstation", Path::new("/home/user/projects/app")));
    assert!(!config.cwd_trusted("workstation", Path::new("/etc")));
    // No trusted list configured means no restriction
    assert!(config.cwd_trusted("laptop", Path::new("/anywhere")));
}
