// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S3: availability enforcement and the expiry-clearing law.

use crate::prelude::pipeline;
use chrono::Duration;
use std::path::PathBuf;
use tc_core::{
    AgentKind, AvailabilityStatus, Clock, Command, CommandSource, ThinkingMode,
};
use tc_storage::QueueState;

fn new_session(agent: &str) -> Command {
    Command::NewSession {
        cwd: PathBuf::from("/work"),
        agent: agent.to_string(),
        mode: ThinkingMode::Fast,
        title: None,
        initial_message: None,
    }
}

#[tokio::test]
async fn s3_unavailable_agent_is_rejected_deterministically() {
    let pipeline = pipeline();

    // Mark claude unavailable until T+1h through the command pipeline
    pipeline
        .run_command(
            Command::MarkAgentStatus {
                agent: AgentKind::Claude,
                status: AvailabilityStatus::Unavailable,
                reason: Some("quota exhausted".to_string()),
                until: Some(pipeline.clock.now() + Duration::hours(1)),
            },
            CommandSource::Cli,
        )
        .await;

    // Explicit request for claude: rejection with reason, no in-flight rows
    let id = pipeline
        .run_command(new_session("claude"), CommandSource::Telegram)
        .await;
    let entry = pipeline.storage.get_queue_entry(id).unwrap().unwrap();
    assert_eq!(entry.state, QueueState::Failed);
    assert!(entry.last_error.unwrap().contains("unavailable"));
    assert!(pipeline.storage.list_sessions(false).unwrap().is_empty());

    // Implicit selection excludes claude and picks the next routable agent
    let id = pipeline
        .run_command(new_session(""), CommandSource::Api)
        .await;
    let entry = pipeline.storage.get_queue_entry(id).unwrap().unwrap();
    assert_eq!(entry.state, QueueState::Delivered);
    let sessions = pipeline.storage.list_sessions(false).unwrap();
    assert_eq!(sessions[0].agent, AgentKind::Codex);
}

#[tokio::test]
async fn s3_no_routable_agent_rejection() {
    let pipeline = pipeline();
    for agent in [AgentKind::Claude, AgentKind::Codex, AgentKind::Gemini] {
        pipeline
            .run_command(
                Command::MarkAgentStatus {
                    agent,
                    status: AvailabilityStatus::Unavailable,
                    reason: None,
                    until: Some(pipeline.clock.now() + Duration::hours(1)),
                },
                CommandSource::Cli,
            )
            .await;
    }

    let id = pipeline
        .run_command(new_session(""), CommandSource::Api)
        .await;
    let entry = pipeline.storage.get_queue_entry(id).unwrap().unwrap();
    assert_eq!(entry.state, QueueState::Failed);
    assert!(entry.last_error.unwrap().contains("no routable agent"));
}

#[tokio::test]
async fn expiry_clears_with_no_explicit_clear() {
    let pipeline = pipeline();
    pipeline
        .run_command(
            Command::MarkAgentStatus {
                agent: AgentKind::Claude,
                status: AvailabilityStatus::Unavailable,
                reason: None,
                until: Some(pipeline.clock.now() + Duration::minutes(30)),
            },
            CommandSource::Cli,
        )
        .await;

    // Clock advances past the expiry; the next read treats the agent as
    // available with no explicit clear
    pipeline.clock.advance(Duration::hours(1));
    let id = pipeline
        .run_command(new_session("claude"), CommandSource::Api)
        .await;
    let entry = pipeline.storage.get_queue_entry(id).unwrap().unwrap();
    assert_eq!(entry.state, QueueState::Delivered);
}
