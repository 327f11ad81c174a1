// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable-queue properties: dedup, terminal states, FIFO.

use crate::prelude::pipeline;
use std::path::PathBuf;
use tc_core::{Clock, Command, CommandSource, SessionId, ThinkingMode};
use tc_storage::QueueState;

fn new_session() -> Command {
    Command::NewSession {
        cwd: PathBuf::from("/work"),
        agent: "claude".to_string(),
        mode: ThinkingMode::Fast,
        title: None,
        initial_message: None,
    }
}

#[tokio::test]
async fn unique_dedup_key_reaches_exactly_one_terminal_state() {
    let pipeline = pipeline();

    // Submit the same (source, dedup_key) three times
    for _ in 0..3 {
        pipeline
            .ingress
            .submit(
                new_session(),
                CommandSource::Telegram,
                Some("dk-s1".to_string()),
                None,
            )
            .unwrap();
    }

    // Exactly one entry exists; run it to a terminal state
    let entry = pipeline
        .storage
        .claim_next_command(CommandSource::Telegram, pipeline.clock.now())
        .unwrap()
        .unwrap();
    pipeline.worker.handle_entry(entry.clone()).await;
    assert!(pipeline
        .storage
        .claim_next_command(CommandSource::Telegram, pipeline.clock.now())
        .unwrap()
        .is_none());

    let finished = pipeline.storage.get_queue_entry(entry.id).unwrap().unwrap();
    assert_eq!(finished.state, QueueState::Delivered);
    // Exactly one session resulted from three submissions
    assert_eq!(pipeline.storage.list_sessions(false).unwrap().len(), 1);
}

#[tokio::test]
async fn failed_command_reaches_failed_terminally() {
    let pipeline = pipeline();
    let id = pipeline
        .run_command(
            Command::SendMessage {
                session_id: SessionId::new("ghost"),
                text: "hi".to_string(),
            },
            CommandSource::Api,
        )
        .await;

    let entry = pipeline.storage.get_queue_entry(id).unwrap().unwrap();
    assert_eq!(entry.state, QueueState::Failed);
    assert!(entry.last_error.is_some());
}

#[tokio::test]
async fn source_classes_are_independent_fifo_lanes() {
    let pipeline = pipeline();
    pipeline
        .ingress
        .submit(new_session(), CommandSource::Api, Some("a-1".into()), None)
        .unwrap();
    pipeline
        .ingress
        .submit(new_session(), CommandSource::Cron, Some("c-1".into()), None)
        .unwrap();
    pipeline
        .ingress
        .submit(new_session(), CommandSource::Api, Some("a-2".into()), None)
        .unwrap();

    // Claiming api drains in acceptance order and never touches cron
    let first = pipeline
        .storage
        .claim_next_command(CommandSource::Api, pipeline.clock.now())
        .unwrap()
        .unwrap();
    assert_eq!(first.envelope.dedup_key, "a-1");
    let second = pipeline
        .storage
        .claim_next_command(CommandSource::Api, pipeline.clock.now())
        .unwrap()
        .unwrap();
    assert_eq!(second.envelope.dedup_key, "a-2");

    assert_eq!(
        pipeline
            .storage
            .pending_command_count(CommandSource::Cron)
            .unwrap(),
        1
    );
}
