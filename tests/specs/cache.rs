// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot-cache laws: derived-only state, rebuild equivalence.

use crate::prelude::{pipeline, pipeline_with};
use std::path::PathBuf;
use tc_core::{Command, CommandSource, Event, ThinkingMode};
use tc_engine::cache::KIND_SESSION;
use tc_mux::FakeMux;

fn new_session() -> Command {
    Command::NewSession {
        cwd: PathBuf::from("/work"),
        agent: "claude".to_string(),
        mode: ThinkingMode::Fast,
        title: Some("cache test".to_string()),
        initial_message: None,
    }
}

#[tokio::test]
async fn events_materialize_readable_snapshots() {
    let mut pipeline = pipeline();
    pipeline
        .run_command(new_session(), CommandSource::Api)
        .await;
    let Event::SessionStarted { session } = pipeline
        .wait_event("SessionStarted", |e| {
            matches!(e, Event::SessionStarted { .. })
        })
        .await
    else {
        unreachable!()
    };

    let snapshot = pipeline
        .cache
        .get(KIND_SESSION, session.id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(snapshot["title"], "cache test");
    assert_eq!(snapshot["status"], "active");
}

#[tokio::test]
async fn truncate_and_rebuild_matches_primary_store() {
    let mut pipeline = pipeline();
    pipeline
        .run_command(new_session(), CommandSource::Api)
        .await;
    let Event::SessionStarted { session } = pipeline
        .wait_event("SessionStarted", |e| {
            matches!(e, Event::SessionStarted { .. })
        })
        .await
    else {
        unreachable!()
    };
    let before = pipeline
        .cache
        .get(KIND_SESSION, session.id.as_str())
        .unwrap()
        .unwrap();

    // Truncate the cache; warm-up from the primary store reproduces the
    // same observable snapshot
    pipeline.storage.truncate_snapshots().unwrap();
    assert!(pipeline
        .cache
        .get(KIND_SESSION, session.id.as_str())
        .unwrap()
        .is_none());
    pipeline.cache.warm().unwrap();
    let after = pipeline
        .cache
        .get(KIND_SESSION, session.id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn repeated_reads_without_events_are_stable() {
    let mut pipeline = pipeline_with(FakeMux::new());
    pipeline
        .run_command(new_session(), CommandSource::Api)
        .await;
    let Event::SessionStarted { session } = pipeline
        .wait_event("SessionStarted", |e| {
            matches!(e, Event::SessionStarted { .. })
        })
        .await
    else {
        unreachable!()
    };
    pipeline.drain_events();

    let first = pipeline.cache.get_session(&session.id).unwrap();
    let second = pipeline.cache.get_session(&session.id).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn closed_session_snapshot_reflects_closure() {
    let mut pipeline = pipeline();
    pipeline
        .run_command(new_session(), CommandSource::Api)
        .await;
    let Event::SessionStarted { session } = pipeline
        .wait_event("SessionStarted", |e| {
            matches!(e, Event::SessionStarted { .. })
        })
        .await
    else {
        unreachable!()
    };

    pipeline
        .run_command(
            Command::EndSession {
                session_id: session.id.clone(),
            },
            CommandSource::Api,
        )
        .await;
    pipeline
        .wait_event("SessionClosed", |e| {
            matches!(e, Event::SessionClosed { .. })
        })
        .await;

    let snapshot = pipeline
        .cache
        .get(KIND_SESSION, session.id.as_str())
        .unwrap()
        .unwrap();
    assert_eq!(snapshot["status"], "closed");
}
