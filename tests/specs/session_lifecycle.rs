// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S1/S2: session lifecycle over the full pipeline.

use crate::prelude::{pipeline, pipeline_with};
use std::path::PathBuf;
use tc_core::{Command, CommandSource, Event, ThinkingMode};
use tc_mux::FakeMux;

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
async fn s1_basic_session_lifecycle() {
    let mut pipeline = pipeline_with(FakeMux::new().auto_complete(0));

    // new_session: accepted, pane exists, SessionStarted, output file
    pipeline
        .run_command(new_session(), CommandSource::Api)
        .await;
    let event = pipeline
        .wait_event("SessionStarted", |e| {
            matches!(e, Event::SessionStarted { .. })
        })
        .await;
    let Event::SessionStarted { session } = event else {
        unreachable!()
    };
    assert_eq!(session.mux_name, format!("tc_{}", session.short_id()));
    assert!(pipeline.mux.is_alive(&session.mux_name));
    assert!(pipeline.outputs.exists(session.short_id()));

    // send_message: pane receives the command with an exit marker appended
    pipeline
        .run_command(
            Command::SendMessage {
                session_id: session.id.clone(),
                text: "echo hello".to_string(),
            },
            CommandSource::Api,
        )
        .await;
    let sent = pipeline.mux.last_sent(&session.mux_name).unwrap();
    assert!(sent.starts_with("echo hello; echo \"__EXIT__"));

    // completion arrives with the marker stripped
    let event = pipeline
        .wait_event("SessionCompleted", |e| {
            matches!(e, Event::SessionCompleted { .. })
        })
        .await;
    let Event::SessionCompleted {
        body, exit_code, ..
    } = event
    else {
        unreachable!()
    };
    assert!(body.contains("hello"));
    assert!(!body.contains("__EXIT__"));
    assert_eq!(exit_code, Some(0));

    // end_session: pane gone, SessionClosed, output file deleted
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
    assert!(!pipeline.mux.is_alive(&session.mux_name));
    assert!(!pipeline.outputs.exists(session.short_id()));
}

#[tokio::test]
async fn s2_interactive_command_gets_no_marker() {
    let mut pipeline = pipeline();
    pipeline
        .run_command(new_session(), CommandSource::Api)
        .await;
    let event = pipeline
        .wait_event("SessionStarted", |e| {
            matches!(e, Event::SessionStarted { .. })
        })
        .await;
    let Event::SessionStarted { session } = event else {
        unreachable!()
    };

    // The pane is running vim: input passes through verbatim
    pipeline.mux.set_current_command(&session.mux_name, "vim");
    pipeline
        .run_command(
            Command::SendMessage {
                session_id: session.id.clone(),
                text: ":wq".to_string(),
            },
            CommandSource::Api,
        )
        .await;
    assert_eq!(pipeline.mux.last_sent(&session.mux_name).unwrap(), ":wq");

    // No completion while vim runs; polling continues
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    pipeline.drain_events();
    assert!(pipeline.manager.pollers().get(&session.id));
}

#[tokio::test]
async fn end_session_twice_observes_once_semantics() {
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
        .run_command(
            Command::EndSession {
                session_id: session.id.clone(),
            },
            CommandSource::Api,
        )
        .await;

    // Exactly one SessionClosed despite two close commands
    let mut closed = 0;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    while let Some(event) = pipeline.reader.try_recv() {
        if matches!(event, Event::SessionClosed { .. }) {
            closed += 1;
        }
    }
    assert_eq!(closed, 1);
}
