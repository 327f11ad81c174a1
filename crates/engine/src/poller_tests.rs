// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::bus::EventReader;
use std::time::Duration;
use tc_core::test_support::session_fixture;
use tc_core::FakeClock;
use tc_mux::{ExitMarker, FakeMux, MuxAdapter};

struct Fixture {
    mux: FakeMux,
    storage: Storage,
    registry: PollerRegistry,
    reader: EventReader,
    bus: EventBus,
    session: Session,
    _dir: tempfile::TempDir,
    outputs: OutputFiles,
}

fn fast_config() -> PollerConfig {
    PollerConfig {
        initial_delay: Duration::from_millis(5),
        poll_interval: Duration::from_millis(10),
        idle_notification: Duration::from_millis(80),
        max_polls: 600,
        streaming_window: Duration::from_secs(8),
    }
}

async fn fixture() -> Fixture {
    let storage = Storage::open_in_memory().unwrap();
    let mux = FakeMux::new();
    let (bus, reader) = EventBus::new();
    let dir = tempfile::tempdir().unwrap();
    let outputs = OutputFiles::new(dir.path());
    let session = session_fixture("11112222-aaaa-bbbb-cccc-333344445555");
    storage.insert_session(&session).unwrap();
    mux.create(&session.mux_name, std::path::Path::new("/work"), 200, 50)
        .await
        .unwrap();
    Fixture {
        mux,
        storage,
        registry: PollerRegistry::new(),
        reader,
        bus,
        session,
        _dir: dir,
        outputs,
    }
}

impl Fixture {
    fn spawn(&self, marker: Option<ExitMarker>, config: PollerConfig) {
        spawn_poller(
            &self.registry,
            &self.session,
            marker,
            PollerDeps {
                mux: self.mux.clone(),
                storage: self.storage.clone(),
                bus: self.bus.clone(),
                outputs: self.outputs.clone(),
                clock: FakeClock::default(),
                config,
            },
        );
    }

    /// Collect bus events until the predicate matches one, or time out.
    async fn wait_event(
        &mut self,
        what: &str,
        mut predicate: impl FnMut(&Event) -> bool,
    ) -> Event {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                panic!("timed out waiting for {}", what);
            }
            match tokio::time::timeout(remaining, self.reader.recv()).await {
                Ok(Some(event)) if predicate(&event) => return event,
                Ok(Some(_)) => continue,
                Ok(None) => panic!("bus closed waiting for {}", what),
                Err(_) => panic!("timed out waiting for {}", what),
            }
        }
    }
}

#[tokio::test]
async fn emits_incremental_output() {
    let mut fx = fixture().await;
    fx.spawn(None, fast_config());
    fx.mux.append_content(&fx.session.mux_name, "first\n");

    let event = fx
        .wait_event("output", |e| matches!(e, Event::OutputChanged { .. }))
        .await;
    let Event::OutputChanged { text, mode, .. } = event else {
        unreachable!()
    };
    assert_eq!(text, "first\n");
    assert_eq!(mode, OutputMode::StreamingEdit);

    // Only new bytes are emitted on the next poll
    fx.mux.append_content(&fx.session.mux_name, "second\n");
    let event = fx
        .wait_event("second output", |e| {
            matches!(e, Event::OutputChanged { text, .. } if text == "second\n")
        })
        .await;
    let Event::OutputChanged { text, .. } = event else {
        unreachable!()
    };
    assert_eq!(text, "second\n");
}

#[tokio::test]
async fn completion_on_exit_marker_stops_poller() {
    let mut fx = fixture().await;
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    fx.spawn(Some(marker.clone()), fast_config());

    fx.mux.append_content(&fx.session.mux_name, "hello\n");
    fx.mux
        .append_content(&fx.session.mux_name, "__EXIT__aabbccdd00112233__0__\n");

    let event = fx
        .wait_event("completion", |e| {
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

    // Poller terminated and deregistered
    for _ in 0..100 {
        if !fx.registry.get(&fx.session.id) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("poller still registered after completion");
}

#[tokio::test]
async fn terminal_chunk_precedes_completion() {
    let mut fx = fixture().await;
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    fx.spawn(Some(marker), fast_config());
    fx.mux.append_content(&fx.session.mux_name, "body\n");
    fx.mux
        .append_content(&fx.session.mux_name, "__EXIT__aabbccdd00112233__0__\n");

    let mut saw_terminal_chunk = false;
    loop {
        let event = fx
            .wait_event("terminal events", |_| true)
            .await;
        match event {
            Event::OutputChanged { text, chunk, .. } if text == "[Output Complete]" => {
                saw_terminal_chunk = true;
                assert!(chunk.is_some());
            }
            Event::SessionCompleted { .. } => break,
            _ => {}
        }
    }
    assert!(saw_terminal_chunk, "terminal [Output Complete] chunk first");
}

#[tokio::test]
async fn idle_notification_does_not_stop_polling() {
    let mut fx = fixture().await;
    fx.spawn(None, fast_config());

    // No output at all: idle notification fires once
    let event = fx
        .wait_event("idle update", |e| {
            matches!(e, Event::SessionUpdated { session }
                if session.status == SessionStatus::Idle)
        })
        .await;
    drop(event);

    // Resumption clears the notification and output still flows
    fx.mux.append_content(&fx.session.mux_name, "back\n");
    fx.wait_event("resume update", |e| {
        matches!(e, Event::SessionUpdated { session }
            if session.status == SessionStatus::Active)
    })
    .await;
    fx.wait_event("output after idle", |e| {
        matches!(e, Event::OutputChanged { text, .. } if text == "back\n")
    })
    .await;
    assert!(fx.registry.get(&fx.session.id), "poller still running");
}

#[tokio::test]
async fn pane_death_emits_session_died() {
    let mut fx = fixture().await;
    fx.spawn(None, fast_config());
    fx.mux.kill_externally(&fx.session.mux_name);

    fx.wait_event("death", |e| matches!(e, Event::SessionDied { .. }))
        .await;
    assert_eq!(
        fx.storage
            .get_session(&fx.session.id)
            .unwrap()
            .unwrap()
            .status,
        SessionStatus::Failed
    );
    assert!(!fx.outputs.exists(fx.session.short_id()));
}

#[tokio::test]
async fn max_polls_is_a_safety_net() {
    let mut fx = fixture().await;
    fx.spawn(
        None,
        PollerConfig {
            max_polls: 3,
            ..fast_config()
        },
    );

    for _ in 0..100 {
        if !fx.registry.get(&fx.session.id) {
            // Terminated quietly: no completion or death events
            assert!(fx.reader.try_recv().is_none());
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("poller did not stop at max polls");
}

#[tokio::test]
async fn chunked_mode_after_streaming_window() {
    let mut fx = fixture().await;
    fx.spawn(
        None,
        PollerConfig {
            streaming_window: Duration::from_millis(0),
            ..fast_config()
        },
    );
    fx.mux.append_content(&fx.session.mux_name, "later output\n");

    let event = fx
        .wait_event("chunked output", |e| matches!(e, Event::OutputChanged { .. }))
        .await;
    let Event::OutputChanged { mode, chunk, .. } = event else {
        unreachable!()
    };
    assert_eq!(mode, OutputMode::ChunkedSequential);
    assert_eq!(chunk, Some(1));
}

#[tokio::test]
async fn output_file_tracks_pane_output() {
    let mut fx = fixture().await;
    fx.spawn(None, fast_config());
    fx.mux.append_content(&fx.session.mux_name, "persisted\n");

    fx.wait_event("output", |e| matches!(e, Event::OutputChanged { .. }))
        .await;
    assert_eq!(
        fx.outputs.read(fx.session.short_id()).unwrap(),
        "persisted\n"
    );
}

#[tokio::test]
async fn marker_text_never_reaches_output_events() {
    let mut fx = fixture().await;
    let marker = ExitMarker::from_hash("aabbccdd00112233");
    fx.spawn(Some(marker), fast_config());

    // Echoed command line with template, output, then expansion arrive in
    // one capture
    fx.mux.append_content(
        &fx.session.mux_name,
        "$ ls; echo \"__EXIT__aabbccdd00112233__$?__\"\nfile.txt\n__EXIT__aabbccdd00112233__0__\n",
    );

    loop {
        let event = fx.wait_event("events", |_| true).await;
        match event {
            Event::OutputChanged { text, .. } => {
                assert!(!text.contains("__EXIT__"), "marker leaked: {}", text);
            }
            Event::SessionCompleted { body, .. } => {
                assert!(!body.contains("__EXIT__"));
                assert!(body.contains("file.txt"));
                break;
            }
            _ => {}
        }
    }
}
