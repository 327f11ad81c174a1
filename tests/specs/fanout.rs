// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S5: adapter-lane isolation during fan-out.

use std::sync::Arc;
use std::time::Duration;
use tc_adapters::{AdapterClient, FakeUiAdapter, LaneConfig};
use tc_core::{Event, OutputMode, SessionId};
use tc_storage::Storage;

fn output_event(session: &str, text: &str) -> Event {
    Event::OutputChanged {
        session_id: SessionId::new(session),
        text: text.to_string(),
        mode: OutputMode::StreamingEdit,
        chunk: None,
        digest: format!("digest-{}", text),
        at: chrono::Utc::now(),
    }
}

fn lane_config() -> LaneConfig {
    LaneConfig {
        queue_depth: 32,
        call_timeout: Duration::from_millis(500),
        ready_backoff_base: Duration::from_millis(5),
        ready_backoff_cap: Duration::from_millis(20),
        ready_attempts: 3,
        quarantine_threshold: 10,
        failure_window: Duration::from_secs(60),
    }
}

async fn wait_for(mut predicate: impl FnMut() -> bool) {
    for _ in 0..300 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within deadline");
}

#[tokio::test]
async fn s5_failing_lane_is_isolated() {
    let client = AdapterClient::new(Storage::open_in_memory().unwrap(), lane_config());
    let healthy = FakeUiAdapter::new("a1");
    let failing = FakeUiAdapter::new("a2");
    failing.fail_next_deliveries(1);
    client.register(Arc::new(healthy.clone())).unwrap();
    client.register(Arc::new(failing.clone())).unwrap();

    // One event: a1 receives it, a2 logs a timeout and is not retried
    // within the same event
    client.dispatch(&output_event("s1", "first"), None);
    wait_for(|| healthy.delivered_events().len() == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(failing.delivered_events().is_empty());

    // Subsequent events for the session keep flowing to a1 and reach a2
    // again once it recovers
    client.dispatch(&output_event("s1", "second"), None);
    wait_for(|| healthy.delivered_events().len() == 2).await;
    wait_for(|| failing.delivered_events().len() == 1).await;

    // No other session's delivery was affected
    client.dispatch(&output_event("s2", "other"), None);
    wait_for(|| healthy.delivered_events().len() == 3).await;
    wait_for(|| failing.delivered_events().len() == 2).await;
}

#[tokio::test]
async fn per_adapter_delivery_preserves_session_order() {
    let client = AdapterClient::new(Storage::open_in_memory().unwrap(), lane_config());
    let adapter = FakeUiAdapter::new("a1");
    client.register(Arc::new(adapter.clone())).unwrap();

    for i in 0..10 {
        client.dispatch(&output_event("s1", &format!("line-{i}")), None);
    }
    wait_for(|| adapter.delivered_events().len() == 10).await;

    let texts: Vec<String> = adapter
        .delivered_events()
        .into_iter()
        .filter_map(|event| match event {
            Event::OutputChanged { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    let expected: Vec<String> = (0..10).map(|i| format!("line-{i}")).collect();
    assert_eq!(texts, expected);
}

#[tokio::test]
async fn delivered_digests_survive_redispatch() {
    let storage = Storage::open_in_memory().unwrap();
    let client = AdapterClient::new(storage.clone(), lane_config());
    let adapter = FakeUiAdapter::new("a1");
    client.register(Arc::new(adapter.clone())).unwrap();

    let event = output_event("s1", "once");
    client.dispatch(&event, None);
    wait_for(|| adapter.delivered_events().len() == 1).await;

    // The same event replayed (restart recovery) is suppressed by the
    // persisted digest
    client.dispatch(&event, None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(adapter.delivered_events().len(), 1);
}
