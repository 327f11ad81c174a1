// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter registry and fan-out dispatcher.
//!
//! One bounded lane (task + queue) per registered adapter. Dispatch clones
//! the event into every lane; a full lane drops the event for that lane
//! with a logged counter instead of blocking the others. Per-adapter
//! delivery preserves per-session event order because each lane is a single
//! consumer.

use crate::backoff::Backoff;
use crate::ui::{AdapterError, UiAdapter};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tc_core::Event;
use tc_storage::Storage;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Tuning for per-adapter lanes.
#[derive(Debug, Clone)]
pub struct LaneConfig {
    /// Bounded queue depth; overflow drops the event for that lane.
    pub queue_depth: usize,
    /// Deadline for a single adapter call.
    pub call_timeout: Duration,
    /// Backoff base/cap while waiting on channel readiness.
    pub ready_backoff_base: Duration,
    pub ready_backoff_cap: Duration,
    /// Readiness attempts before giving up on the event.
    pub ready_attempts: u32,
    /// Failures within the window that quarantine the lane.
    pub quarantine_threshold: u32,
    pub failure_window: Duration,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            queue_depth: 256,
            call_timeout: Duration::from_secs(10),
            ready_backoff_base: Duration::from_millis(250),
            ready_backoff_cap: Duration::from_secs(10),
            ready_attempts: 5,
            quarantine_threshold: 5,
            failure_window: Duration::from_secs(60),
        }
    }
}

struct LaneMessage {
    event: Event,
    /// Adapter id the event originated from, when any. Origin lanes skip
    /// readiness gating (their channel necessarily exists).
    origin: Option<String>,
}

struct Lane {
    tx: mpsc::Sender<LaneMessage>,
    task: JoinHandle<()>,
    dropped: Arc<AtomicU64>,
}

/// Adapter registry + dispatcher. Clones share lanes.
#[derive(Clone)]
pub struct AdapterClient {
    lanes: Arc<RwLock<HashMap<String, Lane>>>,
    storage: Storage,
    config: LaneConfig,
}

impl AdapterClient {
    pub fn new(storage: Storage, config: LaneConfig) -> Self {
        Self {
            lanes: Arc::new(RwLock::new(HashMap::new())),
            storage,
            config,
        }
    }

    /// Register an adapter and start its lane. Duplicate ids are a startup
    /// failure, not a silent replacement.
    pub fn register(&self, adapter: Arc<dyn UiAdapter>) -> Result<(), AdapterError> {
        let id = adapter.id().to_string();
        let mut lanes = self.lanes.write();
        if lanes.contains_key(&id) {
            return Err(AdapterError::DuplicateId(id));
        }

        let (tx, rx) = mpsc::channel(self.config.queue_depth);
        let dropped = Arc::new(AtomicU64::new(0));
        let task = tokio::spawn(lane_loop(
            adapter,
            self.storage.clone(),
            self.config.clone(),
            rx,
        ));
        lanes.insert(id, Lane { tx, task, dropped });
        Ok(())
    }

    pub fn adapter_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lanes.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Events dropped on a lane due to overflow (for status reporting).
    pub fn dropped_count(&self, adapter_id: &str) -> u64 {
        self.lanes
            .read()
            .get(adapter_id)
            .map(|lane| lane.dropped.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Fan an event out to every lane. Never blocks: lane overflow drops
    /// the event for that lane with a logged counter.
    pub fn dispatch(&self, event: &Event, origin: Option<&str>) {
        let lanes = self.lanes.read();
        for (id, lane) in lanes.iter() {
            let msg = LaneMessage {
                event: event.clone(),
                origin: origin.map(|o| o.to_string()),
            };
            if let Err(mpsc::error::TrySendError::Full(_)) = lane.tx.try_send(msg) {
                let total = lane.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    adapter = %id,
                    event = %event.name(),
                    dropped_total = total,
                    "lane queue full, dropping event"
                );
            }
        }
    }

    /// Close all lanes and wait for their tasks to drain.
    pub async fn shutdown(&self) {
        let lanes: Vec<(String, Lane)> = {
            let mut map = self.lanes.write();
            map.drain().collect()
        };
        for (id, lane) in lanes {
            drop(lane.tx);
            if let Err(e) = lane.task.await {
                tracing::warn!(adapter = %id, error = %e, "lane task join failed");
            }
        }
    }
}

/// Digest identifying one (adapter, event) delivery, persisted to suppress
/// double delivery across restarts.
fn delivery_digest(adapter_id: &str, event: &Event) -> String {
    let mut hasher = Sha256::new();
    hasher.update(adapter_id.as_bytes());
    if let Ok(json) = serde_json::to_vec(event) {
        hasher.update(&json);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        use std::fmt::Write;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

async fn lane_loop(
    adapter: Arc<dyn UiAdapter>,
    storage: Storage,
    config: LaneConfig,
    mut rx: mpsc::Receiver<LaneMessage>,
) {
    let adapter_id = adapter.id().to_string();
    let mut failures: Vec<tokio::time::Instant> = Vec::new();
    let mut quarantined = false;

    while let Some(msg) = rx.recv().await {
        if quarantined {
            match adapter.health_check().await {
                Ok(()) => {
                    tracing::info!(adapter = %adapter_id, "lane recovered, lifting quarantine");
                    quarantined = false;
                    failures.clear();
                }
                Err(e) => {
                    tracing::debug!(
                        adapter = %adapter_id,
                        error = %e,
                        event = %msg.event.name(),
                        "lane quarantined, dropping event"
                    );
                    continue;
                }
            }
        }

        let digest = delivery_digest(&adapter_id, &msg.event);
        match storage.was_delivered(&adapter_id, &digest) {
            Ok(true) => {
                tracing::debug!(adapter = %adapter_id, digest = %digest, "suppressing duplicate delivery");
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                // Digest lookup failure must not stall delivery
                tracing::warn!(adapter = %adapter_id, error = %e, "delivery digest lookup failed");
            }
        }

        if !wait_for_ready(adapter.as_ref(), &config, &msg).await {
            tracing::warn!(
                adapter = %adapter_id,
                event = %msg.event.name(),
                "channel never became ready, dropping event for lane"
            );
            continue;
        }

        let result =
            tokio::time::timeout(config.call_timeout, adapter.on_event(&msg.event)).await;
        match result {
            Ok(Ok(())) => {
                if let Err(e) = storage.record_delivery(&adapter_id, &digest, chrono::Utc::now())
                {
                    tracing::warn!(adapter = %adapter_id, error = %e, "failed to persist delivery digest");
                }
            }
            Ok(Err(e)) => {
                tracing::error!(
                    adapter = %adapter_id,
                    event = %msg.event.name(),
                    error = %e,
                    "adapter delivery failed"
                );
                quarantined = note_failure(&mut failures, &config, &adapter_id) || quarantined;
            }
            Err(_) => {
                tracing::error!(
                    adapter = %adapter_id,
                    event = %msg.event.name(),
                    timeout_ms = config.call_timeout.as_millis() as u64,
                    "adapter delivery timed out"
                );
                quarantined = note_failure(&mut failures, &config, &adapter_id) || quarantined;
            }
        }
    }
}

/// Readiness gating: delivery to a non-origin adapter waits for the
/// session's channel with bounded backoff. Events without a session (e.g.
/// heartbeats) and origin-lane events skip the gate.
async fn wait_for_ready(
    adapter: &dyn UiAdapter,
    config: &LaneConfig,
    msg: &LaneMessage,
) -> bool {
    let Some(session_id) = msg.event.session_id() else {
        return true;
    };
    if msg.origin.as_deref() == Some(adapter.id()) {
        return true;
    }

    let mut backoff = Backoff::new(config.ready_backoff_base, config.ready_backoff_cap);
    loop {
        match adapter.channel_ready(session_id).await {
            Ok(true) => return true,
            Ok(false) => {}
            Err(e) => {
                tracing::debug!(adapter = %adapter.id(), error = %e, "readiness probe failed");
            }
        }
        if backoff.attempt() >= config.ready_attempts {
            return false;
        }
        tokio::time::sleep(backoff.next_delay()).await;
    }
}

/// Record a failure; returns true when the window crossed the quarantine
/// threshold.
fn note_failure(
    failures: &mut Vec<tokio::time::Instant>,
    config: &LaneConfig,
    adapter_id: &str,
) -> bool {
    let now = tokio::time::Instant::now();
    failures.push(now);
    failures.retain(|t| now.duration_since(*t) <= config.failure_window);
    if failures.len() as u32 >= config.quarantine_threshold {
        tracing::warn!(
            adapter = %adapter_id,
            failures = failures.len(),
            window_secs = config.failure_window.as_secs(),
            "lane quarantined until health check recovers"
        );
        true
    } else {
        false
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
