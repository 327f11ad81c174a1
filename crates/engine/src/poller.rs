// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-session output pollers.
//!
//! Each live session gets one worker that captures pane deltas on a 1 s
//! tick. The ONLY stop conditions are exit marker (completion), pane death,
//! and the max-poll safety net; idle is informational and never stops
//! polling. Pollers are independent and never share state across sessions.

use crate::bus::EventBus;
use crate::output_file::OutputFiles;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tc_core::{Clock, Event, OutputMode, Session, SessionId, SessionStatus};
use tc_mux::{ExitMarker, MuxAdapter};
use tc_storage::Storage;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Poller tuning.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay before the first capture.
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    /// Pane silence before the one-shot idle notification.
    pub idle_notification: Duration,
    /// Safety net: terminate after this many polls.
    pub max_polls: u32,
    /// Streaming-edit window after the poller starts; later deltas emit as
    /// chunked-sequential messages.
    pub streaming_window: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            idle_notification: Duration::from_secs(60),
            max_polls: 600,
            streaming_window: Duration::from_secs(8),
        }
    }
}

struct PollerShared {
    marker: Mutex<Option<ExitMarker>>,
    shutdown: Notify,
    /// Set before the pane is killed on explicit close, so the poller never
    /// misreads an intentional kill as external pane death.
    stopped: std::sync::atomic::AtomicBool,
}

/// Handle to a running poller.
pub struct PollerHandle {
    shared: Arc<PollerShared>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Arm the poller with the exit marker of the command just keyed in.
    pub fn set_marker(&self, marker: ExitMarker) {
        *self.shared.marker.lock() = Some(marker);
    }

    pub fn shutdown(&self) {
        self.shared
            .stopped
            .store(true, std::sync::atomic::Ordering::SeqCst);
        self.shared.shutdown.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Registry of live pollers, owned by the session manager.
#[derive(Clone, Default)]
pub struct PollerRegistry {
    map: Arc<Mutex<HashMap<SessionId, PollerHandle>>>,
}

impl PollerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Running poller for a session, pruning finished tasks.
    pub fn get(&self, session_id: &SessionId) -> bool {
        let mut map = self.map.lock();
        match map.get(session_id) {
            Some(handle) if !handle.is_finished() => true,
            Some(_) => {
                map.remove(session_id);
                false
            }
            None => false,
        }
    }

    pub fn set_marker(&self, session_id: &SessionId, marker: ExitMarker) {
        if let Some(handle) = self.map.lock().get(session_id) {
            handle.set_marker(marker);
        }
    }

    pub fn shutdown(&self, session_id: &SessionId) {
        if let Some(handle) = self.map.lock().remove(session_id) {
            handle.shutdown();
        }
    }

    pub fn shutdown_all(&self) {
        for (_, handle) in self.map.lock().drain() {
            handle.shutdown();
        }
    }

    pub fn len(&self) -> usize {
        self.map.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.lock().is_empty()
    }

    fn insert(&self, session_id: SessionId, handle: PollerHandle) {
        if let Some(old) = self.map.lock().insert(session_id, handle) {
            old.shutdown();
        }
    }

    /// Drop the registry entry for an exiting poller, but only if it still
    /// belongs to that poller (a replacement may have been registered).
    fn release(&self, session_id: &SessionId, shared: &Arc<PollerShared>) {
        let mut map = self.map.lock();
        if let Some(handle) = map.get(session_id) {
            if Arc::ptr_eq(&handle.shared, shared) {
                map.remove(session_id);
            }
        }
    }
}

pub(crate) struct PollerDeps<M: MuxAdapter, C: Clock> {
    pub mux: M,
    pub storage: Storage,
    pub bus: EventBus,
    pub outputs: OutputFiles,
    pub clock: C,
    pub config: PollerConfig,
}

/// Spawn a poller for a session and register it.
pub(crate) fn spawn_poller<M: MuxAdapter, C: Clock>(
    registry: &PollerRegistry,
    session: &Session,
    marker: Option<ExitMarker>,
    deps: PollerDeps<M, C>,
) {
    let shared = Arc::new(PollerShared {
        marker: Mutex::new(marker),
        shutdown: Notify::new(),
        stopped: std::sync::atomic::AtomicBool::new(false),
    });
    let task = tokio::spawn(poll_loop(
        session.id.clone(),
        session.mux_name.clone(),
        Arc::clone(&shared),
        registry.clone(),
        deps,
    ));
    registry.insert(session.id.clone(), PollerHandle { shared, task });
}

/// Digest over the tail of a delta, used to suppress duplicate emissions
/// from concurrent emitters.
fn tail_digest(text: &str) -> String {
    const TAIL: usize = 512;
    let tail = if text.len() > TAIL {
        // Respect char boundaries when slicing the tail
        let mut start = text.len() - TAIL;
        while start < text.len() && !text.is_char_boundary(start) {
            start += 1;
        }
        &text[start..]
    } else {
        text
    };
    let digest = Sha256::digest(tail.as_bytes());
    let mut out = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        use std::fmt::Write;
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[allow(clippy::too_many_lines)]
async fn poll_loop<M: MuxAdapter, C: Clock>(
    session_id: SessionId,
    mux_name: String,
    shared: Arc<PollerShared>,
    registry: PollerRegistry,
    deps: PollerDeps<M, C>,
) {
    let PollerDeps {
        mux,
        storage,
        bus,
        outputs,
        clock,
        config,
    } = deps;
    let short_id = session_id.short_id().to_string();

    tokio::time::sleep(config.initial_delay).await;

    let started = tokio::time::Instant::now();
    let mut cursor = 0u64;
    let mut polls = 0u32;
    let mut last_output = tokio::time::Instant::now();
    let mut idle_notified = false;
    let mut chunk = 0u32;
    let mut last_digest = String::new();
    // Accumulated output since the current marker was armed, for the
    // completion body.
    let mut accum = String::new();

    loop {
        tokio::select! {
            _ = shared.shutdown.notified() => {
                tracing::debug!(session = %short_id, "poller shut down");
                break;
            }
            _ = tokio::time::sleep(config.poll_interval) => {}
        }

        if shared.stopped.load(std::sync::atomic::Ordering::SeqCst) {
            tracing::debug!(session = %short_id, "poller shut down");
            break;
        }

        polls += 1;
        if polls > config.max_polls {
            tracing::info!(session = %short_id, polls, "poller reached max duration, stopping");
            break;
        }

        // Session death is a stop condition
        match mux.exists(&mux_name).await {
            Ok(true) => {}
            Ok(false) => {
                if shared.stopped.load(std::sync::atomic::Ordering::SeqCst) {
                    break;
                }
                tracing::info!(session = %short_id, "pane vanished, session died");
                let _ = storage.close_session(&session_id, SessionStatus::Failed, clock.now());
                let _ = storage.delete_ux_state(&session_id);
                outputs.delete(&short_id);
                bus.send(Event::SessionDied {
                    session_id: session_id.clone(),
                });
                break;
            }
            Err(e) => {
                tracing::warn!(session = %short_id, error = %e, "liveness probe failed");
                continue;
            }
        }

        let capture = match mux.capture(&mux_name, cursor).await {
            Ok(capture) => capture,
            Err(e) => {
                tracing::warn!(session = %short_id, error = %e, "capture failed");
                continue;
            }
        };
        cursor = capture.cursor;
        let delta = capture.text;
        let marker = shared.marker.lock().clone();

        if delta.is_empty() {
            // Idle is informational only; polling continues regardless.
            if !idle_notified && last_output.elapsed() >= config.idle_notification {
                idle_notified = true;
                set_status_and_notify(&storage, &bus, &session_id, SessionStatus::Idle, &clock);
            }
        } else {
            if idle_notified {
                // Resumption clears the idle notification
                idle_notified = false;
                set_status_and_notify(&storage, &bus, &session_id, SessionStatus::Active, &clock);
            }
            last_output = tokio::time::Instant::now();
            accum.push_str(&delta);
        }

        // Strip marker text before anything is exposed
        let visible = match &marker {
            Some(marker) => marker.strip(&delta),
            None => delta.clone(),
        };

        if !visible.is_empty() {
            if let Err(e) = outputs.append(&short_id, &visible) {
                tracing::warn!(session = %short_id, error = %e, "output file append failed");
            }

            let digest = tail_digest(&visible);
            if digest != last_digest {
                last_digest = digest.clone();
                let mode = if started.elapsed() <= config.streaming_window {
                    OutputMode::StreamingEdit
                } else {
                    OutputMode::ChunkedSequential
                };
                chunk += 1;
                bus.send(Event::OutputChanged {
                    session_id: session_id.clone(),
                    text: visible.clone(),
                    mode,
                    chunk: match mode {
                        OutputMode::StreamingEdit => None,
                        OutputMode::ChunkedSequential => Some(chunk),
                    },
                    digest,
                    at: clock.now(),
                });
            } else {
                tracing::debug!(session = %short_id, "suppressing duplicate output emission");
            }
        }

        // Completion detection: the PRIMARY and only normal stop condition
        if let Some(marker) = &marker {
            if let Some(exit_code) = marker.find_exit_code(&accum) {
                chunk += 1;
                bus.send(Event::OutputChanged {
                    session_id: session_id.clone(),
                    text: "[Output Complete]".to_string(),
                    mode: OutputMode::ChunkedSequential,
                    chunk: Some(chunk),
                    digest: tail_digest("[Output Complete]"),
                    at: clock.now(),
                });
                bus.send(Event::SessionCompleted {
                    session_id: session_id.clone(),
                    body: marker.strip(&accum),
                    exit_code: Some(exit_code),
                });
                tracing::info!(session = %short_id, exit_code, "command completed");
                break;
            }
        }
    }

    registry.release(&session_id, &shared);
}

fn set_status_and_notify<C: Clock>(
    storage: &Storage,
    bus: &EventBus,
    session_id: &SessionId,
    status: SessionStatus,
    clock: &C,
) {
    if let Err(e) = storage.update_session_status(session_id, status, clock.now()) {
        tracing::warn!(session = %session_id.short_id(), error = %e, "status update failed");
        return;
    }
    match storage.get_session(session_id) {
        Ok(Some(session)) => bus.send(Event::SessionUpdated { session }),
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(session = %session_id.short_id(), error = %e, "session reload failed");
        }
    }
}

#[cfg(test)]
#[path = "poller_tests.rs"]
mod tests;
