// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory event bus.
//!
//! Producers (session manager, pollers, coordinator, transport) push domain
//! events; the daemon loop drains them in order and routes each to the
//! adapter client and the snapshot cache. Durability lives in the SQLite
//! queue and outbox, not here: replaying chat deliveries after a restart
//! would be wrong, and the persisted delivery digests already cover the
//! crash window.

use tc_core::Event;
use tokio::sync::mpsc;

/// Bounded bus capacity. The daemon loop is a fast consumer; hitting this
/// bound means something is badly stuck, so senders log and drop.
const BUS_DEPTH: usize = 1024;

/// Sending half of the event bus. Clones share the channel.
#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

/// Receiving half, held by the daemon loop.
pub struct EventReader {
    rx: mpsc::Receiver<Event>,
}

impl EventBus {
    pub fn new() -> (Self, EventReader) {
        let (tx, rx) = mpsc::channel(BUS_DEPTH);
        (Self { tx }, EventReader { rx })
    }

    /// Emit an event. Never blocks the emitter; a full bus drops with an
    /// error log so pollers and workers cannot deadlock on the loop.
    pub fn send(&self, event: Event) {
        if let Err(e) = self.tx.try_send(event) {
            match e {
                mpsc::error::TrySendError::Full(event) => {
                    tracing::error!(event = %event.name(), "event bus full, dropping event");
                }
                mpsc::error::TrySendError::Closed(event) => {
                    tracing::debug!(event = %event.name(), "event bus closed, dropping event");
                }
            }
        }
    }
}

impl EventReader {
    /// Next event, in emission order. `None` after all senders dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Non-blocking drain used by tests and shutdown.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
