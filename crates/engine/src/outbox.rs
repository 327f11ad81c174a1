// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook-outbox processor.
//!
//! The receiver inserts pending rows and (for hook responses that must
//! block) processes its own row synchronously via `process_hook_now`. The
//! background drain picks up everything else - rows left behind by crashes,
//! re-queued expired locks - so every hook is processed at least once, with
//! at most one duplicate `processing` attempt after a crash.

use crate::coordinator::{AgentCoordinator, CheckpointBlock, WorkingTree};
use crate::error::EngineError;
use std::time::Duration;
use tc_core::{Clock, HookEvent};
use tc_mux::MuxAdapter;
use tc_storage::{OutboxEntry, Storage};

/// Outbox processor tuning.
#[derive(Debug, Clone)]
pub struct OutboxConfig {
    /// Row-claim lock lifetime; expired locks are re-queued by the watchdog.
    pub lock_ttl: Duration,
    /// Poll interval while the outbox is empty.
    pub drain_interval: Duration,
    /// Watchdog sweep interval.
    pub watchdog_interval: Duration,
}

impl Default for OutboxConfig {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(30),
            drain_interval: Duration::from_millis(250),
            watchdog_interval: Duration::from_secs(5),
        }
    }
}

/// Claims outbox rows and routes them to the coordinator.
#[derive(Clone)]
pub struct OutboxProcessor<M: MuxAdapter, C: Clock, W: WorkingTree> {
    storage: Storage,
    coordinator: AgentCoordinator<M, C, W>,
    clock: C,
    config: OutboxConfig,
}

impl<M: MuxAdapter, C: Clock, W: WorkingTree> OutboxProcessor<M, C, W> {
    pub fn new(
        storage: Storage,
        coordinator: AgentCoordinator<M, C, W>,
        clock: C,
        config: OutboxConfig,
    ) -> Self {
        Self {
            storage,
            coordinator,
            clock,
            config,
        }
    }

    /// Durably accept a validated hook. Insert failure is a durability
    /// error the caller must observe.
    pub fn receive(&self, hook: &HookEvent) -> Result<i64, EngineError> {
        Ok(self.storage.insert_hook(hook)?)
    }

    /// Process a just-inserted row synchronously (hook responses that may
    /// carry a block payload need the answer before the socket replies).
    /// Returns `None` when another processor already claimed the row.
    pub async fn process_hook_now(
        &self,
        id: i64,
    ) -> Result<Option<CheckpointBlock>, EngineError> {
        let token = uuid::Uuid::new_v4().to_string();
        let expiry = self.clock.now()
            + chrono::Duration::from_std(self.config.lock_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(30));
        let Some(entry) = self.storage.claim_hook(id, &token, expiry)? else {
            return Ok(None);
        };
        self.process_entry(entry, &token).await
    }

    /// Background drain + watchdog. Runs until `shutdown` flips true.
    pub async fn run(&self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut watchdog = tokio::time::interval(self.config.watchdog_interval);
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = watchdog.tick() => {
                    if let Err(e) = self.storage.requeue_expired_hooks(self.clock.now()) {
                        tracing::error!(error = %e, "outbox watchdog sweep failed");
                    }
                }
                _ = shutdown.changed() => continue,
                _ = tokio::time::sleep(self.config.drain_interval) => {
                    self.drain_once().await;
                }
            }
        }
        // Final flush on shutdown
        self.drain_once().await;
    }

    /// Claim and process rows until the outbox is empty.
    pub async fn drain_once(&self) {
        loop {
            let token = uuid::Uuid::new_v4().to_string();
            let expiry = self.clock.now()
                + chrono::Duration::from_std(self.config.lock_ttl)
                    .unwrap_or_else(|_| chrono::Duration::seconds(30));
            let entry = match self.storage.claim_next_hook(&token, expiry) {
                Ok(Some(entry)) => entry,
                Ok(None) => return,
                Err(e) => {
                    tracing::error!(error = %e, "outbox claim failed");
                    return;
                }
            };
            if let Err(e) = self.process_entry(entry, &token).await {
                tracing::error!(error = %e, "outbox processing failed");
            }
        }
    }

    async fn process_entry(
        &self,
        entry: OutboxEntry,
        token: &str,
    ) -> Result<Option<CheckpointBlock>, EngineError> {
        let block = match self.coordinator.handle_hook(&entry.hook).await {
            Ok(block) => block,
            Err(e) => {
                // Leave the row processing; the watchdog re-queues it after
                // the lock expires (fail-open recovery, at-least-once).
                tracing::error!(
                    outbox_id = entry.id,
                    kind = entry.hook.kind.as_str(),
                    error = %e,
                    "hook routing failed, leaving row for watchdog"
                );
                return Err(e);
            }
        };

        if !self.storage.mark_hook_delivered(entry.id, token)? {
            // Lock was reclaimed while we processed; the other processor
            // owns delivery now. Our side effects were idempotent-by-digest
            // downstream, so just drop the block payload.
            tracing::warn!(outbox_id = entry.id, "outbox lock lost during processing");
            return Ok(None);
        }
        Ok(block)
    }
}

#[cfg(test)]
#[path = "outbox_tests.rs"]
mod tests;
