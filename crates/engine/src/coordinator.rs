// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent coordinator.
//!
//! Routes lifecycle hooks to in-memory listeners and the event bus, and
//! owns checkpoint injection at agent-stop boundaries. The listener
//! registry is not persisted: callers re-register after a daemon restart.
//! Checkpoint decisions persist to survive restarts; a DB failure on that
//! path fails OPEN (no block), since blocking is guidance, not safety.

use crate::bus::EventBus;
use crate::checkpoint::{self, CheckpointOutcome, Evidence};
use crate::error::EngineError;
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tc_core::{AgentKind, Clock, Event, HookEvent, HookKind, SessionId};
use tc_mux::MuxAdapter;
use tc_storage::Storage;
use tokio::sync::{mpsc, oneshot};

/// A blocking checkpoint payload. For native-hook agents it is returned as
/// a structured block response to the stop hook; for terminal-injection
/// agents it has already been keyed into the pane by the time the hook
/// response goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointBlock {
    pub message: String,
}

/// Working-tree inspection seam (git in production, scripted in tests).
#[async_trait]
pub trait WorkingTree: Send + Sync + 'static {
    /// Uncommitted file paths, as `git diff --name-only HEAD` reports them.
    async fn changed_paths(&self, cwd: &Path) -> std::io::Result<Vec<String>>;
}

/// `git diff --name-only HEAD` against the session's working directory.
#[derive(Clone, Default)]
pub struct GitWorkingTree;

#[async_trait]
impl WorkingTree for GitWorkingTree {
    async fn changed_paths(&self, cwd: &Path) -> std::io::Result<Vec<String>> {
        let output = tokio::process::Command::new("git")
            .args(["diff", "--name-only", "HEAD"])
            .current_dir(cwd)
            .output()
            .await?;
        if !output.status.success() {
            // Not a repository (or no HEAD yet): nothing to checkpoint
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

#[derive(Default)]
struct TurnState {
    turn_id: String,
    evidence: Vec<Evidence>,
}

/// One-shot stop waiters and per-session subscribers.
#[derive(Default)]
struct Listeners {
    stop_waiters: Mutex<HashMap<SessionId, Vec<oneshot::Sender<()>>>>,
    subscribers: RwLock<HashMap<SessionId, Vec<mpsc::Sender<Event>>>>,
}

/// Coordinates hook events: routing, turn tracking, checkpoint injection.
#[derive(Clone)]
pub struct AgentCoordinator<M: MuxAdapter, C: Clock, W: WorkingTree> {
    storage: Storage,
    bus: EventBus,
    mux: M,
    clock: C,
    working_tree: Arc<W>,
    listeners: Arc<Listeners>,
    turns: Arc<Mutex<HashMap<SessionId, TurnState>>>,
}

impl<M: MuxAdapter, C: Clock, W: WorkingTree> AgentCoordinator<M, C, W> {
    pub fn new(storage: Storage, bus: EventBus, mux: M, clock: C, working_tree: W) -> Self {
        Self {
            storage,
            bus,
            mux,
            clock,
            working_tree: Arc::new(working_tree),
            listeners: Arc::new(Listeners::default()),
            turns: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a one-shot waiter resolved at the session's next stop hook.
    pub fn wait_for_stop(&self, session_id: &SessionId) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        self.listeners
            .stop_waiters
            .lock()
            .entry(session_id.clone())
            .or_default()
            .push(tx);
        rx
    }

    /// Subscribe to all hook-driven events for a session.
    pub fn subscribe(&self, session_id: &SessionId) -> mpsc::Receiver<Event> {
        let (tx, rx) = mpsc::channel(64);
        self.listeners
            .subscribers
            .write()
            .entry(session_id.clone())
            .or_default()
            .push(tx);
        rx
    }

    /// Drop a session's listeners (close / death cleanup).
    pub fn clear_listeners(&self, session_id: &SessionId) {
        self.listeners.stop_waiters.lock().remove(session_id);
        self.listeners.subscribers.write().remove(session_id);
    }

    /// Handle one hook event from the outbox processor.
    ///
    /// Returns the block payload when this is a stop hook of a native-hook
    /// agent that must be blocked this turn.
    pub async fn handle_hook(
        &self,
        hook: &HookEvent,
    ) -> Result<Option<CheckpointBlock>, EngineError> {
        let event = Event::AgentActivity {
            session_id: hook.session_id.clone(),
            agent: hook.agent,
            kind: hook.kind.activity_kind(),
            tool_name: hook.tool_name.clone(),
            preview: hook.preview.clone(),
            summary: hook.summary.clone(),
            at: hook.at,
        };
        self.bus.send(event.clone());
        self.notify_subscribers(&hook.session_id, event);
        self.track_turn(hook);

        if hook.kind != HookKind::Stop {
            return Ok(None);
        }

        self.fire_stop_waiters(&hook.session_id);
        Ok(self.checkpoint_at_stop(hook).await)
    }

    fn notify_subscribers(&self, session_id: &SessionId, event: Event) {
        let subscribers = self.listeners.subscribers.read();
        let Some(senders) = subscribers.get(session_id) else {
            return;
        };
        for sender in senders {
            // Deliver synchronously into the in-memory registry; slow or
            // gone subscribers are skipped, not awaited.
            let _ = sender.try_send(event.clone());
        }
    }

    fn fire_stop_waiters(&self, session_id: &SessionId) {
        if let Some(waiters) = self.listeners.stop_waiters.lock().remove(session_id) {
            for waiter in waiters {
                let _ = waiter.send(());
            }
        }
    }

    fn track_turn(&self, hook: &HookEvent) {
        let mut turns = self.turns.lock();
        match hook.kind {
            HookKind::UserPromptSubmit => {
                turns.insert(
                    hook.session_id.clone(),
                    TurnState {
                        turn_id: uuid::Uuid::new_v4().to_string(),
                        evidence: Vec::new(),
                    },
                );
            }
            HookKind::PostToolUse => {
                if let (Some(preview), Some(turn)) =
                    (&hook.preview, turns.get_mut(&hook.session_id))
                {
                    turn.evidence.push(Evidence {
                        command: preview.clone(),
                        ok: hook.tool_ok.unwrap_or(false),
                    });
                }
            }
            HookKind::PreToolUse | HookKind::Stop => {}
        }
    }

    /// Checkpoint decision at an agent-stop boundary.
    async fn checkpoint_at_stop(&self, hook: &HookEvent) -> Option<CheckpointBlock> {
        let session_id = &hook.session_id;

        // A stop triggered by our own block response always passes through
        if hook.stop_hook_active {
            tracing::debug!(session = %session_id.short_id(), "stop_hook_active, passing through");
            return None;
        }

        let (turn_id, evidence) = {
            let turns = self.turns.lock();
            match turns.get(session_id) {
                Some(turn) => (turn.turn_id.clone(), turn.evidence.clone()),
                // No prompt observed this boot; a stable placeholder keeps
                // the escape hatch working across restarts.
                None => (format!("boot:{}", session_id.short_id()), Vec::new()),
            }
        };

        // Escape hatch: the first stop of a turn decides; every later stop
        // in the same turn passes through unconditionally, even when the
        // first decision was silence and the tree has since gone dirty.
        // Persisted so the guarantee survives daemon restarts; lookup
        // failure fails open.
        match self.storage.get_checkpoint_decision(session_id) {
            Ok(Some((last_turn, _))) if last_turn == turn_id => {
                tracing::info!(
                    session = %session_id.short_id(),
                    turn = %turn_id,
                    "repeat stop this turn, passing through"
                );
                return None;
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(
                    session = %session_id.short_id(),
                    error = %e,
                    "checkpoint state lookup failed, failing open"
                );
                return None;
            }
        }

        let session = match self.storage.get_session(session_id) {
            Ok(Some(session)) => session,
            Ok(None) => {
                tracing::warn!(session = %session_id.short_id(), "stop hook for unknown session");
                return None;
            }
            Err(e) => {
                tracing::warn!(session = %session_id.short_id(), error = %e, "session lookup failed, failing open");
                return None;
            }
        };

        let paths = match self.working_tree.changed_paths(&session.cwd).await {
            Ok(paths) => paths,
            Err(e) => {
                tracing::warn!(
                    session = %session_id.short_id(),
                    error = %e,
                    "working tree inspection failed, failing open"
                );
                return None;
            }
        };

        let outcome = checkpoint::compose(&paths, &evidence);
        let blocked = outcome.is_block();

        // Persist the decision BEFORE delivering: if this write fails the
        // at-most-one-block guarantee is gone, so fail open.
        if let Err(e) =
            self.storage
                .set_checkpoint_decision(session_id, &turn_id, blocked, self.clock.now())
        {
            tracing::warn!(
                session = %session_id.short_id(),
                error = %e,
                "checkpoint decision persist failed, failing open"
            );
            return None;
        }

        let CheckpointOutcome::Block { .. } = outcome else {
            return None;
        };
        let Some(message) = outcome.message() else {
            return None;
        };

        tracing::info!(
            session = %session_id.short_id(),
            turn = %turn_id,
            files = paths.len(),
            "checkpoint block issued"
        );

        if uses_native_hooks(session.agent) {
            // Structured block response travels back through the hook
            Some(CheckpointBlock { message })
        } else {
            // Terminal-injection agents get the guidance keyed into the pane
            if let Err(e) = self.mux.send_keys(&session.mux_name, &message, false).await {
                tracing::warn!(
                    session = %session_id.short_id(),
                    error = %e,
                    "checkpoint injection failed"
                );
            }
            None
        }
    }
}

/// Whether checkpoint payloads travel as structured hook responses (native)
/// or by keying into the pane (terminal injection).
fn uses_native_hooks(agent: AgentKind) -> bool {
    matches!(agent, AgentKind::Claude)
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
