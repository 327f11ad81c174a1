// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot cache.
//!
//! Event-driven materialized view over persistence. Handlers fold domain
//! events into per-entity JSON snapshots; subscribers get (kind, id)
//! notifications after each write. The cache is never the source of truth:
//! truncate + warm-up (or rebuild on read) reproduces the same observable
//! state from the primary tables. Applies happen on the daemon event loop,
//! so per-entity updates are inherently serialized in emit order.

use crate::error::EngineError;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::Arc;
use tc_core::{Clock, Event, Session, SessionId};
use tc_storage::Storage;
use tokio::sync::mpsc;

/// Entity kinds materialized in the cache.
pub const KIND_SESSION: &str = "session";
pub const KIND_COMPUTER: &str = "computer";
pub const KIND_TODO: &str = "todo";

/// Longest output tail kept on a session snapshot.
const OUTPUT_TAIL_CHARS: usize = 500;

/// Event-driven read-through cache.
#[derive(Clone)]
pub struct SnapshotCache<C: Clock> {
    storage: Storage,
    clock: C,
    subscribers: Arc<RwLock<Vec<mpsc::Sender<(String, String)>>>>,
}

impl<C: Clock> SnapshotCache<C> {
    pub fn new(storage: Storage, clock: C) -> Self {
        Self {
            storage,
            clock,
            subscribers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Receive (entity_kind, entity_id) notifications after each write.
    pub fn subscribe(&self) -> mpsc::Receiver<(String, String)> {
        let (tx, rx) = mpsc::channel(256);
        self.subscribers.write().push(tx);
        rx
    }

    /// Warm the cache from primary tables at startup. Returns snapshots
    /// written.
    pub fn warm(&self) -> Result<usize, EngineError> {
        let sessions = self.storage.list_sessions(true)?;
        let count = sessions.len();
        for session in sessions {
            self.put(
                KIND_SESSION,
                session.id.as_str(),
                session_snapshot(&session),
            );
        }
        tracing::info!(snapshots = count, "snapshot cache warmed");
        Ok(count)
    }

    /// Strictly read-only cache read. A stale value is acceptable;
    /// responsiveness beats freshness.
    pub fn get(&self, kind: &str, id: &str) -> Result<Option<Value>, EngineError> {
        Ok(self.storage.get_snapshot(kind, id)?)
    }

    pub fn list(&self, kind: &str) -> Result<Vec<(String, Value)>, EngineError> {
        Ok(self.storage.list_snapshots(kind)?)
    }

    /// Read-through session lookup: a miss rebuilds the snapshot from the
    /// primary table.
    pub fn get_session(&self, id: &SessionId) -> Result<Option<Value>, EngineError> {
        if let Some(snapshot) = self.storage.get_snapshot(KIND_SESSION, id.as_str())? {
            return Ok(Some(snapshot));
        }
        let Some(session) = self.storage.get_session(id)? else {
            return Ok(None);
        };
        let snapshot = session_snapshot(&session);
        self.put(KIND_SESSION, id.as_str(), snapshot.clone());
        Ok(Some(snapshot))
    }

    /// Origin adapter of a session, for fan-out readiness gating.
    pub fn session_origin(&self, id: &SessionId) -> Option<String> {
        self.get_session(id)
            .ok()
            .flatten()
            .and_then(|snapshot| {
                snapshot
                    .get("origin")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
            })
    }

    /// Fold one domain event into the cache. Cache write failures are
    /// logged, never propagated: the primary store already holds truth.
    pub fn apply(&self, event: &Event) {
        match event {
            Event::SessionStarted { session } | Event::SessionUpdated { session } => {
                self.put(
                    KIND_SESSION,
                    session.id.as_str(),
                    session_snapshot(session),
                );
            }
            Event::SessionClosed { session_id } => {
                self.merge(
                    KIND_SESSION,
                    session_id.as_str(),
                    json!({ "status": "closed" }),
                );
            }
            Event::SessionDied { session_id } => {
                self.merge(
                    KIND_SESSION,
                    session_id.as_str(),
                    json!({ "status": "failed" }),
                );
            }
            Event::OutputChanged {
                session_id,
                text,
                at,
                ..
            } => {
                self.merge(
                    KIND_SESSION,
                    session_id.as_str(),
                    json!({
                        "last_output": tail(text, OUTPUT_TAIL_CHARS),
                        "last_output_at": at.to_rfc3339(),
                    }),
                );
            }
            Event::SessionCompleted {
                session_id,
                exit_code,
                ..
            } => {
                self.merge(
                    KIND_SESSION,
                    session_id.as_str(),
                    json!({ "last_exit_code": exit_code }),
                );
            }
            Event::AgentActivity {
                session_id,
                kind,
                tool_name,
                at,
                ..
            } => {
                self.merge(
                    KIND_SESSION,
                    session_id.as_str(),
                    json!({
                        "last_agent_activity": {
                            "kind": kind,
                            "tool_name": tool_name,
                            "at": at.to_rfc3339(),
                        }
                    }),
                );
            }
            Event::ComputerHeartbeat { computer, at } => {
                self.put(
                    KIND_COMPUTER,
                    computer,
                    json!({
                        "name": computer,
                        "last_heartbeat": at.to_rfc3339(),
                    }),
                );
            }
            Event::TodoChanged {
                session_id,
                change,
                todo,
            } => {
                self.put(
                    KIND_TODO,
                    session_id.as_str(),
                    json!({ "change": change, "todo": todo }),
                );
            }
        }
    }

    fn put(&self, kind: &str, id: &str, snapshot: Value) {
        if let Err(e) = self
            .storage
            .put_snapshot(kind, id, &snapshot, self.clock.now())
        {
            tracing::error!(kind, id, error = %e, "snapshot write failed");
            return;
        }
        self.notify(kind, id);
    }

    /// Merge object keys into the existing snapshot (missing rows start
    /// from the merge value alone).
    fn merge(&self, kind: &str, id: &str, patch: Value) {
        let base = self.storage.get_snapshot(kind, id).ok().flatten();
        let merged = match (base, &patch) {
            (Some(Value::Object(mut base)), Value::Object(patch_map)) => {
                for (key, value) in patch_map {
                    base.insert(key.clone(), value.clone());
                }
                Value::Object(base)
            }
            _ => patch,
        };
        self.put(kind, id, merged);
    }

    fn notify(&self, kind: &str, id: &str) {
        let mut stale = false;
        {
            let subscribers = self.subscribers.read();
            for sender in subscribers.iter() {
                if sender
                    .try_send((kind.to_string(), id.to_string()))
                    .is_err()
                {
                    stale = true;
                }
            }
        }
        if stale {
            // Drop closed subscribers so the list does not grow unbounded
            self.subscribers.write().retain(|s| !s.is_closed());
        }
    }
}

/// Canonical session snapshot produced by warm-up, read-through rebuild,
/// and SessionStarted/Updated handlers alike (invariant: rebuild equals
/// replay for these fields).
pub fn session_snapshot(session: &Session) -> Value {
    json!({
        "id": session.id.as_str(),
        "short_id": session.short_id(),
        "mux_name": session.mux_name,
        "cwd": session.cwd,
        "agent": session.agent,
        "mode": session.mode,
        "title": session.title,
        "status": session.status,
        "origin": session.origin,
        "computer": session.computer,
        "created_at": session.created_at.to_rfc3339(),
        "last_activity_at": session.last_activity_at.to_rfc3339(),
        "closed_at": session.closed_at.map(|t| t.to_rfc3339()),
    })
}

fn tail(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        text.to_string()
    } else {
        text.chars().skip(count - max_chars).collect()
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
