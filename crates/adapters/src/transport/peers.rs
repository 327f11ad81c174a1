// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TTL-expiring peer registry mirror.
//!
//! The broker holds the authoritative `registry:{computer}` keys; this
//! in-memory mirror is refreshed by observed heartbeats and backs peer
//! listings without a broker round-trip.

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tc_core::Clock;

/// A known peer computer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerInfo {
    pub name: String,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// In-memory peer registry with TTL-based expiry.
#[derive(Clone)]
pub struct PeerRegistry<C: Clock> {
    entries: Arc<RwLock<HashMap<String, PeerInfo>>>,
    ttl: Duration,
    clock: C,
}

impl<C: Clock> PeerRegistry<C> {
    pub fn new(ttl: Duration, clock: C) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
            clock,
        }
    }

    /// Record a heartbeat, refreshing the peer's TTL.
    pub fn observe_heartbeat(&self, name: &str, capabilities: Vec<String>) {
        let mut entries = self.entries.write();
        entries.insert(
            name.to_string(),
            PeerInfo {
                name: name.to_string(),
                last_heartbeat: self.clock.now(),
                capabilities,
            },
        );
    }

    /// Whether a peer's heartbeat is within the TTL.
    pub fn alive(&self, name: &str) -> bool {
        let now = self.clock.now();
        self.entries
            .read()
            .get(name)
            .map(|peer| now - peer.last_heartbeat <= self.ttl)
            .unwrap_or(false)
    }

    /// All peers with live heartbeats, sorted by name.
    pub fn list_alive(&self) -> Vec<PeerInfo> {
        let now = self.clock.now();
        let mut peers: Vec<PeerInfo> = self
            .entries
            .read()
            .values()
            .filter(|peer| now - peer.last_heartbeat <= self.ttl)
            .cloned()
            .collect();
        peers.sort_by(|a, b| a.name.cmp(&b.name));
        peers
    }

    /// Drop expired entries; returns how many were removed.
    pub fn prune(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, peer| now - peer.last_heartbeat <= self.ttl);
        before - entries.len()
    }
}

#[cfg(test)]
#[path = "peers_tests.rs"]
mod tests;
