// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment-variable knobs for operational tuning.

use std::time::Duration;

fn duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Override for the session-death sweep interval (`TC_SWEEP_MS`).
pub fn sweep_interval() -> Duration {
    duration_ms("TC_SWEEP_MS").unwrap_or(Duration::from_secs(30))
}

/// Override for the queue/outbox prune interval (`TC_PRUNE_MS`).
pub fn prune_interval() -> Duration {
    duration_ms("TC_PRUNE_MS").unwrap_or(Duration::from_secs(3600))
}

/// Age after which terminal queue/outbox rows and delivery digests are
/// pruned (`TC_PRUNE_AGE_HOURS`).
pub fn prune_age() -> chrono::Duration {
    let hours = std::env::var("TC_PRUNE_AGE_HOURS")
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .unwrap_or(72);
    chrono::Duration::hours(hours)
}

/// State directory override (`TC_STATE_DIR`), mainly for tests.
pub fn state_dir_override() -> Option<std::path::PathBuf> {
    std::env::var("TC_STATE_DIR").ok().map(Into::into)
}
