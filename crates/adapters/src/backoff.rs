// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Exponential backoff with jitter.

use rand::Rng;
use std::time::Duration;

/// Capped exponential backoff. Each call to `next_delay` doubles the base
/// up to the cap and adds up to 25% jitter so retry storms decorrelate.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Attempts taken so far.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Delay before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let exp = self.attempt.min(16);
        self.attempt = self.attempt.saturating_add(1);
        let raw = self
            .base
            .saturating_mul(2u32.saturating_pow(exp))
            .min(self.cap);
        let jitter_budget = raw.as_millis() as u64 / 4;
        let jitter = if jitter_budget == 0 {
            0
        } else {
            rand::rng().random_range(0..=jitter_budget)
        };
        raw + Duration::from_millis(jitter)
    }
}

#[cfg(test)]
#[path = "backoff_tests.rs"]
mod tests;
