// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn delays_grow_exponentially_up_to_cap() {
    let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(2));
    let first = backoff.next_delay();
    let second = backoff.next_delay();
    let third = backoff.next_delay();

    // Jitter adds at most 25%
    assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(125));
    assert!(second >= Duration::from_millis(200) && second <= Duration::from_millis(250));
    assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(500));
}

#[test]
fn cap_bounds_the_raw_delay() {
    let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_secs(1));
    for _ in 0..10 {
        let delay = backoff.next_delay();
        // cap + 25% jitter ceiling
        assert!(delay <= Duration::from_millis(1250));
    }
}

#[test]
fn reset_starts_over() {
    let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_secs(2));
    backoff.next_delay();
    backoff.next_delay();
    assert_eq!(backoff.attempt(), 2);

    backoff.reset();
    assert_eq!(backoff.attempt(), 0);
    let delay = backoff.next_delay();
    assert!(delay <= Duration::from_millis(125));
}

#[test]
fn huge_attempt_counts_do_not_overflow() {
    let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(30));
    for _ in 0..100 {
        let delay = backoff.next_delay();
        assert!(delay <= Duration::from_millis(37_500));
    }
}
