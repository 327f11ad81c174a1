// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

#[test]
fn system_clock_is_monotonic_enough() {
    let clock = SystemClock;
    let a = clock.now();
    let b = clock.now();
    assert!(b >= a);
}

#[test]
fn fake_clock_advances() {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap();
    let clock = FakeClock::new(start);
    assert_eq!(clock.now(), start);

    clock.advance(Duration::seconds(90));
    assert_eq!(clock.now(), start + Duration::seconds(90));
}

#[test]
fn fake_clock_set_overrides() {
    let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().unwrap();
    let later = Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).single().unwrap();
    let clock = FakeClock::new(start);
    clock.set(later);
    assert_eq!(clock.now(), later);
}

#[test]
fn fake_clock_shared_across_clones() {
    let clock = FakeClock::default();
    let other = clock.clone();
    let before = other.now();
    clock.advance(Duration::minutes(5));
    assert_eq!(other.now(), before + Duration::minutes(5));
}
