// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashMap;

crate::define_id! {
    /// Test ID type for macro verification.
    pub struct TestId;
}

#[test]
fn define_id_new_and_as_str() {
    let id = TestId::new("abc");
    assert_eq!(id.as_str(), "abc");
}

#[test]
fn define_id_display() {
    let id = TestId::new("hello");
    assert_eq!(id.to_string(), "hello");
}

#[test]
fn define_id_from_string_and_str() {
    let owned: TestId = String::from("owned").into();
    let borrowed: TestId = "borrowed".into();
    assert_eq!(owned.as_str(), "owned");
    assert_eq!(borrowed.as_str(), "borrowed");
}

#[test]
fn define_id_partial_eq_str() {
    let id = TestId::new("test");
    assert_eq!(id, "test");
}

#[test]
fn define_id_hash_map_lookup() {
    let mut map = HashMap::new();
    map.insert(TestId::new("k"), 42);
    assert_eq!(map.get("k"), Some(&42));
}

#[test]
fn define_id_serde_roundtrip() {
    let id = TestId::new("serde-test");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"serde-test\"");
    let back: TestId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn define_id_short_truncates() {
    let id = TestId::new("abcdefghijklmnop");
    assert_eq!(id.short(8), "abcdefgh");
    assert_eq!(TestId::new("abc").short(8), "abc");
    assert_eq!(TestId::new("abcdefgh").short(8), "abcdefgh");
}

#[test]
fn message_id_is_a_defined_id() {
    let id = MessageId::new("m-123");
    assert_eq!(id.as_str(), "m-123");
    assert_eq!(id.to_string(), "m-123");
}
