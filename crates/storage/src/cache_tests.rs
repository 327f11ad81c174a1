// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::db::Storage;

fn storage() -> Storage {
    Storage::open_in_memory().unwrap()
}

#[test]
fn put_get_replace_roundtrip() {
    let storage = storage();
    let now = Utc::now();
    let snapshot = serde_json::json!({"status": "active", "title": null});
    storage.put_snapshot("session", "abc", &snapshot, now).unwrap();
    assert_eq!(
        storage.get_snapshot("session", "abc").unwrap(),
        Some(snapshot)
    );

    let replaced = serde_json::json!({"status": "closed"});
    storage
        .put_snapshot("session", "abc", &replaced, now)
        .unwrap();
    assert_eq!(
        storage.get_snapshot("session", "abc").unwrap(),
        Some(replaced)
    );
}

#[test]
fn kinds_are_partitioned() {
    let storage = storage();
    let now = Utc::now();
    storage
        .put_snapshot("session", "abc", &serde_json::json!(1), now)
        .unwrap();
    storage
        .put_snapshot("computer", "abc", &serde_json::json!(2), now)
        .unwrap();

    assert_eq!(
        storage.get_snapshot("session", "abc").unwrap(),
        Some(serde_json::json!(1))
    );
    let sessions = storage.list_snapshots("session").unwrap();
    assert_eq!(sessions.len(), 1);
}

#[test]
fn list_is_ordered_by_entity_id() {
    let storage = storage();
    let now = Utc::now();
    for id in ["charlie", "alpha", "bravo"] {
        storage
            .put_snapshot("session", id, &serde_json::json!({}), now)
            .unwrap();
    }
    let ids: Vec<String> = storage
        .list_snapshots("session")
        .unwrap()
        .into_iter()
        .map(|(id, _)| id)
        .collect();
    assert_eq!(ids, vec!["alpha", "bravo", "charlie"]);
}

#[test]
fn delete_and_truncate() {
    let storage = storage();
    let now = Utc::now();
    storage
        .put_snapshot("session", "abc", &serde_json::json!({}), now)
        .unwrap();
    storage
        .put_snapshot("session", "def", &serde_json::json!({}), now)
        .unwrap();

    storage.delete_snapshot("session", "abc").unwrap();
    assert!(storage.get_snapshot("session", "abc").unwrap().is_none());

    assert_eq!(storage.truncate_snapshots().unwrap(), 1);
    assert!(storage.list_snapshots("session").unwrap().is_empty());
}
