// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! S4: checkpoint precedence and the per-turn escape hatch.

use tc_engine::checkpoint::{compose, CheckpointOutcome, Evidence};

fn paths(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[test]
fn s4_daemon_plus_config_precedence() {
    let outcome = compose(&paths(&["daemon/foo.py", "config.yml"]), &[]);
    let CheckpointOutcome::Block { actions } = outcome else {
        panic!("expected a block");
    };

    // Exactly one runtime action, and it is the restart
    let restarts: Vec<usize> = actions
        .iter()
        .enumerate()
        .filter(|(_, a)| a.contains("restart service, then check status"))
        .map(|(i, _)| i)
        .collect();
    assert_eq!(restarts.len(), 1);
    let restart = restarts[0];

    let logs = actions.iter().position(|a| a.contains("logs")).unwrap();
    let tests = actions
        .iter()
        .position(|a| a.contains("targeted tests"))
        .unwrap();
    let commit = actions.iter().position(|a| a.contains("commit")).unwrap();

    assert!(restart < logs);
    assert!(logs < tests);
    assert!(tests < commit);

    // No duplicate strings
    let unique: std::collections::HashSet<&String> = actions.iter().collect();
    assert_eq!(unique.len(), actions.len());
}

#[test]
fn evidence_of_successful_restart_suppresses_it() {
    let outcome = compose(
        &paths(&["daemon/foo.py", "config.yml"]),
        &[Evidence::ok("tc daemon restart")],
    );
    let CheckpointOutcome::Block { actions } = outcome else {
        panic!("expected a block");
    };
    assert!(!actions.iter().any(|a| a.contains("restart service")));

    // A failed attempt is not evidence
    let outcome = compose(
        &paths(&["daemon/foo.py"]),
        &[Evidence::failed("tc daemon restart")],
    );
    let CheckpointOutcome::Block { actions } = outcome else {
        panic!("expected a block");
    };
    assert!(actions.iter().any(|a| a.contains("restart service")));
}

#[test]
fn clean_tree_produces_silence() {
    assert_eq!(compose(&[], &[]), CheckpointOutcome::Silence);
}
