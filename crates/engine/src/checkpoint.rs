// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkpoint engine.
//!
//! Pure policy: given the uncommitted file paths of a working tree (and
//! evidence of commands already run this turn), compose the turn-boundary
//! guidance block. Category mapping is first-match ordered; actions emit in
//! fixed execution precedence and are deduplicated. The engine never
//! executes anything itself; test enforcement belongs to pre-commit hooks.

use std::collections::HashSet;
use std::path::Path;

/// File categories, first-match ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileCategory {
    /// Daemon source.
    Daemon,
    /// Hook runtime shipped into agent homes.
    HookRuntime,
    /// TUI source.
    Tui,
    /// Installer / setup tooling.
    Setup,
    /// Test code.
    Tests,
    /// Agent artifacts (skills, agent definitions, memory files).
    AgentArtifacts,
    /// Configuration files.
    Config,
    /// Docs, todos, ideas, and other markdown.
    Docs,
}

/// Map one path to its category. The first pattern that matches wins.
pub fn categorize(path: &str) -> FileCategory {
    let normalized = path.trim_start_matches("./");
    if normalized.starts_with("daemon/") {
        return FileCategory::Daemon;
    }
    if normalized.starts_with("hooks/") {
        return FileCategory::HookRuntime;
    }
    if normalized.starts_with("tui/") {
        return FileCategory::Tui;
    }
    if normalized.starts_with("setup/") {
        return FileCategory::Setup;
    }
    if normalized.starts_with("tests/") {
        return FileCategory::Tests;
    }
    if normalized.starts_with(".claude/") || normalized.starts_with("agents/") {
        return FileCategory::AgentArtifacts;
    }
    let name = Path::new(normalized)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if name.starts_with("config.")
        || name.ends_with(".toml")
        || name.ends_with(".yml")
        || name.ends_with(".yaml")
    {
        return FileCategory::Config;
    }
    if normalized.starts_with("docs/")
        || normalized.starts_with("todos/")
        || normalized.starts_with("ideas/")
        || name.ends_with(".md")
    {
        return FileCategory::Docs;
    }
    // Anything unrecognized is treated as daemon code: the safe default is
    // the full restart+log+test guidance.
    FileCategory::Daemon
}

/// Evidence that a command already ran this turn. A successful run with a
/// matching prefix suppresses the corresponding action; failed attempts do
/// not count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evidence {
    pub command: String,
    pub ok: bool,
}

impl Evidence {
    pub fn ok(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
        }
    }

    pub fn failed(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: false,
        }
    }
}

/// Result of a checkpoint evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckpointOutcome {
    /// Nothing to say: clean tree.
    Silence,
    /// Block the turn with ordered guidance.
    Block { actions: Vec<String> },
}

impl CheckpointOutcome {
    pub fn is_block(&self) -> bool {
        matches!(self, CheckpointOutcome::Block { .. })
    }

    /// Render the block message keyed into panes / returned to hooks.
    pub fn message(&self) -> Option<String> {
        match self {
            CheckpointOutcome::Silence => None,
            CheckpointOutcome::Block { actions } => {
                let mut message =
                    String::from("Before finishing this turn, complete the checkpoint:\n");
                for (i, action) in actions.iter().enumerate() {
                    use std::fmt::Write;
                    let _ = write!(message, "{}. {}\n", i + 1, action);
                }
                Some(message)
            }
        }
    }
}

/// An action with its evidence prefix: a successful same-turn command
/// starting with the prefix suppresses the action.
struct ActionSpec {
    text: &'static str,
    evidence_prefix: Option<&'static str>,
}

const PROJECT_INIT: ActionSpec = ActionSpec {
    text: "initialize the project (tc init), then verify setup",
    evidence_prefix: Some("tc init"),
};
const SERVICE_RESTART: ActionSpec = ActionSpec {
    text: "restart service, then check status",
    evidence_prefix: Some("tc daemon restart"),
};
const TUI_RELOAD: ActionSpec = ActionSpec {
    text: "signal the TUI to reload (tc tui reload)",
    evidence_prefix: Some("tc tui reload"),
};
const ARTIFACT_RELOAD: ActionSpec = ActionSpec {
    text: "reload agent artifacts (tc agents reload)",
    evidence_prefix: Some("tc agents reload"),
};
const LOG_CHECK: ActionSpec = ActionSpec {
    text: "check daemon logs for errors (tc logs --recent)",
    evidence_prefix: Some("tc logs"),
};
const TARGETED_TESTS: ActionSpec = ActionSpec {
    text: "run targeted tests for the touched area",
    evidence_prefix: Some("cargo test"),
};
const COMMIT: ActionSpec = ActionSpec {
    text: "commit the work (git commit)",
    evidence_prefix: Some("git commit"),
};
const CAPTURE_NOTE: ActionSpec = ActionSpec {
    text: "capture anything worth keeping: memories, bugs, ideas",
    evidence_prefix: None,
};

/// Compose the checkpoint for a set of uncommitted paths.
pub fn compose(paths: &[String], evidence: &[Evidence]) -> CheckpointOutcome {
    if paths.is_empty() {
        return CheckpointOutcome::Silence;
    }

    let categories: Vec<FileCategory> = paths.iter().map(|p| categorize(p)).collect();

    // Tests-only holds only when every non-doc change is under tests/
    let non_docs: Vec<FileCategory> = categories
        .iter()
        .copied()
        .filter(|c| *c != FileCategory::Docs)
        .collect();
    let tests_only = !non_docs.is_empty() && non_docs.iter().all(|c| *c == FileCategory::Tests);

    let has = |category: FileCategory| categories.contains(&category);
    // Hook-runtime-only changes count as code changes
    let code_changed = !tests_only
        && (has(FileCategory::Daemon)
            || has(FileCategory::HookRuntime)
            || has(FileCategory::Tui)
            || has(FileCategory::Setup));

    let mut actions: Vec<&ActionSpec> = Vec::new();

    // (1) runtime/setup, in strict sub-order
    if has(FileCategory::Setup) {
        actions.push(&PROJECT_INIT);
    }
    if has(FileCategory::Daemon) || has(FileCategory::HookRuntime) || has(FileCategory::Config) {
        // Exactly one restart action regardless of how many categories ask
        actions.push(&SERVICE_RESTART);
    }
    if has(FileCategory::Tui) {
        actions.push(&TUI_RELOAD);
    }
    if has(FileCategory::AgentArtifacts) {
        actions.push(&ARTIFACT_RELOAD);
    }

    // (2) observability: the baseline log check is always included, even
    // when the working tree is docs only
    actions.push(&LOG_CHECK);

    // (3) validation; enforcement is at pre-commit hooks, never here
    if code_changed || tests_only {
        actions.push(&TARGETED_TESTS);
    }

    // (4) commit, only after runtime/observability/validation
    actions.push(&COMMIT);

    // (5) capture reminder as closing note
    actions.push(&CAPTURE_NOTE);

    // Evidence suppression, then dedup identical strings
    let mut seen = HashSet::new();
    let final_actions: Vec<String> = actions
        .into_iter()
        .filter(|spec| !suppressed_by_evidence(spec, evidence))
        .filter(|spec| seen.insert(spec.text))
        .map(|spec| spec.text.to_string())
        .collect();

    if final_actions.is_empty() {
        CheckpointOutcome::Silence
    } else {
        CheckpointOutcome::Block {
            actions: final_actions,
        }
    }
}

fn suppressed_by_evidence(spec: &ActionSpec, evidence: &[Evidence]) -> bool {
    let Some(prefix) = spec.evidence_prefix else {
        return false;
    };
    evidence
        .iter()
        .any(|e| e.ok && e.command.starts_with(prefix))
}

#[cfg(test)]
#[path = "checkpoint_tests.rs"]
mod tests;
