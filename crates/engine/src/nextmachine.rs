// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Next-machine orchestrator.
//!
//! Stateless: the workflow phase of a work item is derived entirely from
//! its on-disk artifacts each time, never from in-memory state. Two
//! phases: Prepare (human-in-the-loop preparation) and Work (autonomous
//! implementation/verification). Items with incomplete dependencies are
//! blocked. All artifacts must be tracked by version control.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tc_core::{Command, ThinkingMode};
use thiserror::Error;

/// Workflow phase derived from artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Prepare,
    Work,
}

/// What the caller should do next for a work item.
#[derive(Debug, Clone, PartialEq)]
pub enum NextAction {
    /// Prose guidance for the human driving preparation.
    Instruct { phase: Phase, guidance: String },
    /// A concrete command to dispatch, placeholders already filled.
    Dispatch { phase: Phase, command: Command },
    /// Dependencies are incomplete.
    Blocked { incomplete: Vec<String> },
    /// Terminal condition: the item is done.
    Done,
}

#[derive(Debug, Error)]
pub enum NextMachineError {
    #[error("work item not found: {0}")]
    NotFound(String),
    #[error("artifact not tracked by version control: {0}")]
    Untracked(PathBuf),
    #[error("bad state file for '{slug}': {message}")]
    BadState { slug: String, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Contents of a work item's `state.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkItemState {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl WorkItemState {
    pub fn is_done(&self) -> bool {
        self.status == "done"
    }
}

/// On-disk facts about a work item, gathered fresh per resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItemArtifacts {
    pub slug: String,
    pub dir: PathBuf,
    pub has_roadmap: bool,
    pub has_requirements: bool,
    pub has_implementation_plan: bool,
    pub state: WorkItemState,
    /// (dependency slug, done) pairs.
    pub dependencies: Vec<(String, bool)>,
}

const ROADMAP: &str = "roadmap.md";
const REQUIREMENTS: &str = "requirements.md";
const IMPLEMENTATION_PLAN: &str = "implementation-plan.md";
const STATE: &str = "state.json";

/// Resolve the next action for a work item under `root/work-items/{slug}`.
pub async fn resolve(
    root: &Path,
    slug: &str,
    require_tracked: bool,
) -> Result<NextAction, NextMachineError> {
    let artifacts = inspect(root, slug, require_tracked).await?;
    Ok(decide(&artifacts))
}

/// Gather artifact facts from disk.
pub async fn inspect(
    root: &Path,
    slug: &str,
    require_tracked: bool,
) -> Result<WorkItemArtifacts, NextMachineError> {
    let dir = root.join("work-items").join(slug);
    if !dir.is_dir() {
        return Err(NextMachineError::NotFound(slug.to_string()));
    }

    let artifacts = [ROADMAP, REQUIREMENTS, IMPLEMENTATION_PLAN, STATE];
    if require_tracked {
        for name in artifacts {
            let path = dir.join(name);
            if path.is_file() && !git_tracked(root, &path).await? {
                return Err(NextMachineError::Untracked(path));
            }
        }
    }

    let has_roadmap = dir.join(ROADMAP).is_file();
    let has_requirements = dir.join(REQUIREMENTS).is_file();
    let has_implementation_plan = dir.join(IMPLEMENTATION_PLAN).is_file();

    let state = read_state(&dir, slug)?;
    let mut dependencies = Vec::with_capacity(state.depends_on.len());
    for dep in &state.depends_on {
        let dep_dir = root.join("work-items").join(dep);
        let done = read_state(&dep_dir, dep)
            .map(|s| s.is_done())
            .unwrap_or(false);
        dependencies.push((dep.clone(), done));
    }

    Ok(WorkItemArtifacts {
        slug: slug.to_string(),
        has_roadmap,
        has_requirements,
        has_implementation_plan,
        state,
        dependencies,
        dir,
    })
}

/// Pure phase derivation.
pub fn decide(artifacts: &WorkItemArtifacts) -> NextAction {
    let incomplete: Vec<String> = artifacts
        .dependencies
        .iter()
        .filter(|(_, done)| !done)
        .map(|(slug, _)| slug.clone())
        .collect();
    if !incomplete.is_empty() {
        return NextAction::Blocked { incomplete };
    }

    if artifacts.state.is_done() {
        return NextAction::Done;
    }

    if !artifacts.has_roadmap {
        return NextAction::Instruct {
            phase: Phase::Prepare,
            guidance: format!(
                "Write {} for '{}': goals, constraints, and rough milestones.",
                ROADMAP, artifacts.slug
            ),
        };
    }

    if !artifacts.has_requirements {
        return NextAction::Instruct {
            phase: Phase::Prepare,
            guidance: format!(
                "Draft {} for '{}' with the stakeholder: acceptance criteria first.",
                REQUIREMENTS, artifacts.slug
            ),
        };
    }

    if !artifacts.has_implementation_plan {
        return NextAction::Dispatch {
            phase: Phase::Prepare,
            command: work_item_session(
                artifacts,
                format!(
                    "Draft {} for work item '{}' from {}. Stop for review when done.",
                    IMPLEMENTATION_PLAN, artifacts.slug, REQUIREMENTS
                ),
            ),
        };
    }

    NextAction::Dispatch {
        phase: Phase::Work,
        command: work_item_session(
            artifacts,
            format!(
                "Implement work item '{}' per {}; verify against {} before marking {} done.",
                artifacts.slug, IMPLEMENTATION_PLAN, REQUIREMENTS, STATE
            ),
        ),
    }
}

fn work_item_session(artifacts: &WorkItemArtifacts, initial_message: String) -> Command {
    Command::NewSession {
        cwd: artifacts.dir.clone(),
        agent: String::new(),
        mode: ThinkingMode::Med,
        title: Some(format!("work-item: {}", artifacts.slug)),
        initial_message: Some(initial_message),
    }
}

fn read_state(dir: &Path, slug: &str) -> Result<WorkItemState, NextMachineError> {
    let path = dir.join(STATE);
    if !path.is_file() {
        return Ok(WorkItemState::default());
    }
    let raw = std::fs::read_to_string(&path)?;
    serde_json::from_str(&raw).map_err(|e| NextMachineError::BadState {
        slug: slug.to_string(),
        message: e.to_string(),
    })
}

async fn git_tracked(root: &Path, path: &Path) -> Result<bool, NextMachineError> {
    let output = tokio::process::Command::new("git")
        .arg("ls-files")
        .arg("--error-unmatch")
        .arg(path)
        .current_dir(root)
        .output()
        .await?;
    Ok(output.status.success())
}

#[cfg(test)]
#[path = "nextmachine_tests.rs"]
mod tests;
