// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tc-mux: terminal-multiplexer bridge.
//!
//! Wraps the multiplexer behind an async trait: create/kill detached
//! sessions, send keys (optionally with an exit marker), capture pane
//! output incrementally, enumerate panes, check liveness. Each operation is
//! stateless and identified by session name, so the shared multiplexer
//! socket needs no coordination on our side.

pub mod marker;
mod tmux;

pub use marker::ExitMarker;
pub use tmux::TmuxMux;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeMux, MuxCall};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors from multiplexer operations.
#[derive(Debug, Error)]
pub enum MuxError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
}

/// Incremental capture result: new output since the cursor, plus the
/// cursor to pass next time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub text: String,
    pub cursor: u64,
}

/// Bridge to the terminal multiplexer.
#[async_trait]
pub trait MuxAdapter: Clone + Send + Sync + 'static {
    /// Create a detached session with the given geometry.
    async fn create(&self, name: &str, cwd: &Path, cols: u16, rows: u16)
        -> Result<(), MuxError>;

    /// Send text into a session's pane, followed by Enter.
    ///
    /// When `append_exit_marker` is set AND the pane's foreground command is
    /// the login shell, a fresh exit marker is appended so completion can be
    /// detected; the marker is returned. Input to a running process passes
    /// through untouched and `None` is returned.
    async fn send_keys(
        &self,
        name: &str,
        text: &str,
        append_exit_marker: bool,
    ) -> Result<Option<ExitMarker>, MuxError>;

    /// Capture pane output after `cursor`; returns only new bytes.
    async fn capture(&self, name: &str, cursor: u64) -> Result<Capture, MuxError>;

    /// Kill a session. Killing an already-dead session is not an error.
    async fn kill(&self, name: &str) -> Result<(), MuxError>;

    /// Names of all live panes/sessions owned by this daemon.
    async fn list_panes(&self) -> Result<Vec<String>, MuxError>;

    /// Whether the session exists.
    async fn exists(&self, name: &str) -> Result<bool, MuxError>;

    /// The pane's current foreground command (e.g. "bash", "vim").
    async fn current_command(&self, name: &str) -> Result<String, MuxError>;
}

/// Login shell name used for exit-marker gating.
///
/// Computed once at startup from `$SHELL`; the configuration override wins
/// when present.
pub fn login_shell_name(config_override: Option<&str>) -> String {
    if let Some(name) = config_override {
        return name.to_string();
    }
    std::env::var("SHELL")
        .ok()
        .and_then(|path| {
            Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "bash".to_string())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
