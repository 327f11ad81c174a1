// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux bridge implementation.

use crate::marker::ExitMarker;
use crate::{Capture, MuxAdapter, MuxError};
use async_trait::async_trait;
use std::path::Path;
use tokio::process::Command;

/// Tmux-backed multiplexer bridge.
///
/// Captures read the full pane history (`-S -`) and slice new bytes after
/// the caller's cursor, so each poll sees only the delta.
#[derive(Clone)]
pub struct TmuxMux {
    /// Login shell name used for exit-marker gating.
    shell_name: String,
}

impl TmuxMux {
    pub fn new(shell_name: impl Into<String>) -> Self {
        Self {
            shell_name: shell_name.into(),
        }
    }

    async fn run(args: &[&str]) -> Result<std::process::Output, MuxError> {
        Command::new("tmux")
            .args(args)
            .output()
            .await
            .map_err(|e| MuxError::CommandFailed(e.to_string()))
    }
}

#[async_trait]
impl MuxAdapter for TmuxMux {
    async fn create(
        &self,
        name: &str,
        cwd: &Path,
        cols: u16,
        rows: u16,
    ) -> Result<(), MuxError> {
        // Precondition: cwd must exist
        if !cwd.exists() {
            return Err(MuxError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let cwd_str = cwd.display().to_string();
        let cols_str = cols.to_string();
        let rows_str = rows.to_string();
        let output = Self::run(&[
            "new-session",
            "-d",
            "-s",
            name,
            "-c",
            &cwd_str,
            "-x",
            &cols_str,
            "-y",
            &rows_str,
        ])
        .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(name, stderr = %stderr, "tmux spawn failed");
            return Err(MuxError::SpawnFailed(stderr.to_string()));
        }

        // Log stderr even on success - may contain useful warnings
        if !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(name, stderr = %stderr, "tmux spawn stderr (non-fatal)");
        }

        Ok(())
    }

    async fn send_keys(
        &self,
        name: &str,
        text: &str,
        append_exit_marker: bool,
    ) -> Result<Option<ExitMarker>, MuxError> {
        let marker = if append_exit_marker {
            // Marker only when the pane is back at the login shell; input to
            // a running process passes through untouched.
            let current = self.current_command(name).await?;
            if current == self.shell_name {
                Some(ExitMarker::generate(text))
            } else {
                None
            }
        } else {
            None
        };

        let keyed = match &marker {
            Some(marker) => marker.append_to(text),
            None => text.to_string(),
        };

        // -l = literal mode (no key name interpretation)
        // -- = end of options (handles text starting with -)
        let output = Self::run(&["send-keys", "-t", name, "-l", "--", &keyed]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }

        let output = Self::run(&["send-keys", "-t", name, "Enter"]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }

        Ok(marker)
    }

    async fn capture(&self, name: &str, cursor: u64) -> Result<Capture, MuxError> {
        let output = Self::run(&["capture-pane", "-t", name, "-p", "-S", "-"]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }

        let full = String::from_utf8_lossy(&output.stdout).into_owned();
        let total = full.len() as u64;
        let start = cursor.min(total) as usize;
        // Slice on a char boundary; back up if the cursor split a multibyte
        // sequence (pane history shifted under us).
        let mut start = start;
        while start > 0 && !full.is_char_boundary(start) {
            start -= 1;
        }
        Ok(Capture {
            text: full[start..].to_string(),
            cursor: total,
        })
    }

    async fn kill(&self, name: &str) -> Result<(), MuxError> {
        let output = Self::run(&["kill-session", "-t", name]).await?;
        if !output.status.success() {
            // Session might already be dead, which is fine
        }
        Ok(())
    }

    async fn list_panes(&self) -> Result<Vec<String>, MuxError> {
        let output = Self::run(&["list-sessions", "-F", "#{session_name}"]).await?;
        if !output.status.success() {
            // No server running means no sessions
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect())
    }

    async fn exists(&self, name: &str) -> Result<bool, MuxError> {
        let output = Self::run(&["has-session", "-t", name]).await?;
        Ok(output.status.success())
    }

    async fn current_command(&self, name: &str) -> Result<String, MuxError> {
        let output =
            Self::run(&["display-message", "-t", name, "-p", "#{pane_current_command}"]).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(name.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
