// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fake multiplexer for tests.
//!
//! Scripts pane content and records every call so engine tests can assert
//! on bridge interactions without tmux.

use crate::marker::ExitMarker;
use crate::{Capture, MuxAdapter, MuxError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A recorded bridge call.
#[derive(Debug, Clone, PartialEq)]
pub enum MuxCall {
    Create { name: String, cwd: PathBuf },
    SendKeys { name: String, text: String, marker: bool },
    Capture { name: String, cursor: u64 },
    Kill { name: String },
    Exists { name: String },
}

#[derive(Default)]
struct FakePane {
    content: String,
    current_command: String,
    alive: bool,
}

#[derive(Default)]
struct Inner {
    panes: HashMap<String, FakePane>,
    calls: Vec<MuxCall>,
    /// When set, send_keys with marker gating appends the expanded marker
    /// to pane content after this many captures (simulating completion).
    auto_complete_exit_code: Option<i32>,
}

/// Scriptable fake bridge. Clones share state.
#[derive(Clone)]
pub struct FakeMux {
    inner: Arc<Mutex<Inner>>,
    shell_name: String,
}

impl Default for FakeMux {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeMux {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            shell_name: "bash".to_string(),
        }
    }

    /// Every send_keys with marker gating immediately completes with this
    /// exit code: the keyed text and expanded marker land in pane content.
    pub fn auto_complete(self, exit_code: i32) -> Self {
        self.inner.lock().auto_complete_exit_code = Some(exit_code);
        self
    }

    pub fn calls(&self) -> Vec<MuxCall> {
        self.inner.lock().calls.clone()
    }

    /// Append scripted output to a pane.
    pub fn append_content(&self, name: &str, text: &str) {
        let mut inner = self.inner.lock();
        if let Some(pane) = inner.panes.get_mut(name) {
            pane.content.push_str(text);
        }
    }

    /// Script the pane's foreground command (e.g. "vim").
    pub fn set_current_command(&self, name: &str, command: &str) {
        let mut inner = self.inner.lock();
        if let Some(pane) = inner.panes.get_mut(name) {
            pane.current_command = command.to_string();
        }
    }

    /// Simulate the pane dying externally (user killed the window).
    pub fn kill_externally(&self, name: &str) {
        let mut inner = self.inner.lock();
        if let Some(pane) = inner.panes.get_mut(name) {
            pane.alive = false;
        }
    }

    pub fn is_alive(&self, name: &str) -> bool {
        self.inner
            .lock()
            .panes
            .get(name)
            .map(|p| p.alive)
            .unwrap_or(false)
    }

    pub fn pane_content(&self, name: &str) -> Option<String> {
        self.inner.lock().panes.get(name).map(|p| p.content.clone())
    }

    /// Last text keyed into the pane, if any.
    pub fn last_sent(&self, name: &str) -> Option<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .rev()
            .find_map(|call| match call {
                MuxCall::SendKeys { name: n, text, .. } if n == name => Some(text.clone()),
                _ => None,
            })
    }
}

#[async_trait]
impl MuxAdapter for FakeMux {
    async fn create(
        &self,
        name: &str,
        cwd: &Path,
        _cols: u16,
        _rows: u16,
    ) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::Create {
            name: name.to_string(),
            cwd: cwd.to_path_buf(),
        });
        if inner.panes.get(name).map(|p| p.alive).unwrap_or(false) {
            return Err(MuxError::SpawnFailed(format!(
                "duplicate session: {}",
                name
            )));
        }
        inner.panes.insert(
            name.to_string(),
            FakePane {
                content: String::new(),
                current_command: self.shell_name.clone(),
                alive: true,
            },
        );
        Ok(())
    }

    async fn send_keys(
        &self,
        name: &str,
        text: &str,
        append_exit_marker: bool,
    ) -> Result<Option<ExitMarker>, MuxError> {
        let mut inner = self.inner.lock();
        let auto_complete = inner.auto_complete_exit_code;
        let Some(pane) = inner.panes.get(name) else {
            return Err(MuxError::NotFound(name.to_string()));
        };
        if !pane.alive {
            return Err(MuxError::NotFound(name.to_string()));
        }

        let at_shell = pane.current_command == self.shell_name;
        let marker = if append_exit_marker && at_shell {
            Some(ExitMarker::generate(text))
        } else {
            None
        };

        inner.calls.push(MuxCall::SendKeys {
            name: name.to_string(),
            text: match &marker {
                Some(m) => m.append_to(text),
                None => text.to_string(),
            },
            marker: marker.is_some(),
        });

        if let (Some(marker), Some(code)) = (&marker, auto_complete) {
            if let Some(pane) = inner.panes.get_mut(name) {
                pane.content.push_str(&marker.append_to(text));
                pane.content.push('\n');
                pane.content
                    .push_str(&format!("__EXIT__{}__{}__\n", marker.hash(), code));
            }
        }

        Ok(marker)
    }

    async fn capture(&self, name: &str, cursor: u64) -> Result<Capture, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::Capture {
            name: name.to_string(),
            cursor,
        });
        let Some(pane) = inner.panes.get(name) else {
            return Err(MuxError::NotFound(name.to_string()));
        };
        let total = pane.content.len() as u64;
        let start = cursor.min(total) as usize;
        Ok(Capture {
            text: pane.content[start..].to_string(),
            cursor: total,
        })
    }

    async fn kill(&self, name: &str) -> Result<(), MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::Kill {
            name: name.to_string(),
        });
        if let Some(pane) = inner.panes.get_mut(name) {
            pane.alive = false;
        }
        Ok(())
    }

    async fn list_panes(&self) -> Result<Vec<String>, MuxError> {
        let inner = self.inner.lock();
        Ok(inner
            .panes
            .iter()
            .filter(|(_, p)| p.alive)
            .map(|(n, _)| n.clone())
            .collect())
    }

    async fn exists(&self, name: &str) -> Result<bool, MuxError> {
        let mut inner = self.inner.lock();
        inner.calls.push(MuxCall::Exists {
            name: name.to_string(),
        });
        Ok(inner.panes.get(name).map(|p| p.alive).unwrap_or(false))
    }

    async fn current_command(&self, name: &str) -> Result<String, MuxError> {
        let inner = self.inner.lock();
        inner
            .panes
            .get(name)
            .filter(|p| p.alive)
            .map(|p| p.current_command.clone())
            .ok_or_else(|| MuxError::NotFound(name.to_string()))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
