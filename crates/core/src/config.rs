// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration.
//!
//! A single human-edited TOML file, loaded once at startup; changes require
//! a restart. Default location is `~/.config/teleclaude/config.toml`,
//! overridable via `TELECLAUDE_CONFIG`.

use crate::session::AgentKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or validating configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Per-agent routing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Free-text hints consumed by implicit agent selection.
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub avoid: Vec<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strengths: Vec::new(),
            avoid: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Per-computer settings (trusted working directories).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ComputerConfig {
    #[serde(default)]
    pub trusted_dirs: Vec<PathBuf>,
}

/// Adapter enablement and credentials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AdaptersConfig {
    #[serde(default)]
    pub enabled: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_bot_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discord_bot_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_bind: Option<String>,
}

/// Top-level daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Identity of this machine in the peer registry and session records.
    pub computer_name: String,

    #[serde(default)]
    pub adapters: AdaptersConfig,

    /// Agent routing table keyed by agent name.
    #[serde(default)]
    pub agents: HashMap<String, AgentConfig>,

    /// Seconds of pane silence before the poller emits an idle notification.
    #[serde(default = "default_idle_seconds")]
    pub idle_notification_seconds: u64,

    /// Login shell name used for exit-marker gating; computed from `$SHELL`
    /// when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell_name: Option<String>,

    /// Per-computer settings keyed by computer name.
    #[serde(default)]
    pub computers: HashMap<String, ComputerConfig>,

    /// Redis URL for the cross-machine transport; absent disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redis_url: Option<String>,
}

fn default_idle_seconds() -> u64 {
    60
}

impl Config {
    /// Default config path (`~/.config/teleclaude/config.toml`), honoring
    /// the `TELECLAUDE_CONFIG` override.
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(p) = std::env::var("TELECLAUDE_CONFIG") {
            return Some(PathBuf::from(p));
        }
        dirs::config_dir().map(|d| d.join("teleclaude").join("config.toml"))
    }

    /// Load and validate configuration from the given path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.computer_name.trim().is_empty() {
            return Err(ConfigError::Invalid("computer_name must be set".into()));
        }
        if self
            .computer_name
            .chars()
            .any(|c| c.is_whitespace() || c == ':')
        {
            return Err(ConfigError::Invalid(
                "computer_name must not contain whitespace or ':'".into(),
            ));
        }
        for name in self.agents.keys() {
            if AgentKind::parse(name).is_none() {
                return Err(ConfigError::Invalid(format!("unknown agent '{}'", name)));
            }
        }
        Ok(())
    }

    /// Whether an agent is known and enabled in configuration.
    pub fn agent_enabled(&self, agent: AgentKind) -> bool {
        self.agents
            .get(agent.as_str())
            .map(|a| a.enabled)
            .unwrap_or(false)
    }

    /// Agents declared in configuration, in stable name order.
    pub fn known_agents(&self) -> Vec<AgentKind> {
        let mut names: Vec<&String> = self.agents.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|n| AgentKind::parse(n))
            .collect()
    }

    /// Trusted working directories for the given computer.
    pub fn trusted_dirs(&self, computer: &str) -> &[PathBuf] {
        self.computers
            .get(computer)
            .map(|c| c.trusted_dirs.as_slice())
            .unwrap_or(&[])
    }

    /// True when `cwd` is inside a trusted directory for this computer.
    /// An empty trusted list means no restriction.
    pub fn cwd_trusted(&self, computer: &str, cwd: &Path) -> bool {
        let dirs = self.trusted_dirs(computer);
        if dirs.is_empty() {
            return true;
        }
        dirs.iter().any(|d| cwd.starts_with(d))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
