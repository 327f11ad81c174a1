// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command ingress.
//!
//! Validates command shape, assigns a deduplication key when absent, and
//! appends a pending entry to the durable queue. Configuration and
//! validation errors reject here and are never queued.

use std::sync::Arc;
use tc_core::{Clock, Command, CommandEnvelope, CommandSource, Config, SessionId};
use tc_storage::{EnqueueOutcome, Storage};
use thiserror::Error;
use tokio::sync::Notify;

/// Rejections at ingress. These never create queue entries.
#[derive(Debug, Error)]
pub enum IngressError {
    #[error("working directory '{0}' is not trusted on this computer")]
    UntrustedCwd(String),
    #[error("invalid command: {0}")]
    Invalid(String),
    #[error("queue write failed: {0}")]
    Durability(#[from] tc_storage::StorageError),
}

/// Acknowledgement returned to the submitting adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngressReceipt {
    pub entry_id: i64,
    pub dedup_key: String,
    /// True when (source, dedup key) matched an existing entry.
    pub duplicate: bool,
}

/// Validating front door to the durable queue.
#[derive(Clone)]
pub struct Ingress<C: Clock> {
    storage: Storage,
    config: Arc<Config>,
    clock: C,
    /// Wakes queue workers after an enqueue.
    wake: Arc<Notify>,
}

impl<C: Clock> Ingress<C> {
    pub fn new(storage: Storage, config: Arc<Config>, clock: C) -> Self {
        Self {
            storage,
            config,
            clock,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Shared wake handle for queue workers.
    pub fn wake_handle(&self) -> Arc<Notify> {
        Arc::clone(&self.wake)
    }

    /// Validate and enqueue a command.
    pub fn submit(
        &self,
        command: Command,
        source: CommandSource,
        dedup_key: Option<String>,
        caller_session_id: Option<SessionId>,
    ) -> Result<IngressReceipt, IngressError> {
        self.validate(&command)?;

        let envelope = CommandEnvelope {
            command,
            source,
            dedup_key: dedup_key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            caller_session_id,
            accepted_at: self.clock.now(),
        };

        let outcome = self.storage.enqueue_command(&envelope)?;
        let receipt = match outcome {
            EnqueueOutcome::Accepted(entry_id) => {
                tracing::info!(
                    entry_id,
                    kind = envelope.command.kind().as_str(),
                    source = %envelope.source,
                    "command accepted"
                );
                IngressReceipt {
                    entry_id,
                    dedup_key: envelope.dedup_key,
                    duplicate: false,
                }
            }
            EnqueueOutcome::Duplicate(entry_id) => {
                tracing::debug!(
                    entry_id,
                    source = %envelope.source,
                    dedup_key = %envelope.dedup_key,
                    "duplicate command, returning prior entry"
                );
                IngressReceipt {
                    entry_id,
                    dedup_key: envelope.dedup_key,
                    duplicate: true,
                }
            }
        };
        self.wake.notify_waiters();
        Ok(receipt)
    }

    fn validate(&self, command: &Command) -> Result<(), IngressError> {
        match command {
            Command::NewSession { cwd, agent, .. } => {
                if !cwd.is_absolute() {
                    return Err(IngressError::Invalid(format!(
                        "cwd must be absolute, got '{}'",
                        cwd.display()
                    )));
                }
                if !self.config.cwd_trusted(&self.config.computer_name, cwd) {
                    return Err(IngressError::UntrustedCwd(cwd.display().to_string()));
                }
                // Agent name shape is checked here; routability is the
                // resolver's job at execution time.
                if !agent.is_empty() && tc_core::AgentKind::parse(agent).is_none() {
                    return Err(IngressError::Invalid(format!("unknown agent '{}'", agent)));
                }
            }
            Command::SendMessage { text, .. } => {
                if text.is_empty() {
                    return Err(IngressError::Invalid("message text is empty".into()));
                }
            }
            Command::AgentThenMessage { text, .. } => {
                if text.is_empty() {
                    return Err(IngressError::Invalid("message text is empty".into()));
                }
            }
            Command::RunAgentCommand { command, .. } => {
                if !command.starts_with('/') {
                    return Err(IngressError::Invalid(format!(
                        "agent command must start with '/', got '{}'",
                        command
                    )));
                }
            }
            Command::MarkAgentStatus { status, until, .. } => {
                // A past expiry would clear immediately; forbid the combination.
                if *status != tc_core::AvailabilityStatus::Available {
                    if let Some(until) = until {
                        if *until <= self.clock.now() {
                            return Err(IngressError::Invalid(
                                "unavailable_until is in the past".into(),
                            ));
                        }
                    }
                }
            }
            Command::EndSession { .. }
            | Command::StartAgent { .. }
            | Command::ResumeAgent { .. }
            | Command::AgentRestart { .. }
            | Command::Deploy { .. } => {}
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "ingress_tests.rs"]
mod tests;
