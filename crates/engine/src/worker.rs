// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue workers.
//!
//! One worker task per source class; within a class, strict FIFO by
//! acceptance time. Each iteration claims the oldest pending entry
//! (atomically moving it to in_flight), dispatches by kind under a
//! per-kind runtime ceiling, and marks the entry delivered or failed.
//! Transient handler errors retry up to a per-kind attempt ceiling.

use crate::error::EngineError;
use crate::routing::RoutingResolver;
use crate::sessions::{SessionManager, StartParams};
use std::sync::Arc;
use std::time::Duration;
use tc_core::{
    AgentAvailability, AgentKind, Clock, Command, CommandKind, CommandSource, ThinkingMode,
};
use tc_storage::{QueueEntry, Storage};
use tc_mux::MuxAdapter;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// Worker tuning.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Poll interval while a source class is drained.
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(200),
        }
    }
}

/// Maximum runtime per command kind; exceeding it cancels the handler and
/// fails the entry.
fn max_runtime(kind: CommandKind) -> Duration {
    match kind {
        CommandKind::NewSession => Duration::from_secs(30),
        CommandKind::Deploy => Duration::from_secs(300),
        CommandKind::AgentThenMessage => Duration::from_secs(60),
        _ => Duration::from_secs(15),
    }
}

/// Attempt ceiling per kind (total attempts including the first).
fn attempt_ceiling(kind: CommandKind) -> u32 {
    match kind {
        CommandKind::NewSession | CommandKind::Deploy => 1,
        _ => 3,
    }
}

/// Executes queued commands against the session manager.
#[derive(Clone)]
pub struct QueueWorker<M: MuxAdapter, C: Clock> {
    storage: Storage,
    manager: SessionManager<M, C>,
    routing: RoutingResolver<C>,
    clock: C,
    wake: Arc<Notify>,
    config: WorkerConfig,
}

impl<M: MuxAdapter, C: Clock> QueueWorker<M, C> {
    pub fn new(
        storage: Storage,
        manager: SessionManager<M, C>,
        routing: RoutingResolver<C>,
        clock: C,
        wake: Arc<Notify>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            storage,
            manager,
            routing,
            clock,
            wake,
            config,
        }
    }

    /// Spawn one worker per source class.
    pub fn spawn_all(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        const SOURCES: [CommandSource; 7] = [
            CommandSource::Api,
            CommandSource::Telegram,
            CommandSource::Discord,
            CommandSource::Mcp,
            CommandSource::Cron,
            CommandSource::Cli,
            CommandSource::Redis,
        ];
        SOURCES
            .iter()
            .map(|source| {
                let worker = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { worker.run_source(*source, shutdown).await })
            })
            .collect()
    }

    /// Drive one source class until shutdown. During shutdown no new
    /// claims happen; the in-flight entry finishes first.
    pub async fn run_source(&self, source: CommandSource, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            let claimed = match self.storage.claim_next_command(source, self.clock.now()) {
                Ok(claimed) => claimed,
                Err(e) => {
                    tracing::error!(source = %source, error = %e, "queue claim failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            match claimed {
                Some(entry) => self.handle_entry(entry).await,
                None => {
                    tokio::select! {
                        _ = self.wake.notified() => {}
                        _ = tokio::time::sleep(self.config.poll_interval) => {}
                        _ = shutdown.changed() => {}
                    }
                }
            }
        }
    }

    /// Process one claimed entry end to end.
    pub async fn handle_entry(&self, entry: QueueEntry) {
        let kind = entry.envelope.command.kind();
        let runtime_cap = max_runtime(kind);
        let result = match tokio::time::timeout(runtime_cap, self.execute(&entry)).await {
            Ok(result) => result,
            Err(_) => Err(EngineError::CommandTimeout(runtime_cap)),
        };

        match result {
            Ok(()) => {
                if let Err(e) = self.storage.mark_command_delivered(entry.id) {
                    tracing::error!(entry_id = entry.id, error = %e, "delivered ack failed");
                }
            }
            Err(error) => {
                let attempts_after = entry.attempts + 1;
                let retryable =
                    error.is_transient() && attempts_after < attempt_ceiling(kind);
                tracing::error!(
                    entry_id = entry.id,
                    kind = kind.as_str(),
                    source = %entry.envelope.source,
                    attempts = attempts_after,
                    retryable,
                    error = %error,
                    "command failed"
                );
                let ack = if retryable {
                    self.storage.retry_command(entry.id, &error.to_string())
                } else {
                    self.storage.mark_command_failed(entry.id, &error.to_string())
                };
                if let Err(e) = ack {
                    tracing::error!(entry_id = entry.id, error = %e, "failure ack failed");
                }
            }
        }
    }

    async fn execute(&self, entry: &QueueEntry) -> Result<(), EngineError> {
        let source = entry.envelope.source;
        match &entry.envelope.command {
            Command::NewSession {
                cwd,
                agent,
                mode,
                title,
                initial_message,
            } => {
                // Every launch path routes through the canonical resolver
                let agent = self.routing.resolve(agent, source, *mode)?;
                self.manager
                    .start(StartParams {
                        cwd: cwd.clone(),
                        agent,
                        mode: *mode,
                        title: title.clone(),
                        origin: source.as_str().to_string(),
                        adapter_meta: serde_json::Value::Null,
                        initial_message: initial_message.clone(),
                    })
                    .await?;
                Ok(())
            }

            Command::SendMessage { session_id, text } => {
                self.manager.send_message(session_id, text).await
            }

            Command::EndSession { session_id } => {
                // Idempotent: closing a closed session is a successful no-op
                self.manager.close(session_id).await?;
                Ok(())
            }

            Command::StartAgent {
                session_id,
                agent,
                mode,
            } => {
                let agent = self.routing.resolve(agent, source, *mode)?;
                self.manager
                    .send_raw(session_id, &launch_command(agent, *mode, false))
                    .await
            }

            Command::ResumeAgent { session_id, agent } => {
                let session = self
                    .manager
                    .get(session_id)?
                    .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
                let requested = if agent.is_empty() {
                    session.agent.as_str()
                } else {
                    agent.as_str()
                };
                let agent = self.routing.resolve(requested, source, session.mode)?;
                self.manager
                    .send_raw(session_id, &launch_command(agent, session.mode, true))
                    .await
            }

            Command::AgentRestart { session_id } => {
                let session = self
                    .manager
                    .get(session_id)?
                    .ok_or_else(|| EngineError::SessionNotFound(session_id.to_string()))?;
                let agent =
                    self.routing
                        .resolve(session.agent.as_str(), source, session.mode)?;
                // Interrupt whatever runs in the pane, then relaunch
                self.manager.send_raw(session_id, "\u{3}").await?;
                tokio::time::sleep(Duration::from_millis(500)).await;
                self.manager
                    .send_raw(session_id, &launch_command(agent, session.mode, true))
                    .await
            }

            Command::AgentThenMessage {
                session_id,
                agent,
                mode,
                text,
            } => {
                let agent = self.routing.resolve(agent, source, *mode)?;
                self.manager
                    .send_raw(session_id, &launch_command(agent, *mode, false))
                    .await?;
                // Give the agent REPL a moment to come up before the prompt
                tokio::time::sleep(Duration::from_secs(2)).await;
                self.manager.send_raw(session_id, text).await
            }

            Command::RunAgentCommand {
                session_id,
                command,
            } => self.manager.send_raw(session_id, command).await,

            Command::Deploy { git_ref } => self.deploy(git_ref.as_deref()).await,

            Command::MarkAgentStatus {
                agent,
                status,
                reason,
                until,
            } => {
                self.storage.set_availability(&AgentAvailability {
                    agent: *agent,
                    status: *status,
                    reason: reason.clone(),
                    unavailable_until: *until,
                })?;
                tracing::info!(
                    agent = %agent,
                    status = status.as_str(),
                    until = ?until,
                    "agent availability updated"
                );
                Ok(())
            }
        }
    }

    /// Pull the requested ref in the daemon's install checkout. The service
    /// manager restarts us after exit; this only updates the tree.
    async fn deploy(&self, git_ref: Option<&str>) -> Result<(), EngineError> {
        let cwd = std::env::current_dir()?;
        if let Some(git_ref) = git_ref {
            run_checked("git", &["fetch", "origin"], &cwd).await?;
            run_checked("git", &["checkout", git_ref], &cwd).await?;
        }
        run_checked("git", &["pull", "--ff-only"], &cwd).await?;
        tracing::info!(git_ref = ?git_ref, "deploy pulled; awaiting service restart");
        Ok(())
    }
}

async fn run_checked(
    program: &str,
    args: &[&str],
    cwd: &std::path::Path,
) -> Result<(), EngineError> {
    let output = tokio::process::Command::new(program)
        .args(args)
        .current_dir(cwd)
        .output()
        .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(EngineError::InvalidCommand(format!(
            "{} {} failed: {}",
            program,
            args.join(" "),
            stderr.trim()
        )));
    }
    Ok(())
}

/// Agent launch line keyed into the pane. The thinking-mode flag is the
/// daemon's uniform contract with the agent CLI shims.
fn launch_command(agent: AgentKind, mode: ThinkingMode, resume: bool) -> String {
    let mut command = String::from(agent.as_str());
    if resume {
        command.push_str(" --continue");
    }
    command.push_str(" --thinking ");
    command.push_str(mode.as_str());
    command
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
