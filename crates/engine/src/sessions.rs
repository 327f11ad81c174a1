// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session manager.
//!
//! Lifecycle of agent sessions: spawn the multiplexer pane, persist the
//! row, arm the output poller, and emit domain events. Closure is
//! idempotent; a periodic sweep reconciles pane liveness with the session
//! table and reaps sessions whose panes vanished externally.

use crate::bus::EventBus;
use crate::error::EngineError;
use crate::output_file::OutputFiles;
use crate::poller::{spawn_poller, PollerConfig, PollerDeps, PollerRegistry};
use std::path::PathBuf;
use std::sync::Arc;
use tc_core::{
    AgentKind, Clock, Config, Event, Session, SessionId, SessionStatus, ThinkingMode,
};
use tc_mux::MuxAdapter;
use tc_storage::Storage;

/// Pane geometry for new sessions.
const PANE_COLS: u16 = 200;
const PANE_ROWS: u16 = 50;

/// Parameters for starting a session.
#[derive(Debug, Clone)]
pub struct StartParams {
    pub cwd: PathBuf,
    pub agent: AgentKind,
    pub mode: ThinkingMode,
    pub title: Option<String>,
    /// Adapter that created the session ("api", "telegram", ...).
    pub origin: String,
    pub adapter_meta: serde_json::Value,
    /// Command keyed into the pane right after spawn, with exit marker.
    pub initial_message: Option<String>,
}

/// Manages session lifecycle against the terminal bridge.
#[derive(Clone)]
pub struct SessionManager<M: MuxAdapter, C: Clock> {
    storage: Storage,
    mux: M,
    clock: C,
    bus: EventBus,
    config: Arc<Config>,
    outputs: OutputFiles,
    pollers: PollerRegistry,
    poller_config: PollerConfig,
}

impl<M: MuxAdapter, C: Clock> SessionManager<M, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Storage,
        mux: M,
        clock: C,
        bus: EventBus,
        config: Arc<Config>,
        outputs: OutputFiles,
        poller_config: PollerConfig,
    ) -> Self {
        Self {
            storage,
            mux,
            clock,
            bus,
            config,
            outputs,
            pollers: PollerRegistry::new(),
            poller_config,
        }
    }

    pub fn pollers(&self) -> &PollerRegistry {
        &self.pollers
    }

    /// Start a new session: persist, spawn the pane, arm the poller, emit
    /// `SessionStarted`.
    pub async fn start(&self, params: StartParams) -> Result<Session, EngineError> {
        let id = SessionId::generate();
        let mux_name = id.mux_name();

        // Short-id collision is below practical relevance, but a clash is
        // an invariant violation that must fail the operation loudly.
        if self.storage.mux_name_taken(&mux_name)? {
            tracing::error!(mux_name = %mux_name, "session name clash at creation");
            return Err(EngineError::SessionNameClash(mux_name));
        }

        let now = self.clock.now();
        let session = Session {
            id: id.clone(),
            mux_name: mux_name.clone(),
            cwd: params.cwd.clone(),
            agent: params.agent,
            mode: params.mode,
            title: params.title,
            status: SessionStatus::Active,
            origin: params.origin,
            adapter_meta: params.adapter_meta,
            created_at: now,
            last_activity_at: now,
            closed_at: None,
            computer: self.config.computer_name.clone(),
        };
        self.storage.insert_session(&session)?;

        if let Err(e) = self
            .mux
            .create(&mux_name, &params.cwd, PANE_COLS, PANE_ROWS)
            .await
        {
            // Pane never existed; the row records the failure
            self.storage
                .close_session(&id, SessionStatus::Failed, self.clock.now())?;
            return Err(e.into());
        }

        if let Err(e) = self.outputs.create(session.short_id()) {
            tracing::warn!(session = %session.short_id(), error = %e, "output file create failed");
        }

        let marker = match &params.initial_message {
            Some(text) => self.mux.send_keys(&mux_name, text, true).await?,
            None => None,
        };

        spawn_poller(&self.pollers, &session, marker, self.poller_deps());
        self.bus.send(Event::SessionStarted {
            session: session.clone(),
        });
        tracing::info!(
            session = %session.short_id(),
            agent = %session.agent,
            cwd = %session.cwd.display(),
            "session started"
        );
        Ok(session)
    }

    /// Close a session. Idempotent: closing a terminal session is a no-op
    /// returning `false`.
    pub async fn close(&self, id: &SessionId) -> Result<bool, EngineError> {
        let session = self
            .storage
            .get_session(id)?
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))?;
        if session.is_terminal() {
            return Ok(false);
        }

        self.pollers.shutdown(id);
        if let Err(e) = self.mux.kill(&session.mux_name).await {
            // The pane may already be gone; closure proceeds regardless
            tracing::warn!(session = %session.short_id(), error = %e, "pane kill failed");
        }
        self.storage
            .close_session(id, SessionStatus::Closed, self.clock.now())?;
        self.outputs.delete(session.short_id());
        self.storage.delete_ux_state(id)?;
        self.bus.send(Event::SessionClosed {
            session_id: id.clone(),
        });
        tracing::info!(session = %session.short_id(), "session closed");
        Ok(true)
    }

    pub fn get(&self, id: &SessionId) -> Result<Option<Session>, EngineError> {
        Ok(self.storage.get_session(id)?)
    }

    pub fn list(&self) -> Result<Vec<Session>, EngineError> {
        Ok(self.storage.list_sessions(false)?)
    }

    /// Send text into the session's pane. When the pane is at the shell the
    /// bridge appends an exit marker and the poller is armed with it.
    pub async fn send_message(&self, id: &SessionId, text: &str) -> Result<(), EngineError> {
        let session = self.require_active(id)?;
        let marker = self.mux.send_keys(&session.mux_name, text, true).await?;
        self.storage
            .touch_session_activity(id, self.clock.now())?;

        self.ensure_poller(&session);
        if let Some(marker) = marker {
            self.pollers.set_marker(id, marker);
        }
        Ok(())
    }

    /// Key raw input into the pane with no marker handling (agent launches,
    /// checkpoint injection, interactive input).
    pub async fn send_raw(&self, id: &SessionId, text: &str) -> Result<(), EngineError> {
        let session = self.require_active(id)?;
        self.mux.send_keys(&session.mux_name, text, false).await?;
        self.storage
            .touch_session_activity(id, self.clock.now())?;
        self.ensure_poller(&session);
        Ok(())
    }

    /// Reconcile pane liveness with the session table; sessions whose panes
    /// vanished externally are closed with `SessionDied`. Returns how many
    /// were reaped.
    pub async fn sweep(&self) -> Result<u32, EngineError> {
        let mut reaped = 0;
        for session in self.storage.list_sessions(false)? {
            let alive = match self.mux.exists(&session.mux_name).await {
                Ok(alive) => alive,
                Err(e) => {
                    tracing::warn!(session = %session.short_id(), error = %e, "sweep probe failed");
                    continue;
                }
            };
            if alive {
                continue;
            }
            tracing::info!(session = %session.short_id(), "sweep found dead pane");
            self.pollers.shutdown(&session.id);
            self.storage
                .close_session(&session.id, SessionStatus::Failed, self.clock.now())?;
            self.outputs.delete(session.short_id());
            self.storage.delete_ux_state(&session.id)?;
            self.bus.send(Event::SessionDied {
                session_id: session.id.clone(),
            });
            reaped += 1;
        }
        Ok(reaped)
    }

    /// Stop all pollers (daemon shutdown).
    pub fn stop_pollers(&self) {
        self.pollers.shutdown_all();
    }

    fn require_active(&self, id: &SessionId) -> Result<Session, EngineError> {
        let session = self
            .storage
            .get_session(id)?
            .ok_or_else(|| EngineError::SessionNotFound(id.to_string()))?;
        if session.is_terminal() {
            return Err(EngineError::SessionNotFound(format!(
                "{} (closed)",
                id.short_id()
            )));
        }
        Ok(session)
    }

    /// Re-arm a poller if the previous one terminated (completion stops a
    /// poller; the next command needs a fresh one).
    fn ensure_poller(&self, session: &Session) {
        if !self.pollers.get(&session.id) {
            spawn_poller(&self.pollers, session, None, self.poller_deps());
        }
    }

    fn poller_deps(&self) -> PollerDeps<M, C> {
        PollerDeps {
            mux: self.mux.clone(),
            storage: self.storage.clone(),
            bus: self.bus.clone(),
            outputs: self.outputs.clone(),
            clock: self.clock.clone(),
            config: self.poller_config.clone(),
        }
    }
}

#[cfg(test)]
#[path = "sessions_tests.rs"]
mod tests;
