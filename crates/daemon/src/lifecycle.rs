// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon startup and shutdown.
//!
//! Startup order: resolve paths, take the single-instance lock, load
//! configuration, open and migrate storage (fatal on failure), recover
//! in-flight queue rows, warm the snapshot cache, build the engine stack,
//! and bind the Unix socket. No process-wide globals: every component gets
//! its handles through constructors and is closed at shutdown.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tc_adapters::transport::{RedisTransport, RedisTransportConfig};
use tc_adapters::{AdapterClient, LaneConfig};
use tc_core::{Config, ConfigError, SystemClock};
use tc_engine::coordinator::GitWorkingTree;
use tc_engine::outbox::OutboxConfig;
use tc_engine::output_file::OutputFiles;
use tc_engine::{
    AgentCoordinator, EventBus, EventReader, Ingress, OutboxProcessor, PollerConfig,
    QueueWorker, RoutingResolver, SessionManager, SnapshotCache, WorkerConfig,
};
use tc_mux::TmuxMux;
use tc_storage::Storage;
use thiserror::Error;
use tokio::net::UnixListener;
use tokio::sync::watch;

/// Grace period for draining work at shutdown.
pub const SHUTDOWN_GRACE: std::time::Duration = std::time::Duration::from_secs(30);

/// Errors during startup. All fatal: the daemon exits non-zero.
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("no state directory available")]
    NoStateDir,
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("another daemon holds the lock: {0}")]
    LockFailed(std::io::Error),
    #[error("storage error: {0}")]
    Storage(#[from] tc_storage::StorageError),
    #[error("adapter registration failed: {0}")]
    Adapter(#[from] tc_adapters::AdapterError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem layout under the state directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub db_path: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub version_path: PathBuf,
}

impl Paths {
    /// Resolve from `TC_STATE_DIR` or the platform state directory.
    pub fn resolve() -> Result<Self, LifecycleError> {
        let state_dir = match crate::env::state_dir_override() {
            Some(dir) => dir,
            None => dirs::state_dir()
                .or_else(dirs::data_local_dir)
                .ok_or(LifecycleError::NoStateDir)?
                .join("teleclaude"),
        };
        Ok(Self::in_dir(state_dir))
    }

    pub fn in_dir(state_dir: PathBuf) -> Self {
        Self {
            db_path: state_dir.join("teleclaude.db"),
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.lock"),
            log_path: state_dir.join("daemon.log"),
            version_path: state_dir.join("daemon.version"),
            state_dir,
        }
    }
}

/// The wired daemon. Fields are public for the binary and tests.
pub struct Daemon {
    pub config: Arc<Config>,
    pub paths: Paths,
    pub storage: Storage,
    pub bus: EventBus,
    pub cache: SnapshotCache<SystemClock>,
    pub client: AdapterClient,
    pub ingress: Ingress<SystemClock>,
    pub manager: SessionManager<TmuxMux, SystemClock>,
    pub processor: OutboxProcessor<TmuxMux, SystemClock, GitWorkingTree>,
    pub worker: QueueWorker<TmuxMux, SystemClock>,
    pub transport: Option<RedisTransport>,
    pub start_time: Instant,
    pub shutdown_tx: watch::Sender<bool>,
    /// Held for the process lifetime; dropping releases the instance lock.
    _lock: std::fs::File,
}

/// Startup output handed to the binary.
pub struct StartupResult {
    pub daemon: Daemon,
    pub reader: EventReader,
    pub listener: UnixListener,
    pub shutdown_rx: watch::Receiver<bool>,
}

/// Take the exclusive single-instance lock and record our pid.
fn acquire_lock(paths: &Paths) -> Result<std::fs::File, LifecycleError> {
    use fs2::FileExt;
    use std::io::Write;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&paths.lock_path)?;
    file.try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

/// Build the full daemon stack.
pub async fn startup(config_path: &Path) -> Result<StartupResult, LifecycleError> {
    let paths = Paths::resolve()?;
    std::fs::create_dir_all(&paths.state_dir)?;

    let lock = acquire_lock(&paths)?;
    std::fs::write(&paths.version_path, env!("CARGO_PKG_VERSION"))?;

    let config = Arc::new(Config::load(config_path)?);
    tracing::info!(
        computer = %config.computer_name,
        agents = config.agents.len(),
        "configuration loaded"
    );

    // Persistence is fatal on open/migration failure
    let storage = Storage::open(&paths.db_path)?;
    let recovered = storage.recover_in_flight_commands()?;
    if recovered > 0 {
        tracing::warn!(recovered, "re-queued in-flight commands from previous run");
    }

    let (bus, reader) = EventBus::new();
    let clock = SystemClock;

    let cache = SnapshotCache::new(storage.clone(), clock);
    if let Err(e) = cache.warm() {
        // The cache is derived state; a failed warm-up degrades reads, not
        // correctness
        tracing::warn!(error = %e, "snapshot cache warm-up failed");
    }

    let client = AdapterClient::new(storage.clone(), LaneConfig::default());
    for adapter in &config.adapters.enabled {
        // Platform SDK adapters register themselves out of tree via the
        // socket surface; nothing to construct here yet.
        tracing::info!(adapter = %adapter, "adapter enabled in configuration");
    }

    let shell = tc_mux::login_shell_name(config.shell_name.as_deref());
    let mux = TmuxMux::new(shell);
    let outputs = OutputFiles::new(&paths.state_dir);

    let poller_config = PollerConfig {
        idle_notification: std::time::Duration::from_secs(config.idle_notification_seconds),
        ..PollerConfig::default()
    };

    let manager = SessionManager::new(
        storage.clone(),
        mux.clone(),
        clock,
        bus.clone(),
        Arc::clone(&config),
        outputs,
        poller_config,
    );
    let routing = RoutingResolver::new(Arc::clone(&config), storage.clone(), clock);
    let ingress = Ingress::new(storage.clone(), Arc::clone(&config), clock);
    let coordinator = AgentCoordinator::new(
        storage.clone(),
        bus.clone(),
        mux,
        clock,
        GitWorkingTree,
    );
    let processor = OutboxProcessor::new(
        storage.clone(),
        coordinator,
        clock,
        OutboxConfig::default(),
    );
    let worker = QueueWorker::new(
        storage.clone(),
        manager.clone(),
        routing,
        clock,
        ingress.wake_handle(),
        WorkerConfig::default(),
    );

    // Cross-machine transport is optional; an unreachable broker disables
    // it without touching local sessions.
    let transport = match &config.redis_url {
        Some(url) => {
            match RedisTransport::connect(
                url,
                config.computer_name.clone(),
                RedisTransportConfig::default(),
            )
            .await
            {
                Ok(transport) => Some(transport),
                Err(e) => {
                    tracing::warn!(error = %e, "broker unreachable, cross-machine disabled");
                    None
                }
            }
        }
        None => None,
    };

    // Bind the socket last, replacing any stale file from a dead daemon
    let _ = std::fs::remove_file(&paths.socket_path);
    let listener = UnixListener::bind(&paths.socket_path)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    Ok(StartupResult {
        daemon: Daemon {
            config,
            paths,
            storage,
            bus,
            cache,
            client,
            ingress,
            manager,
            processor,
            worker,
            transport,
            start_time: Instant::now(),
            shutdown_tx,
            _lock: lock,
        },
        reader,
        listener,
        shutdown_rx,
    })
}

impl Daemon {
    /// Graceful shutdown: stop claims, flush the outbox, close adapter
    /// lanes, stop pollers. Bounded by [`SHUTDOWN_GRACE`] in the caller.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        self.manager.stop_pollers();
        self.processor.drain_once().await;
        self.client.shutdown().await;
        let _ = std::fs::remove_file(&self.paths.socket_path);
        tracing::info!("daemon shut down");
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
