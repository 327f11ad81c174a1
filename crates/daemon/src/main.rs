// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TeleClaude daemon (tcd)
//!
//! Background process bridging agent terminal sessions to chat surfaces.
//!
//! Architecture:
//! - Listener task: Unix-socket I/O (command ingress, hook receiver)
//! - Queue workers: one task per source class executing commands
//! - Outbox processor: drains hook rows into the agent coordinator
//! - Event loop: routes bus events into fan-out and the snapshot cache

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;
use std::time::Duration;

use tc_adapters::transport::Transport;
use tc_core::Config;
use tc_daemon::lifecycle::{self, LifecycleError, Paths, StartupResult, SHUTDOWN_GRACE};
use tc_daemon::listener::{ListenCtx, Listener};
use tc_daemon::env as tc_env;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("tcd {}", env!("CARGO_PKG_VERSION"));
                return std::process::ExitCode::SUCCESS;
            }
            "--help" | "-h" | "help" => {
                println!("tcd {}", env!("CARGO_PKG_VERSION"));
                println!("TeleClaude daemon - bridges agent terminal sessions to chat surfaces");
                println!();
                println!("USAGE:");
                println!("    tcd");
                println!();
                println!("The daemon is typically started by the service manager and talks");
                println!("to adapters, the MCP wrapper, and the CLI over a Unix socket.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return std::process::ExitCode::SUCCESS;
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: tcd [--help | --version]");
                return std::process::ExitCode::FAILURE;
            }
        }
    }

    let Some(config_path) = Config::default_path() else {
        eprintln!("error: no config directory available");
        return std::process::ExitCode::FAILURE;
    };

    let paths = match Paths::resolve() {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("error: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    rotate_log_if_needed(&paths.log_path);
    if let Err(e) = write_startup_marker(&paths.log_path) {
        eprintln!("error: cannot write log: {e}");
        return std::process::ExitCode::FAILURE;
    }
    let log_guard = match setup_logging(&paths.log_path) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("error: cannot set up logging: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!("starting daemon");

    let StartupResult {
        daemon,
        mut reader,
        listener,
        shutdown_rx,
    } = match lifecycle::startup(&config_path).await {
        Ok(result) => result,
        Err(LifecycleError::LockFailed(_)) => {
            // Another daemon is already running - print a human-readable
            // message instead of a raw debug error.
            let pid = std::fs::read_to_string(&paths.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            eprintln!("tcd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            return std::process::ExitCode::FAILURE;
        }
        Err(e) => {
            write_startup_error(&paths.log_path, &e);
            error!("failed to start daemon: {e}");
            drop(log_guard);
            return std::process::ExitCode::FAILURE;
        }
    };

    // Listener task (socket ingress + hook receiver)
    let ctx = Arc::new(ListenCtx {
        ingress: daemon.ingress.clone(),
        processor: daemon.processor.clone(),
        cache: daemon.cache.clone(),
        storage: daemon.storage.clone(),
        manager: daemon.manager.clone(),
        computer: daemon.config.computer_name.clone(),
        start_time: daemon.start_time,
        shutdown_tx: daemon.shutdown_tx.clone(),
    });
    tokio::spawn(Listener::new(listener, ctx).run());

    // Queue workers, one per source class
    let worker_tasks = daemon.worker.spawn_all(shutdown_rx.clone());

    // Outbox drain + watchdog
    let processor = daemon.processor.clone();
    let outbox_shutdown = shutdown_rx.clone();
    let outbox_task = tokio::spawn(async move { processor.run(outbox_shutdown).await });

    spawn_sweep(&daemon, shutdown_rx.clone());
    spawn_prune(&daemon, shutdown_rx.clone());
    if daemon.transport.is_some() {
        spawn_transport(&daemon, shutdown_rx.clone());
    }

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!("signal handler setup failed: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!("signal handler setup failed: {e}");
            return std::process::ExitCode::FAILURE;
        }
    };

    info!(
        socket = %daemon.paths.socket_path.display(),
        "daemon ready"
    );
    println!("READY");

    let mut shutdown_watch = shutdown_rx.clone();

    // Event loop: route bus events into the cache and the fan-out lanes
    loop {
        tokio::select! {
            event = reader.recv() => {
                match event {
                    Some(event) => {
                        daemon.cache.apply(&event);
                        let origin = event
                            .session_id()
                            .and_then(|id| daemon.cache.session_origin(id));
                        daemon.client.dispatch(&event, origin.as_deref());
                    }
                    None => {
                        info!("event bus closed, shutting down");
                        break;
                    }
                }
            }
            _ = shutdown_watch.changed() => {
                if *shutdown_watch.borrow() {
                    info!("shutdown requested via socket");
                    break;
                }
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
                break;
            }
            _ = sigint.recv() => {
                info!("received SIGINT, shutting down");
                break;
            }
        }
    }

    // Graceful shutdown with a bounded grace period
    let shutdown = async {
        daemon.shutdown().await;
        for task in worker_tasks {
            let _ = task.await;
        }
        let _ = outbox_task.await;
    };
    if tokio::time::timeout(SHUTDOWN_GRACE, shutdown).await.is_err() {
        error!("shutdown grace period expired, exiting anyway");
    }

    info!("daemon stopped");
    std::process::ExitCode::SUCCESS
}

/// Periodic reconciliation of pane liveness against the session table.
fn spawn_sweep(daemon: &lifecycle::Daemon, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let manager = daemon.manager.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(tc_env::sweep_interval());
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    match manager.sweep().await {
                        Ok(0) => {}
                        Ok(reaped) => info!(reaped, "sweep reaped dead sessions"),
                        Err(e) => error!(error = %e, "sweep failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });
}

/// Periodic pruning of terminal queue/outbox rows and old delivery digests.
fn spawn_prune(daemon: &lifecycle::Daemon, mut shutdown: tokio::sync::watch::Receiver<bool>) {
    let storage = daemon.storage.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(tc_env::prune_interval());
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let cutoff = chrono::Utc::now() - tc_env::prune_age();
                    let queue = storage.prune_queue(cutoff).unwrap_or(0);
                    let outbox = storage.prune_outbox(cutoff).unwrap_or(0);
                    let digests = storage.prune_deliveries(cutoff).unwrap_or(0);
                    if queue + outbox + digests > 0 {
                        info!(queue, outbox, digests, "pruned old rows");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });
}

/// Cross-machine supervision: serve inbound requests, advertise heartbeats,
/// and surface peer heartbeats as events.
fn spawn_transport(daemon: &lifecycle::Daemon, shutdown: tokio::sync::watch::Receiver<bool>) {
    let Some(transport) = daemon.transport.clone() else {
        return;
    };
    let computer = daemon.config.computer_name.clone();

    // Inbound request serving: payloads are commands for the local queue
    let (inbound_tx, mut inbound_rx) = tokio::sync::mpsc::channel(64);
    {
        let transport = transport.clone();
        tokio::spawn(async move { transport.serve(inbound_tx).await });
    }
    {
        let ingress = daemon.ingress.clone();
        let cache = daemon.cache.clone();
        tokio::spawn(async move {
            while let Some((request, reply)) = inbound_rx.recv().await {
                let response = crate::remote::handle(&ingress, &cache, request);
                let _ = reply.send(response);
            }
        });
    }

    // Heartbeat + peer discovery
    let bus = daemon.bus.clone();
    let mut shutdown = shutdown;
    tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(Duration::from_secs(10));
        let mut discover = tokio::time::interval(Duration::from_secs(30));
        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = transport.advertise_heartbeat().await {
                        tracing::warn!(error = %e, "heartbeat failed");
                    }
                }
                _ = discover.tick() => {
                    match transport.discover_peers().await {
                        Ok(peers) => {
                            for peer in peers {
                                if peer.name != computer {
                                    bus.send(tc_core::Event::ComputerHeartbeat {
                                        computer: peer.name,
                                        at: peer.last_heartbeat,
                                    });
                                }
                            }
                        }
                        Err(e) => tracing::warn!(error = %e, "peer discovery failed"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return;
                    }
                }
            }
        }
    });
}

mod remote {
    //! Inbound cross-machine request handling.

    use tc_adapters::transport::{RemoteRequest, RemoteResponse};
    use tc_core::{Command, CommandSource, SystemClock};
    use tc_engine::{Ingress, SnapshotCache};

    /// Interpret a remote payload: either a command for the local queue or
    /// a digest notification that refreshes the local cache.
    pub fn handle(
        ingress: &Ingress<SystemClock>,
        cache: &SnapshotCache<SystemClock>,
        request: RemoteRequest,
    ) -> RemoteResponse {
        let message_id = request.message_id.clone();

        if request.payload.get("digest").is_some() {
            // Peer state changed; refresh derived views without data pull
            if let Err(e) = cache.warm() {
                tracing::warn!(error = %e, "cache refresh after peer digest failed");
            }
            return RemoteResponse {
                message_id,
                ok: true,
                payload: serde_json::json!({ "refreshed": true }),
            };
        }

        let command: Command = match serde_json::from_value(request.payload.clone()) {
            Ok(command) => command,
            Err(e) => {
                return RemoteResponse {
                    message_id,
                    ok: false,
                    payload: serde_json::json!({ "error": format!("bad payload: {e}") }),
                };
            }
        };

        let dedup_key = Some(format!("remote:{}", message_id));
        match ingress.submit(command, CommandSource::Redis, dedup_key, None) {
            Ok(receipt) => RemoteResponse {
                message_id,
                ok: true,
                payload: serde_json::json!({
                    "entry_id": receipt.entry_id,
                    "duplicate": receipt.duplicate,
                }),
            },
            Err(e) => RemoteResponse {
                message_id,
                ok: false,
                payload: serde_json::json!({ "error": e.to_string() }),
            },
        }
    }
}

/// Maximum log file size before rotation (10 MB).
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Number of rotated log files to keep (daemon.log.1, .2, .3).
const MAX_ROTATED_LOGS: u32 = 3;

/// Rotate the daemon log file if it exceeds [`MAX_LOG_SIZE`].
///
/// Shifts `daemon.log` -> `daemon.log.1` -> `daemon.log.2` -> `daemon.log.3`,
/// deleting the oldest. Best-effort: rotation failures are silently ignored
/// so the daemon still starts.
fn rotate_log_if_needed(log_path: &std::path::Path) {
    let size = match std::fs::metadata(log_path) {
        Ok(m) => m.len(),
        Err(_) => return,
    };
    if size < MAX_LOG_SIZE {
        return;
    }

    let log_str = log_path.display().to_string();
    for i in (1..MAX_ROTATED_LOGS).rev() {
        let from = format!("{log_str}.{i}");
        let to = format!("{log_str}.{}", i + 1);
        let _ = std::fs::rename(&from, &to);
    }
    let _ = std::fs::rename(log_path, format!("{log_str}.1"));
}

/// Startup marker prefix written to log before anything else.
/// Full format: "--- tcd: starting (pid: 12345) ---"
const STARTUP_MARKER_PREFIX: &str = "--- tcd: starting (pid: ";

/// Write startup marker to log file (appends to existing log)
fn write_startup_marker(log_path: &std::path::Path) -> std::io::Result<()> {
    use std::io::Write;

    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)?;
    writeln!(file, "{}{}) ---\n", STARTUP_MARKER_PREFIX, std::process::id())?;
    Ok(())
}

/// Write startup error synchronously to log file.
/// This ensures the error is visible even if the process exits quickly.
fn write_startup_error(log_path: &std::path::Path, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR failed to start daemon: {error}");
}

fn setup_logging(
    log_path: &std::path::Path,
) -> std::io::Result<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let parent = log_path
        .parent()
        .ok_or_else(|| std::io::Error::other("log path has no parent"))?;
    std::fs::create_dir_all(parent)?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| std::io::Error::other("log path has no file name"))?;

    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
