// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unix-socket listener.
//!
//! One task per connection; each request is framed (4-byte length + JSON),
//! dispatched against the engine, and answered on the same stream. Hook
//! requests are durably inserted into the outbox FIRST, then processed
//! synchronously so stop hooks can carry a block payload in their reply.

use crate::protocol::{Request, Response};
use crate::wire;
use std::sync::Arc;
use std::time::Instant;
use tc_core::SystemClock;
use tc_engine::coordinator::GitWorkingTree;
use tc_engine::ingress::IngressError;
use tc_engine::{Ingress, OutboxProcessor, SessionManager, SnapshotCache};
use tc_mux::TmuxMux;
use tc_storage::Storage;
use tokio::net::UnixListener;
use tokio::sync::watch;

/// Shared handles the listener dispatches against.
pub struct ListenCtx {
    pub ingress: Ingress<SystemClock>,
    pub processor: OutboxProcessor<TmuxMux, SystemClock, GitWorkingTree>,
    pub cache: SnapshotCache<SystemClock>,
    pub storage: Storage,
    pub manager: SessionManager<TmuxMux, SystemClock>,
    pub computer: String,
    pub start_time: Instant,
    pub shutdown_tx: watch::Sender<bool>,
}

/// Accept loop. Runs until the shutdown flag flips.
pub struct Listener {
    listener: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(listener: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { listener, ctx }
    }

    pub async fn run(self) {
        let mut shutdown = self.ctx.shutdown_tx.subscribe();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let ctx = Arc::clone(&self.ctx);
                            tokio::spawn(handle_connection(stream, ctx));
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "socket accept failed");
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::debug!("listener stopping");
                        return;
                    }
                }
            }
        }
    }
}

async fn handle_connection(mut stream: tokio::net::UnixStream, ctx: Arc<ListenCtx>) {
    loop {
        let request = match wire::read_request(&mut stream, wire::DEFAULT_TIMEOUT).await {
            Ok(request) => request,
            Err(wire::WireError::ConnectionClosed) | Err(wire::WireError::Timeout) => return,
            Err(e) => {
                tracing::warn!(error = %e, "bad request frame");
                let response = Response::error("bad_request", e.to_string());
                let _ = wire::write_response(&mut stream, &response, wire::DEFAULT_TIMEOUT).await;
                return;
            }
        };

        let response = handle_request(&ctx, request).await;
        if let Err(e) = wire::write_response(&mut stream, &response, wire::DEFAULT_TIMEOUT).await
        {
            tracing::warn!(error = %e, "response write failed");
            return;
        }
    }
}

/// Dispatch one request. Failures become explicit error responses in the
/// originating channel, never silence.
pub async fn handle_request(ctx: &ListenCtx, request: Request) -> Response {
    match request {
        Request::Submit {
            command,
            source,
            dedup_key,
            caller_session_id,
        } => match ctx.ingress.submit(command, source, dedup_key, caller_session_id) {
            Ok(receipt) => Response::Accepted {
                entry_id: receipt.entry_id,
                dedup_key: receipt.dedup_key,
                duplicate: receipt.duplicate,
            },
            Err(e @ IngressError::UntrustedCwd(_)) => {
                Response::error("untrusted_cwd", e.to_string())
            }
            Err(e @ IngressError::Invalid(_)) => Response::error("invalid", e.to_string()),
            Err(e @ IngressError::Durability(_)) => {
                // Durability failures never silently succeed
                Response::error("durability", e.to_string())
            }
        },

        Request::Hook { hook } => {
            // Insert durably first; only then process. Stop hooks need the
            // checkpoint answer before the reply; for other kinds the
            // synchronous pass just keeps the outbox shallow.
            let outbox_id = match ctx.processor.receive(&hook) {
                Ok(id) => id,
                Err(e) => return Response::error("durability", e.to_string()),
            };
            let block_message = match ctx.processor.process_hook_now(outbox_id).await {
                Ok(block) => block.map(|b| b.message),
                Err(e) => {
                    // Row stays claimed; the watchdog re-queues it
                    tracing::error!(outbox_id, error = %e, "synchronous hook processing failed");
                    None
                }
            };
            Response::HookAck {
                outbox_id,
                block_message,
            }
        }

        Request::GetSnapshot {
            entity_kind,
            entity_id,
        } => match ctx.cache.get(&entity_kind, &entity_id) {
            Ok(value) => Response::Snapshot { value },
            Err(e) => Response::error("storage", e.to_string()),
        },

        Request::ListSessions => match ctx.manager.list() {
            Ok(sessions) => Response::Sessions { sessions },
            Err(e) => Response::error("storage", e.to_string()),
        },

        Request::Status => {
            let pending_hooks = ctx.storage.pending_hook_count().unwrap_or(0);
            let schema_version = ctx.storage.schema_version().unwrap_or(0);
            let active_sessions = ctx
                .storage
                .list_sessions(false)
                .map(|s| s.len())
                .unwrap_or(0);
            Response::Status {
                version: env!("CARGO_PKG_VERSION").to_string(),
                computer: ctx.computer.clone(),
                uptime_secs: ctx.start_time.elapsed().as_secs(),
                active_sessions,
                pending_hooks,
                schema_version,
            }
        }

        Request::Shutdown => {
            tracing::info!("shutdown requested via socket");
            let _ = ctx.shutdown_tx.send(true);
            Response::Ok
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
