// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-Streams transport implementation.
//!
//! Each computer consumes the request stream named for its identity.
//! Responses are written to `output:{message_id}`. Heartbeats refresh
//! `registry:{computer}` with a TTL. If the broker is unreachable,
//! cross-machine operations are disabled; local sessions are unaffected.

use super::{
    registry_key, request_stream, response_stream, PeerInfo, RemoteRequest, RemoteResponse,
    Transport, TransportError,
};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Transport tuning.
#[derive(Debug, Clone)]
pub struct RedisTransportConfig {
    /// Heartbeat TTL in seconds; heartbeats refresh at a fraction of this.
    pub registry_ttl_secs: u64,
    /// How long response streams linger before expiry.
    pub response_ttl_secs: u64,
    /// Poll block interval while serving the request stream.
    pub serve_block_ms: u64,
}

impl Default for RedisTransportConfig {
    fn default() -> Self {
        Self {
            registry_ttl_secs: 30,
            response_ttl_secs: 300,
            serve_block_ms: 1000,
        }
    }
}

/// Redis-backed cross-machine transport.
#[derive(Clone)]
pub struct RedisTransport {
    client: redis::Client,
    computer: String,
    config: RedisTransportConfig,
}

/// An inbound request paired with its response channel. The serve loop
/// hands these to the engine; the engine answers on the oneshot.
pub type InboundRequest = (RemoteRequest, oneshot::Sender<RemoteResponse>);

impl RedisTransport {
    /// Connect and verify the broker is reachable.
    pub async fn connect(
        url: &str,
        computer: impl Into<String>,
        config: RedisTransportConfig,
    ) -> Result<Self, TransportError> {
        let client =
            redis::Client::open(url).map_err(|e| TransportError::Broker(e.to_string()))?;
        let transport = Self {
            client,
            computer: computer.into(),
            config,
        };
        // Fail startup-time configuration errors loudly; later broker
        // outages degrade to disabled cross-machine operation instead.
        let mut conn = transport.connection().await?;
        let _: () = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| TransportError::Broker(e.to_string()))?;
        Ok(transport)
    }

    pub fn computer(&self) -> &str {
        &self.computer
    }

    async fn connection(&self) -> Result<MultiplexedConnection, TransportError> {
        self.client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(|e| TransportError::Broker(e.to_string()))
    }

    /// Serve inbound requests from this computer's stream until the
    /// receiver side of `inbound` closes. Spawned as a daemon task.
    pub async fn serve(&self, inbound: mpsc::Sender<InboundRequest>) {
        let stream = request_stream(&self.computer);
        let mut last_id = "$".to_string();

        loop {
            if inbound.is_closed() {
                return;
            }
            let mut conn = match self.connection().await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!(error = %e, "broker unreachable, transport idle");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            let options = StreamReadOptions::default()
                .block(self.config.serve_block_ms as usize)
                .count(16);
            let reply: Result<StreamReadReply, _> = conn
                .xread_options(&[stream.as_str()], &[last_id.as_str()], &options)
                .await;

            let reply = match reply {
                Ok(reply) => reply,
                Err(e) => {
                    tracing::warn!(error = %e, "request stream read failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            for key in reply.keys {
                for entry in key.ids {
                    last_id = entry.id.clone();
                    let request = match parse_request(&entry) {
                        Ok(request) => request,
                        Err(e) => {
                            tracing::warn!(stream_id = %entry.id, error = %e, "dropping malformed request frame");
                            continue;
                        }
                    };

                    let (reply_tx, reply_rx) = oneshot::channel();
                    let message_id = request.message_id.clone();
                    if inbound.send((request, reply_tx)).await.is_err() {
                        return;
                    }
                    match reply_rx.await {
                        Ok(response) => {
                            if let Err(e) = self.write_response(&response).await {
                                tracing::error!(
                                    message_id = %message_id,
                                    error = %e,
                                    "failed to write remote response"
                                );
                            }
                        }
                        Err(_) => {
                            tracing::warn!(message_id = %message_id, "request handler dropped without responding");
                        }
                    }
                }
            }
        }
    }

    async fn write_response(&self, response: &RemoteResponse) -> Result<(), TransportError> {
        let mut conn = self.connection().await?;
        let stream = response_stream(&response.message_id);
        let payload = serde_json::to_string(response)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        let _: String = conn
            .xadd(&stream, "*", &[("payload", payload.as_str())])
            .await
            .map_err(|e| TransportError::Broker(e.to_string()))?;
        let _: bool = conn
            .expire(&stream, self.config.response_ttl_secs as i64)
            .await
            .map_err(|e| TransportError::Broker(e.to_string()))?;
        Ok(())
    }
}

fn parse_request(entry: &redis::streams::StreamId) -> Result<RemoteRequest, TransportError> {
    let value = entry
        .map
        .get("payload")
        .ok_or_else(|| TransportError::Malformed("missing payload field".to_string()))?;
    let raw: String = redis::from_redis_value(value)
        .map_err(|e| TransportError::Malformed(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| TransportError::Malformed(e.to_string()))
}

fn parse_response(entry: &redis::streams::StreamId) -> Result<RemoteResponse, TransportError> {
    let value = entry
        .map
        .get("payload")
        .ok_or_else(|| TransportError::Malformed("missing payload field".to_string()))?;
    let raw: String = redis::from_redis_value(value)
        .map_err(|e| TransportError::Malformed(e.to_string()))?;
    serde_json::from_str(&raw).map_err(|e| TransportError::Malformed(e.to_string()))
}

#[async_trait]
impl Transport for RedisTransport {
    async fn send_request(
        &self,
        to: &str,
        request: RemoteRequest,
        deadline: Duration,
    ) -> Result<RemoteResponse, TransportError> {
        let mut conn = self.connection().await?;

        // Reject immediately when the peer's heartbeat has expired; no
        // stream write occurs.
        let alive: Option<String> = conn
            .get(registry_key(to))
            .await
            .map_err(|e| TransportError::Broker(e.to_string()))?;
        if alive.is_none() {
            return Err(TransportError::PeerUnavailable(to.to_string()));
        }

        let payload = serde_json::to_string(&request)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        let _: String = conn
            .xadd(
                request_stream(to),
                "*",
                &[("payload", payload.as_str())],
            )
            .await
            .map_err(|e| TransportError::Broker(e.to_string()))?;

        // Await the correlated response with an explicit deadline.
        let stream = response_stream(&request.message_id);
        let deadline_at = tokio::time::Instant::now() + deadline;
        let mut last_id = "0".to_string();
        loop {
            let remaining = deadline_at.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::Timeout(deadline));
            }
            let block_ms = remaining.as_millis().min(1000) as usize;
            let options = StreamReadOptions::default().block(block_ms).count(1);
            let reply: StreamReadReply = conn
                .xread_options(&[stream.as_str()], &[last_id.as_str()], &options)
                .await
                .map_err(|e| TransportError::Broker(e.to_string()))?;

            for key in reply.keys {
                for entry in key.ids {
                    last_id = entry.id.clone();
                    return parse_response(&entry);
                }
            }
        }
    }

    async fn advertise_heartbeat(&self) -> Result<(), TransportError> {
        let mut conn = self.connection().await?;
        let info = PeerInfo {
            name: self.computer.clone(),
            last_heartbeat: chrono::Utc::now(),
            capabilities: vec!["sessions".to_string()],
        };
        let payload = serde_json::to_string(&info)
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        let _: () = conn
            .set_ex(
                registry_key(&self.computer),
                payload,
                self.config.registry_ttl_secs,
            )
            .await
            .map_err(|e| TransportError::Broker(e.to_string()))?;
        Ok(())
    }

    async fn discover_peers(&self) -> Result<Vec<PeerInfo>, TransportError> {
        let mut conn = self.connection().await?;
        let keys: Vec<String> = conn
            .keys("registry:*")
            .await
            .map_err(|e| TransportError::Broker(e.to_string()))?;
        let mut peers = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn
                .get(&key)
                .await
                .map_err(|e| TransportError::Broker(e.to_string()))?;
            let Some(raw) = raw else { continue };
            match serde_json::from_str::<PeerInfo>(&raw) {
                Ok(info) => peers.push(info),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "skipping malformed registry entry");
                }
            }
        }
        peers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(peers)
    }
}

#[cfg(test)]
#[path = "redis_tests.rs"]
mod tests;
