// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-machine transport.
//!
//! Point-to-point, one hop, request/response with correlation ids over a
//! stream broker. The transport carries opaque payloads; request/response
//! pairing is the caller's responsibility and the transport has no
//! awareness of request semantics.

mod peers;
mod redis;

pub use peers::{PeerInfo, PeerRegistry};
pub use redis::{RedisTransport, RedisTransportConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tc_core::MessageId;
use thiserror::Error;

/// Errors from transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("cross-machine transport is not configured")]
    Disabled,
    #[error("peer unavailable: {0}")]
    PeerUnavailable(String),
    #[error("remote request timed out after {0:?}")]
    Timeout(Duration),
    #[error("broker error: {0}")]
    Broker(String),
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// A one-shot request to a peer daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    /// Fresh correlation id; the response arrives on `output:{message_id}`.
    pub message_id: MessageId,
    /// Requesting computer.
    pub from: String,
    pub payload: serde_json::Value,
}

impl RemoteRequest {
    pub fn new(from: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            message_id: MessageId::new(uuid::Uuid::new_v4().to_string()),
            from: from.into(),
            payload,
        }
    }
}

/// Response to a remote request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteResponse {
    pub message_id: MessageId,
    pub ok: bool,
    pub payload: serde_json::Value,
}

/// Stream name a peer consumes requests from.
pub fn request_stream(computer: &str) -> String {
    computer.to_string()
}

/// Stream name a response for `message_id` arrives on.
pub fn response_stream(message_id: &MessageId) -> String {
    format!("output:{}", message_id)
}

/// Heartbeat key for a computer, expiring by TTL.
pub fn registry_key(computer: &str) -> String {
    format!("registry:{}", computer)
}

/// Adapter contract for cross-machine request/response.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send a one-shot request and await its response.
    ///
    /// Fails fast with `PeerUnavailable` when the target is not in the peer
    /// registry (heartbeat expired); nothing is written in that case.
    async fn send_request(
        &self,
        to: &str,
        request: RemoteRequest,
        deadline: Duration,
    ) -> Result<RemoteResponse, TransportError>;

    /// Refresh this computer's heartbeat in the shared registry.
    async fn advertise_heartbeat(&self) -> Result<(), TransportError>;

    /// Peers currently alive in the registry.
    async fn discover_peers(&self) -> Result<Vec<PeerInfo>, TransportError>;
}
