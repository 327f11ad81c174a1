// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! UI adapter contract.

use async_trait::async_trait;
use tc_core::{Event, SessionId};
use thiserror::Error;

/// Errors from adapter operations. Always lane-local: a failing adapter
/// never affects delivery to the others.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter call timed out")]
    Timeout,
    #[error("channel for session {0} not ready")]
    ChannelNotReady(String),
    #[error("platform error: {0}")]
    Platform(String),
    #[error("adapter already registered: {0}")]
    DuplicateId(String),
}

/// A human-facing chat surface (Telegram, Discord, REST/WebSocket UI).
///
/// Implementations own platform-specific rendering and UX cleanup; the
/// daemon only speaks this capability set.
#[async_trait]
pub trait UiAdapter: Send + Sync + 'static {
    /// Stable adapter id ("telegram", "discord", "api").
    fn id(&self) -> &str;

    /// Send a new message into the session's channel; returns a
    /// platform-specific message id usable with `edit_message`.
    async fn send_message(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<String, AdapterError>;

    /// Edit a previously sent message in place.
    async fn edit_message(
        &self,
        session_id: &SessionId,
        message_id: &str,
        text: &str,
    ) -> Result<(), AdapterError>;

    /// Send a file (large-output downloads).
    async fn send_file(
        &self,
        session_id: &SessionId,
        name: &str,
        bytes: &[u8],
    ) -> Result<(), AdapterError>;

    /// Create the channel/topic backing a session.
    async fn create_channel(&self, session_id: &SessionId, title: &str)
        -> Result<(), AdapterError>;

    /// Update the channel title.
    async fn update_channel_title(
        &self,
        session_id: &SessionId,
        title: &str,
    ) -> Result<(), AdapterError>;

    /// Set the channel status line (working / idle / done).
    async fn set_channel_status(
        &self,
        session_id: &SessionId,
        status: &str,
    ) -> Result<(), AdapterError>;

    /// Whether the channel for this session has been created and delivery
    /// may proceed. Delivery to non-origin adapters is gated on this.
    async fn channel_ready(&self, session_id: &SessionId) -> Result<bool, AdapterError>;

    /// Render one domain event. The dispatcher calls this once per event on
    /// this adapter's lane.
    async fn on_event(&self, event: &Event) -> Result<(), AdapterError>;

    /// Health probe used to lift lane quarantine.
    async fn health_check(&self) -> Result<(), AdapterError>;
}
