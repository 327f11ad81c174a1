// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable fake UI adapter for tests.

use crate::ui::{AdapterError, UiAdapter};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;
use tc_core::{Event, SessionId};

/// A recorded capability call.
#[derive(Debug, Clone, PartialEq)]
pub enum FakeCall {
    SendMessage { session_id: String, text: String },
    EditMessage { session_id: String, message_id: String, text: String },
    SendFile { session_id: String, name: String },
    CreateChannel { session_id: String, title: String },
    UpdateChannelTitle { session_id: String, title: String },
    SetChannelStatus { session_id: String, status: String },
    OnEvent { event: Event },
}

#[derive(Default)]
struct Inner {
    calls: Vec<FakeCall>,
    ready_sessions: HashSet<String>,
    all_ready: bool,
    fail_deliveries: u32,
    deliver_forever_failing: bool,
    healthy: bool,
    message_counter: u64,
}

/// Fake chat surface. Clones share state.
#[derive(Clone)]
pub struct FakeUiAdapter {
    id: String,
    inner: Arc<Mutex<Inner>>,
}

impl FakeUiAdapter {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            inner: Arc::new(Mutex::new(Inner {
                all_ready: true,
                healthy: true,
                ..Inner::default()
            })),
        }
    }

    /// Gate readiness per session instead of accepting everything.
    pub fn gated(self) -> Self {
        self.inner.lock().all_ready = false;
        self
    }

    pub fn mark_ready(&self, session_id: &SessionId) {
        self.inner
            .lock()
            .ready_sessions
            .insert(session_id.to_string());
    }

    /// Fail the next `n` on_event calls with a platform error.
    pub fn fail_next_deliveries(&self, n: u32) {
        self.inner.lock().fail_deliveries = n;
    }

    /// Fail every delivery until `set_healthy(true)`.
    pub fn fail_forever(&self) {
        let mut inner = self.inner.lock();
        inner.deliver_forever_failing = true;
        inner.healthy = false;
    }

    pub fn set_healthy(&self, healthy: bool) {
        let mut inner = self.inner.lock();
        inner.healthy = healthy;
        if healthy {
            inner.deliver_forever_failing = false;
        }
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.inner.lock().calls.clone()
    }

    /// Events delivered via on_event, in order.
    pub fn delivered_events(&self) -> Vec<Event> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                FakeCall::OnEvent { event } => Some(event.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl UiAdapter for FakeUiAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    async fn send_message(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<String, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(FakeCall::SendMessage {
            session_id: session_id.to_string(),
            text: text.to_string(),
        });
        inner.message_counter += 1;
        Ok(format!("msg-{}", inner.message_counter))
    }

    async fn edit_message(
        &self,
        session_id: &SessionId,
        message_id: &str,
        text: &str,
    ) -> Result<(), AdapterError> {
        self.inner.lock().calls.push(FakeCall::EditMessage {
            session_id: session_id.to_string(),
            message_id: message_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_file(
        &self,
        session_id: &SessionId,
        name: &str,
        _bytes: &[u8],
    ) -> Result<(), AdapterError> {
        self.inner.lock().calls.push(FakeCall::SendFile {
            session_id: session_id.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    async fn create_channel(
        &self,
        session_id: &SessionId,
        title: &str,
    ) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(FakeCall::CreateChannel {
            session_id: session_id.to_string(),
            title: title.to_string(),
        });
        inner.ready_sessions.insert(session_id.to_string());
        Ok(())
    }

    async fn update_channel_title(
        &self,
        session_id: &SessionId,
        title: &str,
    ) -> Result<(), AdapterError> {
        self.inner.lock().calls.push(FakeCall::UpdateChannelTitle {
            session_id: session_id.to_string(),
            title: title.to_string(),
        });
        Ok(())
    }

    async fn set_channel_status(
        &self,
        session_id: &SessionId,
        status: &str,
    ) -> Result<(), AdapterError> {
        self.inner.lock().calls.push(FakeCall::SetChannelStatus {
            session_id: session_id.to_string(),
            status: status.to_string(),
        });
        Ok(())
    }

    async fn channel_ready(&self, session_id: &SessionId) -> Result<bool, AdapterError> {
        let inner = self.inner.lock();
        Ok(inner.all_ready || inner.ready_sessions.contains(session_id.as_str()))
    }

    async fn on_event(&self, event: &Event) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        if inner.deliver_forever_failing {
            return Err(AdapterError::Platform("scripted failure".to_string()));
        }
        if inner.fail_deliveries > 0 {
            inner.fail_deliveries -= 1;
            return Err(AdapterError::Timeout);
        }
        inner.calls.push(FakeCall::OnEvent {
            event: event.clone(),
        });
        Ok(())
    }

    async fn health_check(&self) -> Result<(), AdapterError> {
        if self.inner.lock().healthy {
            Ok(())
        } else {
            Err(AdapterError::Platform("unhealthy".to_string()))
        }
    }
}
