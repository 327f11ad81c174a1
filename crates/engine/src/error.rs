// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type

use crate::routing::RoutingRejection;
use tc_mux::MuxError;
use tc_storage::StorageError;
use thiserror::Error;

/// Errors from pipeline operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("multiplexer error: {0}")]
    Mux(#[from] MuxError),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("session name already in use: {0}")]
    SessionNameClash(String),

    #[error("routing rejected: {0}")]
    Routing(#[from] RoutingRejection),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Transient errors are retried by the queue worker up to the per-kind
    /// attempt ceiling; the rest fail terminally on first occurrence.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EngineError::Mux(MuxError::CommandFailed(_))
                | EngineError::CommandTimeout(_)
                | EngineError::Io(_)
        )
    }
}
