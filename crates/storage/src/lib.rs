// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tc-storage: SQLite persistence for the TeleClaude daemon.
//!
//! One local database file holds sessions, the durable command queue, the
//! hook outbox, per-platform UX state, agent availability, and the snapshot
//! cache. The cache is a materialized view only; every other table is
//! primary state that must survive restarts.

mod availability;
mod cache;
mod db;
mod outbox;
mod queue;
mod sessions;
mod ux;

pub use db::Storage;
pub use outbox::{OutboxEntry, OutboxState};
pub use queue::{EnqueueOutcome, QueueEntry, QueueState};
pub use ux::DeliveryRecord;

use thiserror::Error;

/// Errors from persistence operations.
///
/// Queue/outbox write failures are durability errors: fatal for the single
/// operation, observed by the caller, never silently swallowed.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("migration v{version} failed: {message}")]
    Migration { version: u32, message: String },
    #[error("corrupt row in {table} (id {id}): {message}")]
    CorruptRow {
        table: &'static str,
        id: String,
        message: String,
    },
}
