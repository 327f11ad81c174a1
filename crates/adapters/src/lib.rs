// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tc-adapters: adapter registry, fan-out dispatcher, and the optional
//! cross-machine transport.
//!
//! UI adapters render events onto chat surfaces; the transport speaks to
//! peer daemons over a stream broker. Fan-out runs one bounded lane per
//! adapter so a slow or failing surface can never stall another.

mod backoff;
mod client;
pub mod transport;
mod ui;

pub use backoff::Backoff;
pub use client::{AdapterClient, LaneConfig};
pub use ui::{AdapterError, UiAdapter};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeCall, FakeUiAdapter};
