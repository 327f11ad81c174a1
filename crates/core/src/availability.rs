// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent availability records consulted by the routing resolver.

use crate::session::AgentKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Availability state of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    #[default]
    Available,
    Unavailable,
    Degraded,
}

impl AvailabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AvailabilityStatus::Available => "available",
            AvailabilityStatus::Unavailable => "unavailable",
            AvailabilityStatus::Degraded => "degraded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "available" => Some(AvailabilityStatus::Available),
            "unavailable" => Some(AvailabilityStatus::Unavailable),
            "degraded" => Some(AvailabilityStatus::Degraded),
            _ => None,
        }
    }
}

/// Availability tuple for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentAvailability {
    pub agent: AgentKind,
    pub status: AvailabilityStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unavailable_until: Option<DateTime<Utc>>,
}

impl AgentAvailability {
    pub fn available(agent: AgentKind) -> Self {
        Self {
            agent,
            status: AvailabilityStatus::Available,
            reason: None,
            unavailable_until: None,
        }
    }

    /// Status after expiry clearing: a non-available status whose
    /// `unavailable_until` has passed reads as available, no explicit
    /// clear required.
    pub fn effective_status(&self, now: DateTime<Utc>) -> AvailabilityStatus {
        if self.status == AvailabilityStatus::Available {
            return AvailabilityStatus::Available;
        }
        match self.unavailable_until {
            Some(until) if now >= until => AvailabilityStatus::Available,
            _ => self.status,
        }
    }
}

#[cfg(test)]
#[path = "availability_tests.rs"]
mod tests;
