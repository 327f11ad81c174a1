// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent-routing resolver.
//!
//! The single canonical policy for every launch path: an agent is routable
//! iff it is known, enabled in configuration, not unavailable, and not
//! degraded. Availability expiry clears on read. A failing availability
//! lookup fails CLOSED: no caller may fall back to an enabled-only check.

use std::sync::Arc;
use tc_core::{AgentKind, AvailabilityStatus, Clock, CommandSource, Config, ThinkingMode};
use tc_storage::Storage;
use thiserror::Error;

/// Deterministic routing rejection, identical at every call site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingRejection {
    #[error("unknown agent '{0}'")]
    UnknownAgent(String),
    #[error("agent '{0}' is disabled in configuration")]
    Disabled(String),
    #[error("agent '{agent}' is unavailable{}", fmt_reason(.reason))]
    Unavailable {
        agent: String,
        reason: Option<String>,
    },
    #[error("agent '{agent}' is degraded{}", fmt_reason(.reason))]
    Degraded {
        agent: String,
        reason: Option<String>,
    },
    #[error("no routable agent")]
    NoRoutableAgent,
    #[error("availability lookup failed: {0}")]
    AvailabilityLookupFailed(String),
}

fn fmt_reason(reason: &Option<String>) -> String {
    match reason {
        Some(reason) => format!(": {}", reason),
        None => String::new(),
    }
}

impl RoutingRejection {
    /// Stable reason code for logs and adapter messages.
    pub fn reason_code(&self) -> &'static str {
        match self {
            RoutingRejection::UnknownAgent(_) => "unknown_agent",
            RoutingRejection::Disabled(_) => "disabled",
            RoutingRejection::Unavailable { .. } => "unavailable",
            RoutingRejection::Degraded { .. } => "degraded",
            RoutingRejection::NoRoutableAgent => "no_routable_agent",
            RoutingRejection::AvailabilityLookupFailed(_) => "availability_lookup_failed",
        }
    }
}

/// Canonical resolver; cheap to clone and shared by all launch paths.
#[derive(Clone)]
pub struct RoutingResolver<C: Clock> {
    config: Arc<Config>,
    storage: Storage,
    clock: C,
}

impl<C: Clock> RoutingResolver<C> {
    pub fn new(config: Arc<Config>, storage: Storage, clock: C) -> Self {
        Self {
            config,
            storage,
            clock,
        }
    }

    /// Resolve a requested agent name (empty = implicit selection) to a
    /// normalized agent, or a deterministic rejection with reason.
    pub fn resolve(
        &self,
        requested: &str,
        source: CommandSource,
        mode: ThinkingMode,
    ) -> Result<AgentKind, RoutingRejection> {
        let result = if requested.is_empty() {
            self.resolve_implicit()
        } else {
            self.resolve_named(requested)
        };

        match &result {
            Ok(agent) => {
                tracing::debug!(
                    agent = %agent,
                    source = %source,
                    mode = %mode.as_str(),
                    "agent routed"
                );
            }
            Err(rejection) => {
                tracing::info!(
                    requested,
                    source = %source,
                    reason = rejection.reason_code(),
                    "agent routing rejected"
                );
            }
        }
        result
    }

    fn resolve_named(&self, requested: &str) -> Result<AgentKind, RoutingRejection> {
        let agent = AgentKind::parse(requested)
            .ok_or_else(|| RoutingRejection::UnknownAgent(requested.to_string()))?;
        if !self.config.agent_enabled(agent) {
            return Err(RoutingRejection::Disabled(requested.to_string()));
        }
        self.check_availability(agent)?;
        Ok(agent)
    }

    /// Implicit selection walks the configured agents in stable name order
    /// and returns the first routable one.
    fn resolve_implicit(&self) -> Result<AgentKind, RoutingRejection> {
        let mut lookup_failure = None;
        for agent in self.config.known_agents() {
            if !self.config.agent_enabled(agent) {
                continue;
            }
            match self.check_availability(agent) {
                Ok(()) => return Ok(agent),
                Err(rejection @ RoutingRejection::AvailabilityLookupFailed(_)) => {
                    // Fail closed: a broken lookup cannot make an agent
                    // routable, and it also must not be silently skipped.
                    lookup_failure = Some(rejection);
                }
                Err(_) => {}
            }
        }
        Err(lookup_failure.unwrap_or(RoutingRejection::NoRoutableAgent))
    }

    fn check_availability(&self, agent: AgentKind) -> Result<(), RoutingRejection> {
        let availability = self
            .storage
            .get_availability(agent)
            .map_err(|e| RoutingRejection::AvailabilityLookupFailed(e.to_string()))?;
        let Some(availability) = availability else {
            return Ok(());
        };
        match availability.effective_status(self.clock.now()) {
            AvailabilityStatus::Available => Ok(()),
            AvailabilityStatus::Unavailable => Err(RoutingRejection::Unavailable {
                agent: agent.as_str().to_string(),
                reason: availability.reason,
            }),
            AvailabilityStatus::Degraded => Err(RoutingRejection::Degraded {
                agent: agent.as_str().to_string(),
                reason: availability.reason,
            }),
        }
    }
}

#[cfg(test)]
#[path = "routing_tests.rs"]
mod tests;
