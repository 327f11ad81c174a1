// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Duration;
use tc_core::test_support::config_fixture;
use tc_core::{AgentAvailability, FakeClock};

fn resolver_with(
    config: Config,
) -> (RoutingResolver<FakeClock>, Storage, FakeClock) {
    let storage = Storage::open_in_memory().unwrap();
    let clock = FakeClock::default();
    let resolver = RoutingResolver::new(Arc::new(config), storage.clone(), clock.clone());
    (resolver, storage, clock)
}

fn resolver() -> (RoutingResolver<FakeClock>, Storage, FakeClock) {
    resolver_with(config_fixture())
}

#[test]
fn known_enabled_available_routes() {
    let (resolver, _storage, _clock) = resolver();
    let agent = resolver
        .resolve("claude", CommandSource::Api, ThinkingMode::Fast)
        .unwrap();
    assert_eq!(agent, AgentKind::Claude);
}

#[test]
fn unknown_agent_rejected() {
    let (resolver, _storage, _clock) = resolver();
    let rejection = resolver
        .resolve("gpt5", CommandSource::Api, ThinkingMode::Fast)
        .unwrap_err();
    assert_eq!(rejection.reason_code(), "unknown_agent");
}

#[test]
fn disabled_agent_rejected() {
    let mut config = config_fixture();
    if let Some(agent) = config.agents.get_mut("codex") {
        agent.enabled = false;
    }
    let (resolver, _storage, _clock) = resolver_with(config);
    let rejection = resolver
        .resolve("codex", CommandSource::Cli, ThinkingMode::Med)
        .unwrap_err();
    assert_eq!(rejection.reason_code(), "disabled");
}

#[test]
fn unavailable_agent_rejected_with_reason() {
    let (resolver, storage, clock) = resolver();
    storage
        .set_availability(&AgentAvailability {
            agent: AgentKind::Claude,
            status: AvailabilityStatus::Unavailable,
            reason: Some("rate limited".to_string()),
            unavailable_until: Some(clock.now() + Duration::hours(1)),
        })
        .unwrap();

    let rejection = resolver
        .resolve("claude", CommandSource::Telegram, ThinkingMode::Fast)
        .unwrap_err();
    assert_eq!(rejection.reason_code(), "unavailable");
    assert!(rejection.to_string().contains("rate limited"));
}

#[test]
fn degraded_agent_rejected() {
    let (resolver, storage, _clock) = resolver();
    storage
        .set_availability(&AgentAvailability {
            agent: AgentKind::Gemini,
            status: AvailabilityStatus::Degraded,
            reason: None,
            unavailable_until: None,
        })
        .unwrap();

    let rejection = resolver
        .resolve("gemini", CommandSource::Api, ThinkingMode::Slow)
        .unwrap_err();
    assert_eq!(rejection.reason_code(), "degraded");
}

#[test]
fn expired_unavailability_clears_on_read() {
    let (resolver, storage, clock) = resolver();
    storage
        .set_availability(&AgentAvailability {
            agent: AgentKind::Claude,
            status: AvailabilityStatus::Unavailable,
            reason: None,
            unavailable_until: Some(clock.now() + Duration::minutes(30)),
        })
        .unwrap();

    clock.advance(Duration::hours(1));
    // No explicit clear happened; expiry alone restores routability
    let agent = resolver
        .resolve("claude", CommandSource::Api, ThinkingMode::Fast)
        .unwrap();
    assert_eq!(agent, AgentKind::Claude);
}

#[test]
fn implicit_selection_skips_unroutable() {
    let (resolver, storage, clock) = resolver();
    storage
        .set_availability(&AgentAvailability {
            agent: AgentKind::Claude,
            status: AvailabilityStatus::Unavailable,
            reason: None,
            unavailable_until: Some(clock.now() + Duration::hours(1)),
        })
        .unwrap();

    // Stable name order: claude excluded, codex is next
    let agent = resolver
        .resolve("", CommandSource::Api, ThinkingMode::Fast)
        .unwrap();
    assert_eq!(agent, AgentKind::Codex);
}

#[test]
fn implicit_selection_with_no_candidates_rejects() {
    let (resolver, storage, clock) = resolver();
    for agent in [AgentKind::Claude, AgentKind::Codex, AgentKind::Gemini] {
        storage
            .set_availability(&AgentAvailability {
                agent,
                status: AvailabilityStatus::Unavailable,
                reason: None,
                unavailable_until: Some(clock.now() + Duration::hours(1)),
            })
            .unwrap();
    }
    let rejection = resolver
        .resolve("", CommandSource::Api, ThinkingMode::Fast)
        .unwrap_err();
    assert_eq!(rejection.reason_code(), "no_routable_agent");
}

#[test]
fn availability_lookup_failure_fails_closed() {
    let (resolver, storage, _clock) = resolver();
    storage.execute_raw("DROP TABLE agent_availability").unwrap();

    let rejection = resolver
        .resolve("claude", CommandSource::Api, ThinkingMode::Fast)
        .unwrap_err();
    assert_eq!(rejection.reason_code(), "availability_lookup_failed");

    // Implicit selection must not degrade to enabled-only either
    let rejection = resolver
        .resolve("", CommandSource::Api, ThinkingMode::Fast)
        .unwrap_err();
    assert_eq!(rejection.reason_code(), "availability_lookup_failed");
}

#[test]
fn single_candidate_lookup_failure_is_fail_closed_per_candidate() {
    let (resolver, storage, _clock) = resolver();
    // Corrupt only claude's availability row so its lookup errors while
    // the other agents read clean
    storage
        .execute_raw(
            "INSERT INTO agent_availability (agent, status) VALUES ('claude', 'bogus')",
        )
        .unwrap();

    // Naming the broken agent surfaces the lookup failure, never a guess
    let rejection = resolver
        .resolve("claude", CommandSource::Api, ThinkingMode::Fast)
        .unwrap_err();
    assert_eq!(rejection.reason_code(), "availability_lookup_failed");

    // Implicit selection treats the erroring candidate as unroutable and
    // still finds the genuinely available one
    let agent = resolver
        .resolve("", CommandSource::Api, ThinkingMode::Fast)
        .unwrap();
    assert_eq!(agent, AgentKind::Codex);
}

#[test]
fn lookup_failure_outranks_no_routable_agent() {
    let (resolver, storage, clock) = resolver();
    storage
        .execute_raw(
            "INSERT INTO agent_availability (agent, status) VALUES ('claude', 'bogus')",
        )
        .unwrap();
    for agent in [AgentKind::Codex, AgentKind::Gemini] {
        storage
            .set_availability(&AgentAvailability {
                agent,
                status: AvailabilityStatus::Unavailable,
                reason: None,
                unavailable_until: Some(clock.now() + Duration::hours(1)),
            })
            .unwrap();
    }

    // No healthy candidate remains; the broken lookup is reported rather
    // than a misleading no_routable_agent
    let rejection = resolver
        .resolve("", CommandSource::Api, ThinkingMode::Fast)
        .unwrap_err();
    assert_eq!(rejection.reason_code(), "availability_lookup_failed");
}

#[test]
fn outcome_is_deterministic_across_call_sites() {
    let (resolver, storage, clock) = resolver();
    storage
        .set_availability(&AgentAvailability {
            agent: AgentKind::Claude,
            status: AvailabilityStatus::Unavailable,
            reason: Some("quota".to_string()),
            unavailable_until: Some(clock.now() + Duration::hours(1)),
        })
        .unwrap();

    // Same (requested, availability) pair, different sources: identical
    // normalized-name-or-reason outcome
    let a = resolver.resolve("claude", CommandSource::Api, ThinkingMode::Fast);
    let b = resolver.resolve("claude", CommandSource::Cron, ThinkingMode::Slow);
    assert_eq!(a, b);
}
