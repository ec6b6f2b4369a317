// tests/core_properties_tests.rs
//
// End-to-end checks of the admission, dispatch, caching and metrics core
// through the public API only.

use std::sync::Arc;

use crybot_common::models::{Decision, DispatchOutcome, Language, LimitScope};
use crybot_common::traits::{AdminList, Clock};
use crybot_core::cache::{CacheConfig, TtlCache};
use crybot_core::i18n::{self, MessageKey};
use crybot_core::metrics::MetricsRegistry;
use crybot_core::rate_limit::{RateLimitConfig, RateLimiter};
use crybot_core::services::{handler_fn, CommandDispatcher, CommandRegistry, CommandSpec};
use crybot_core::test_utils::ManualClock;
use crybot_core::Error;

fn limiter_with(clock: &ManualClock, actor_limit: u32, actor_window_secs: u64) -> RateLimiter {
    RateLimiter::with_clock(
        RateLimitConfig {
            actor_limit,
            actor_window_secs,
            ..Default::default()
        },
        Arc::new(clock.clone()),
    )
}

#[test]
fn rate_limit_bound() {
    let clock = ManualClock::default();
    let limiter = limiter_with(&clock, 2, 60);
    let t0 = clock.now();

    assert_eq!(limiter.admit("alice", "general", t0), Decision::Allowed);
    assert_eq!(limiter.admit("alice", "general", t0), Decision::Allowed);
    assert_eq!(
        limiter.admit("alice", "general", t0),
        Decision::Denied { retry_after_secs: 60, scope: LimitScope::Actor }
    );
}

#[test]
fn rate_limit_bound_holds_over_any_window() {
    let clock = ManualClock::default();
    let limiter = limiter_with(&clock, 3, 10);

    // One attempt every second for a minute.
    let mut allowed_at = Vec::new();
    for s in 0..60 {
        if limiter.check("bob", "general").is_allowed() {
            allowed_at.push(s);
        }
        clock.advance_secs(1);
    }

    for (i, start) in allowed_at.iter().enumerate() {
        let in_window = allowed_at[i..].iter().take_while(|t| **t < start + 10).count();
        assert!(in_window <= 3, "{} admissions in the window starting at {}", in_window, start);
    }
    assert_eq!(allowed_at.len(), 18);
}

#[test]
fn window_slide() {
    let clock = ManualClock::default();
    let limiter = limiter_with(&clock, 1, 10);

    assert!(limiter.admit("carol", "general", clock.plus_secs(0)).is_allowed());
    assert!(!limiter.admit("carol", "general", clock.plus_secs(5)).is_allowed());
    assert!(limiter.admit("carol", "general", clock.plus_secs(11)).is_allowed());
}

#[test]
fn lru_eviction() {
    let cache: TtlCache<&str> = TtlCache::new("lru", CacheConfig { max_size: 2, default_ttl_secs: 0 });
    cache.set("A", "a", None);
    cache.set("B", "b", None);
    cache.set("C", "c", None);
    assert!(!cache.exists("A"));
    assert!(cache.exists("B") && cache.exists("C"));
    assert_eq!(cache.stats().evictions, 1);

    let cache: TtlCache<&str> = TtlCache::new("lru", CacheConfig { max_size: 2, default_ttl_secs: 0 });
    cache.set("A", "a", None);
    cache.set("B", "b", None);
    assert_eq!(cache.get("A"), Some("a"));
    cache.set("C", "c", None);
    assert!(cache.exists("A"));
    assert!(!cache.exists("B"));
}

#[test]
fn ttl_expiry() {
    let clock = ManualClock::default();
    let cache = TtlCache::with_clock("ttl", CacheConfig::default(), Arc::new(clock.clone()));
    cache.set("k", "v".to_string(), Some(1));
    assert_eq!(cache.get("k").as_deref(), Some("v"));
    let misses = cache.stats().misses;

    clock.advance_millis(1_001);
    assert_eq!(cache.get("k"), None);
    assert_eq!(cache.stats().misses, misses + 1);
}

struct Fixture {
    dispatcher: CommandDispatcher,
    limiter: Arc<RateLimiter>,
    cache: Arc<TtlCache<String>>,
    metrics: Arc<MetricsRegistry>,
}

fn fixture(actor_limit: u32) -> Fixture {
    let clock = ManualClock::default();
    let limiter = Arc::new(limiter_with(&clock, actor_limit, 60));
    let cache = Arc::new(TtlCache::with_clock("answers", CacheConfig::default(), Arc::new(clock)));
    let metrics = Arc::new(MetricsRegistry::new());

    let mut registry = CommandRegistry::new();
    let memo = cache.clone();
    registry.register(
        CommandSpec::new(
            "answer",
            handler_fn(move |ctx| Ok(Some(memo.get_or_insert_with(&ctx.command, None, || "42".to_string())))),
        )
        .aliases(["/answer"]),
    );
    registry.register(
        CommandSpec::new("purge", handler_fn(|_| Ok(Some("purged".into()))))
            .requires_admin()
            .dm_only(),
    );

    let dispatcher = CommandDispatcher::new(
        Arc::new(registry),
        limiter.clone(),
        Arc::new(AdminList::new(["admin"])),
        metrics.clone(),
        Language::En,
    );
    Fixture { dispatcher, limiter, cache, metrics }
}

#[tokio::test]
async fn unknown_input_is_idempotent() -> Result<(), Error> {
    let f = fixture(10);
    f.dispatcher.dispatch("/answer", "dave", "general", false).await?;
    let cache_before = f.cache.stats();
    let history_before = f.metrics.history_len();

    for _ in 0..3 {
        let out = f.dispatcher.dispatch("gibberish", "dave", "general", false).await?;
        assert_eq!(out, DispatchOutcome::unhandled());
    }

    assert_eq!(f.cache.stats(), cache_before);
    assert_eq!(f.limiter.tracked_actors(), 1);
    assert_eq!(f.metrics.history_len(), history_before);
    Ok(())
}

#[tokio::test]
async fn capability_gate_precedes_rate_limit() -> Result<(), Error> {
    let f = fixture(1);

    // Use up the actor budget first so a rate-limit refusal would be possible.
    f.dispatcher.dispatch("answer", "erin", "dm-erin", true).await?;

    let out = f.dispatcher.dispatch("purge", "erin", "dm-erin", true).await?;
    assert_eq!(out.reply.as_deref(), Some(i18n::text(Language::En, MessageKey::AdminOnly)));

    let out = f.dispatcher.dispatch("purge", "erin", "general", false).await?;
    assert_eq!(out.reply.as_deref(), Some(i18n::text(Language::En, MessageKey::DmOnly)));

    let out = f.dispatcher.dispatch("answer", "erin", "dm-erin", true).await?;
    assert!(out.reply.unwrap_or_default().contains("Try again in"));
    Ok(())
}

#[test]
fn metrics_round_trip() {
    let metrics = MetricsRegistry::new();
    let counter = metrics.counter("bot_commands_total", &[("command", "answer")]);
    counter.increment(3.0);
    counter.increment(2.0);

    assert_eq!(counter.value(), 5.0);
    let text = metrics.export_text();
    assert!(
        text.lines().any(|l| l == r#"bot_commands_total{command="answer"} 5"#),
        "export was:\n{}",
        text
    );
}
