// crybot-core/src/tasks/maintenance.rs

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::cache::Sweepable;
use crate::config::MaintenanceConfig;
use crate::metrics::{names, MetricsRegistry};
use crate::rate_limit::RateLimiter;

/// What one sweep removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    pub expired_entries: usize,
    pub pruned_samples: usize,
}

/// One sweep: drop expired cache entries, prune old metric history and
/// refresh the cache and rate-limit gauges.
pub fn run_maintenance_pass(
    caches: &[Arc<dyn Sweepable>],
    metrics: &MetricsRegistry,
    limiter: &RateLimiter,
    metrics_max_age_secs: i64,
) -> MaintenanceReport {
    let mut report = MaintenanceReport::default();

    for cache in caches {
        let removed = cache.cleanup_expired();
        report.expired_entries += removed;

        let stats = cache.stats();
        metrics
            .gauge(names::CACHE_ENTRIES, &[("cache", cache.name())])
            .set(stats.size as f64);
        metrics
            .gauge(names::CACHE_HIT_RATE, &[("cache", cache.name())])
            .set(stats.hit_rate);
        if removed > 0 {
            debug!("Cache '{}': {} expired entries removed", cache.name(), removed);
        }
    }

    metrics
        .gauge(names::RATELIMIT_TRACKED, &[("scope", "actor")])
        .set(limiter.tracked_actors() as f64);
    metrics
        .gauge(names::RATELIMIT_TRACKED, &[("scope", "channel")])
        .set(limiter.tracked_channels() as f64);
    metrics
        .gauge(names::ACTIVE_USERS, &[])
        .set(limiter.active_actors() as f64);

    report.pruned_samples = metrics.prune_older_than(metrics_max_age_secs);
    report
}

/// Runs [`run_maintenance_pass`] every `config.interval_secs` until
/// `shutdown_rx` turns true.
pub fn spawn_maintenance_task(
    caches: Vec<Arc<dyn Sweepable>>,
    metrics: Arc<MetricsRegistry>,
    limiter: Arc<RateLimiter>,
    config: MaintenanceConfig,
    mut shutdown_rx: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(config.interval_secs.max(1));
    tokio::spawn(async move {
        info!("Maintenance task started (every {}s)", interval.as_secs());
        loop {
            tokio::select! {
                _ = sleep(interval) => {
                    let report = run_maintenance_pass(&caches, &metrics, &limiter, config.metrics_max_age_secs);
                    debug!(
                        "Maintenance pass: {} expired cache entries, {} metric samples pruned",
                        report.expired_entries, report.pruned_samples
                    );
                }
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        info!("Maintenance task stopping");
                        break;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, TtlCache};
    use crate::rate_limit::RateLimitConfig;
    use crate::test_utils::ManualClock;

    #[test]
    fn pass_sweeps_caches_and_sets_gauges() {
        let clock = ManualClock::default();
        let cache = Arc::new(TtlCache::<u32>::with_clock(
            "scores",
            CacheConfig::default(),
            Arc::new(clock.clone()),
        ));
        cache.set("short", 1, Some(5));
        cache.set("long", 2, Some(500));
        cache.get("long");

        let limiter = RateLimiter::with_clock(RateLimitConfig::default(), Arc::new(clock.clone()));
        limiter.check("u1", "c1");
        limiter.check("u2", "c1");

        let metrics = MetricsRegistry::with_clock(Arc::new(clock.clone()));
        clock.advance_secs(10);

        let caches: Vec<Arc<dyn Sweepable>> = vec![cache.clone() as Arc<dyn Sweepable>];
        let report = run_maintenance_pass(&caches, &metrics, &limiter, 3600);

        assert_eq!(report.expired_entries, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(metrics.gauge_value(names::CACHE_ENTRIES, &[("cache", "scores")]), Some(1.0));
        assert_eq!(metrics.gauge_value(names::CACHE_HIT_RATE, &[("cache", "scores")]), Some(100.0));
        assert_eq!(metrics.gauge_value(names::RATELIMIT_TRACKED, &[("scope", "actor")]), Some(2.0));
        assert_eq!(metrics.gauge_value(names::RATELIMIT_TRACKED, &[("scope", "channel")]), Some(1.0));
        assert_eq!(metrics.gauge_value(names::ACTIVE_USERS, &[]), Some(2.0));
    }

    #[test]
    fn pass_prunes_metric_history() {
        let clock = ManualClock::default();
        let metrics = MetricsRegistry::with_clock(Arc::new(clock.clone()));
        let limiter = RateLimiter::new(RateLimitConfig::default());
        metrics.counter("old", &[]).inc();
        clock.advance_secs(120);

        let report = run_maintenance_pass(&[], &metrics, &limiter, 60);
        assert_eq!(report.pruned_samples, 1);
        assert_eq!(metrics.counter_value("old", &[]), Some(1.0));
    }

    #[tokio::test]
    async fn task_stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let handle = spawn_maintenance_task(
            Vec::new(),
            Arc::new(MetricsRegistry::new()),
            Arc::new(RateLimiter::new(RateLimitConfig::default())),
            MaintenanceConfig::default(),
            rx,
        );
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("task should stop")
            .unwrap();
    }
}
