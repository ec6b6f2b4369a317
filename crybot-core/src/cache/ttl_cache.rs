// File: crybot-core/src/cache/ttl_cache.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crybot_common::models::CacheStats;
use crybot_common::traits::{Clock, SystemClock};

use crate::cache::{CacheConfig, Sweepable};
use crate::utils::time::{ceil_secs, seconds_between, secs};

/// Single cached value plus its bookkeeping.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub value: V,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_access: DateTime<Utc>,
    /// Position in the recency order; larger is more recent.
    tick: u64,
}

impl<V> CacheEntry<V> {
    /// An entry is logically gone once `now` is strictly past its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(exp) if now > exp)
    }
}

/// Access metadata for one entry, without the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryInfo {
    pub created_at: DateTime<Utc>,
    pub last_access: DateTime<Utc>,
    pub access_count: u64,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    sets: u64,
    deletes: u64,
    evictions: u64,
    expirations: u64,
}

struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    /// tick -> key, oldest first. Every entry owns exactly one tick.
    order: BTreeMap<u64, String>,
    next_tick: u64,
    counters: Counters,
}

impl<V> CacheState<V> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_tick: 0,
            counters: Counters::default(),
        }
    }

    fn bump_tick(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry<V>> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.tick);
        Some(entry)
    }

    /// Drops the entry if it is expired; returns true when it did.
    fn expire_if_stale(&mut self, key: &str, now: DateTime<Utc>) -> bool {
        let stale = self.entries.get(key).is_some_and(|e| e.is_expired(now));
        if stale {
            self.remove(key);
            self.counters.expirations += 1;
        }
        stale
    }

    fn evict_lru(&mut self) -> Option<String> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        self.counters.evictions += 1;
        Some(key)
    }
}

/// Bounded key/value store with per-entry TTL and strict LRU eviction.
///
/// Every operation takes the single instance lock for its whole duration and
/// never calls out while holding it.
pub struct TtlCache<V> {
    name: String,
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<CacheState<V>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(name: &str, config: CacheConfig) -> Self {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    pub fn with_clock(name: &str, config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        debug!(
            "Creating cache '{}' (max_size={}, default_ttl={}s)",
            name, config.max_size, config.default_ttl_secs
        );
        Self {
            name: name.to_string(),
            config,
            clock,
            state: Mutex::new(CacheState::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Stores `value` under `key`.
    ///
    /// `ttl_secs == None` uses the configured default; `Some(n)` with `n <= 0`,
    /// or too large to represent, stores without expiry. Overwriting refreshes recency; inserting a new
    /// key into a full cache evicts the least-recently-used entry first.
    pub fn set(&self, key: impl Into<String>, value: V, ttl_secs: Option<i64>) {
        let key = key.into();
        let now = self.clock.now();
        let ttl = ttl_secs.unwrap_or(self.config.default_ttl_secs);
        // A TTL past the representable range means no expiry.
        let expires_at = if ttl > 0 { now.checked_add_signed(secs(ttl)) } else { None };

        let mut state = self.state.lock();
        if state.remove(&key).is_none() {
            while state.entries.len() >= self.config.max_size && !state.entries.is_empty() {
                if let Some(evicted) = state.evict_lru() {
                    debug!("Cache '{}' full; evicted LRU key '{}'", self.name, evicted);
                }
            }
        }

        let tick = state.bump_tick();
        state.order.insert(tick, key.clone());
        state.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                value,
                expires_at,
                created_at: now,
                access_count: 0,
                last_access: now,
                tick,
            },
        );
        state.counters.sets += 1;
    }

    /// Returns a clone of the value and marks it most-recently-used.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut guard = self.state.lock();
        let state = &mut *guard;

        if state.expire_if_stale(key, now) {
            trace!("Cache '{}' key '{}' expired on read", self.name, key);
            state.counters.misses += 1;
            return None;
        }

        let tick = state.next_tick;
        let Some(entry) = state.entries.get_mut(key) else {
            state.counters.misses += 1;
            return None;
        };

        state.order.remove(&entry.tick);
        entry.tick = tick;
        entry.access_count += 1;
        entry.last_access = now;
        let value = entry.value.clone();

        state.order.insert(tick, key.to_string());
        state.next_tick += 1;
        state.counters.hits += 1;
        Some(value)
    }

    /// Removes `key`; returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut state = self.state.lock();
        let existed = state.remove(key).is_some();
        if existed {
            state.counters.deletes += 1;
        }
        existed
    }

    /// Presence check that leaves recency and hit/miss counters alone.
    pub fn exists(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if state.expire_if_stale(key, now) {
            return false;
        }
        state.entries.contains_key(key)
    }

    /// Seconds until `key` expires, `-1` if it never does, `None` if absent or expired.
    pub fn ttl_remaining(&self, key: &str) -> Option<i64> {
        let now = self.clock.now();
        let mut state = self.state.lock();
        if state.expire_if_stale(key, now) {
            return None;
        }
        let entry = state.entries.get(key)?;
        match entry.expires_at {
            None => Some(-1),
            Some(exp) => Some(ceil_secs(seconds_between(now, exp)) as i64),
        }
    }

    /// Access metadata for `key`, if it is live.
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        let now = self.clock.now();
        let state = self.state.lock();
        state
            .entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| EntryInfo {
                created_at: e.created_at,
                last_access: e.last_access,
                access_count: e.access_count,
                expires_at: e.expires_at,
            })
    }

    /// Full sweep of expired entries, independent of lazy expiry on access.
    pub fn cleanup_expired(&self) -> usize {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let expired: Vec<String> = state
            .entries
            .values()
            .filter(|e| e.is_expired(now))
            .map(|e| e.key.clone())
            .collect();

        for key in &expired {
            state.remove(key);
        }
        state.counters.expirations += expired.len() as u64;

        if !expired.is_empty() {
            debug!("Cache '{}' swept {} expired entries", self.name, expired.len());
        }
        expired.len()
    }

    /// Returns the cached value or computes, stores and returns a new one.
    /// `compute` runs without the cache lock held.
    pub fn get_or_insert_with<F>(&self, key: &str, ttl_secs: Option<i64>, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(v) = self.get(key) {
            return v;
        }
        let value = compute();
        self.set(key, value.clone(), ttl_secs);
        value
    }

    /// Fallible variant of [`TtlCache::get_or_insert_with`]; errors are not cached.
    pub fn get_or_try_insert_with<F, E>(&self, key: &str, ttl_secs: Option<i64>, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let value = compute()?;
        self.set(key, value.clone(), ttl_secs);
        Ok(value)
    }

    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.order.clear();
    }

    /// Physical size, which may still include entries that expired but were not swept.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let c = &state.counters;
        CacheStats {
            hits: c.hits,
            misses: c.misses,
            sets: c.sets,
            deletes: c.deletes,
            evictions: c.evictions,
            expirations: c.expirations,
            size: state.entries.len(),
            max_size: self.config.max_size,
            total_requests: c.hits + c.misses,
            hit_rate: CacheStats::compute_hit_rate(c.hits, c.misses),
        }
    }
}

impl<V: Clone + Send> Sweepable for TtlCache<V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn cleanup_expired(&self) -> usize {
        TtlCache::cleanup_expired(self)
    }

    fn stats(&self) -> CacheStats {
        TtlCache::stats(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ManualClock;

    fn cache_with(max_size: usize, default_ttl_secs: i64) -> (TtlCache<String>, ManualClock) {
        let clock = ManualClock::default();
        let cache = TtlCache::with_clock(
            "test",
            CacheConfig { max_size, default_ttl_secs },
            Arc::new(clock.clone()),
        );
        (cache, clock)
    }

    #[test]
    fn insertion_beyond_capacity_evicts_oldest() {
        let (cache, _) = cache_with(2, 0);
        cache.set("A", "a".into(), None);
        cache.set("B", "b".into(), None);
        cache.set("C", "c".into(), None);

        assert!(!cache.exists("A"));
        assert!(cache.exists("B"));
        assert!(cache.exists("C"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn get_refreshes_recency() {
        let (cache, _) = cache_with(2, 0);
        cache.set("A", "a".into(), None);
        cache.set("B", "b".into(), None);
        assert_eq!(cache.get("A").as_deref(), Some("a"));
        cache.set("C", "c".into(), None);

        assert!(cache.exists("A"), "A was used most recently and must survive");
        assert!(!cache.exists("B"));
        assert!(cache.exists("C"));
    }

    #[test]
    fn accessing_b_then_inserting_c_evicts_a() {
        let (cache, _) = cache_with(2, 0);
        cache.set("A", "a".into(), None);
        cache.set("B", "b".into(), None);
        cache.get("B");
        cache.set("C", "c".into(), None);

        assert!(!cache.exists("A"));
        assert!(cache.exists("B"));
    }

    #[test]
    fn overwrite_refreshes_position_without_evicting() {
        let (cache, _) = cache_with(2, 0);
        cache.set("A", "a".into(), None);
        cache.set("B", "b".into(), None);
        cache.set("A", "a2".into(), None);
        cache.set("C", "c".into(), None);

        assert_eq!(cache.get("A").as_deref(), Some("a2"));
        assert!(!cache.exists("B"));
        let stats = cache.stats();
        assert_eq!(stats.sets, 4);
        assert_eq!(stats.evictions, 1);
    }

    #[test]
    fn entry_expires_after_ttl() {
        let (cache, clock) = cache_with(10, 300);
        cache.set("k", "v".into(), Some(1));
        assert_eq!(cache.get("k").as_deref(), Some("v"));

        let misses_before = cache.stats().misses;
        clock.advance_millis(1001);
        assert_eq!(cache.get("k"), None);

        let stats = cache.stats();
        assert_eq!(stats.misses, misses_before + 1);
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.size, 0);
    }

    #[test]
    fn entry_at_exact_expiry_is_still_live() {
        let (cache, clock) = cache_with(10, 300);
        cache.set("k", "v".into(), Some(5));
        clock.advance_secs(5);
        assert!(cache.exists("k"));
        assert_eq!(cache.ttl_remaining("k"), Some(0));
    }

    #[test]
    fn non_positive_ttl_never_expires() {
        let (cache, clock) = cache_with(10, 300);
        cache.set("forever", "v".into(), Some(0));
        cache.set("also", "v".into(), Some(-5));
        clock.advance_secs(1_000_000);
        assert_eq!(cache.ttl_remaining("forever"), Some(-1));
        assert!(cache.exists("also"));
    }

    #[test]
    fn huge_ttl_is_stored_without_expiry() {
        let (cache, clock) = cache_with(10, 300);
        cache.set("max", "v".into(), Some(i64::MAX));
        cache.set("far", "v".into(), Some(10_000_000_000_000));
        clock.advance_secs(1_000_000);

        assert_eq!(cache.get("max").as_deref(), Some("v"));
        assert_eq!(cache.ttl_remaining("far"), Some(-1));
    }

    #[test]
    fn huge_default_ttl_does_not_break_set() {
        let (cache, _) = cache_with(10, i64::MAX);
        cache.set("k", "v".into(), None);
        assert!(cache.exists("k"));
    }

    #[test]
    fn size_bound_holds_under_concurrent_use() {
        let cache = TtlCache::<u32>::new("shared", CacheConfig { max_size: 16, default_ttl_secs: 0 });
        std::thread::scope(|scope| {
            for t in 0..8u32 {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..200u32 {
                        cache.set(format!("k{}-{}", t, i), i, None);
                        cache.get(&format!("k{}-{}", t, i / 2));
                        assert!(cache.len() <= 16);
                    }
                });
            }
        });

        let stats = cache.stats();
        assert!(cache.len() <= 16);
        assert_eq!(stats.sets, 8 * 200);
        assert_eq!(stats.hits + stats.misses, 8 * 200);
        assert_eq!(stats.evictions as usize, 8 * 200 - cache.len());
    }

    #[test]
    fn default_ttl_applies_when_omitted() {
        let (cache, clock) = cache_with(10, 30);
        cache.set("k", "v".into(), None);
        assert_eq!(cache.ttl_remaining("k"), Some(30));
        clock.advance_secs(12);
        assert_eq!(cache.ttl_remaining("k"), Some(18));
        clock.advance_secs(19);
        assert_eq!(cache.ttl_remaining("k"), None);
        assert_eq!(cache.ttl_remaining("missing"), None);
    }

    #[test]
    fn exists_has_no_hit_or_recency_side_effects() {
        let (cache, _) = cache_with(2, 0);
        cache.set("A", "a".into(), None);
        cache.set("B", "b".into(), None);
        assert!(cache.exists("A"));
        cache.set("C", "c".into(), None);

        assert!(!cache.exists("A"), "exists must not refresh recency");
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn delete_reports_presence() {
        let (cache, _) = cache_with(10, 0);
        cache.set("k", "v".into(), None);
        assert!(cache.delete("k"));
        assert!(!cache.delete("k"));
        assert_eq!(cache.stats().deletes, 1);
    }

    #[test]
    fn cleanup_removes_only_expired_entries() {
        let (cache, clock) = cache_with(10, 0);
        cache.set("short", "v".into(), Some(1));
        cache.set("long", "v".into(), Some(100));
        cache.set("never", "v".into(), None);
        clock.advance_secs(2);

        assert_eq!(cache.cleanup_expired(), 1);
        assert_eq!(cache.len(), 2);
        assert!(cache.exists("long"));
        assert!(cache.exists("never"));
    }

    #[test]
    fn get_tracks_access_metadata() {
        let (cache, clock) = cache_with(10, 0);
        cache.set("k", "v".into(), None);
        let created = clock.now();
        clock.advance_secs(3);
        cache.get("k");
        cache.get("k");

        let info = cache.entry_info("k").expect("entry should be live");
        assert_eq!(info.access_count, 2);
        assert_eq!(info.created_at, created);
        assert_eq!(info.last_access, clock.now());
    }

    #[test]
    fn stats_report_hit_rate() {
        let (cache, _) = cache_with(10, 0);
        cache.set("k", "v".into(), None);
        cache.get("k");
        cache.get("k");
        cache.get("k");
        cache.get("nope");

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.hit_rate, 75.0);
        assert_eq!(stats.max_size, 10);
    }

    #[test]
    fn memoizes_computed_values() {
        let (cache, _) = cache_with(10, 0);
        let mut calls = 0;
        let first = cache.get_or_insert_with("k", None, || {
            calls += 1;
            "computed".to_string()
        });
        let second = cache.get_or_insert_with("k", None, || {
            calls += 1;
            "again".to_string()
        });
        assert_eq!(first, "computed");
        assert_eq!(second, "computed");
        assert_eq!(calls, 1);

        let failed: Result<String, &str> = cache.get_or_try_insert_with("bad", None, || Err("boom"));
        assert!(failed.is_err());
        assert!(!cache.exists("bad"));
    }

    #[test]
    fn clear_empties_the_cache() {
        let (cache, _) = cache_with(10, 0);
        cache.set("a", "1".into(), None);
        cache.set("b", "2".into(), None);
        cache.clear();
        assert!(cache.is_empty());
        cache.set("c", "3".into(), None);
        assert_eq!(cache.len(), 1);
    }
}
