// File: crybot-core/src/cache/mod.rs
//! In-memory caches used to memoize per-chat lookups and computed replies.

pub mod ttl_cache;

use serde::{Deserialize, Serialize};
use crybot_common::models::CacheStats;

pub use ttl_cache::{CacheEntry, EntryInfo, TtlCache};

/// Sizing and expiry defaults for one cache instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// TTL applied when `set` is called without one; `<= 0` disables expiry.
    #[serde(default = "default_ttl_secs")]
    pub default_ttl_secs: i64,
}

fn default_max_size() -> usize {
    1000
}

fn default_ttl_secs() -> i64 {
    300
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            default_ttl_secs: default_ttl_secs(),
        }
    }
}

/// Type-erased view of a cache for the maintenance task, which sweeps caches
/// holding different value types.
pub trait Sweepable: Send + Sync {
    fn name(&self) -> &str;

    /// Removes every expired entry and returns how many were dropped.
    fn cleanup_expired(&self) -> usize;

    fn stats(&self) -> CacheStats;
}
