use serde::{Deserialize, Serialize};

/// Snapshot of a cache's counters, as returned by `stats()`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub evictions: u64,
    /// Entries dropped because their TTL passed (lazily or by a sweep).
    pub expirations: u64,
    pub size: usize,
    pub max_size: usize,
    pub total_requests: u64,
    /// Percentage of `get` calls that were hits, rounded to two decimals.
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn compute_hit_rate(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            return 0.0;
        }
        let rate = hits as f64 / total as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_is_rounded_percentage() {
        assert_eq!(CacheStats::compute_hit_rate(0, 0), 0.0);
        assert_eq!(CacheStats::compute_hit_rate(1, 2), 33.33);
        assert_eq!(CacheStats::compute_hit_rate(3, 1), 75.0);
    }
}
