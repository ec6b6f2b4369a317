// File: crybot-core/src/utils/time.rs

use chrono::{DateTime, Duration, Utc};

/// Fractional seconds from `earlier` to `later` (negative if `later` is before).
pub fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}

/// Whole seconds needed to cover `secs`, rounded up. Never below zero.
pub fn ceil_secs(secs: f64) -> u64 {
    if secs <= 0.0 {
        0
    } else {
        secs.ceil() as u64
    }
}

/// A `chrono::Duration` from whole seconds, saturating instead of panicking.
pub fn secs(n: i64) -> Duration {
    Duration::try_seconds(n).unwrap_or(Duration::MAX)
}
