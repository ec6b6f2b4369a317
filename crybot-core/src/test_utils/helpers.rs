// File: crybot-core/src/test_utils/helpers.rs

use std::sync::Arc;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use crybot_common::traits::Clock;

/// A clock that only moves when told to. Cloning shares the same instant,
/// so a test can hand one copy to a component and keep advancing the other.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: Arc::new(Mutex::new(start)) }
    }

    /// Starts at a fixed, arbitrary instant so assertions are reproducible.
    pub fn at_epoch_offset(secs: i64) -> Self {
        let start = Utc
            .timestamp_opt(1_700_000_000 + secs, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self::new(start)
    }

    pub fn advance_secs(&self, secs: i64) {
        self.advance(Duration::seconds(secs));
    }

    pub fn advance_millis(&self, millis: i64) {
        self.advance(Duration::milliseconds(millis));
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// The instant `secs` after the clock's current time.
    pub fn plus_secs(&self, secs: i64) -> DateTime<Utc> {
        *self.now.lock() + Duration::seconds(secs)
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at_epoch_offset(0)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
