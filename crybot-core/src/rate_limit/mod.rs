// File: crybot-core/src/rate_limit/mod.rs
//! Two-tier sliding-window admission gate: one window per actor, one per channel.
//!
//! A request is admitted only if both the actor's and the channel's windows
//! have room. Denied attempts are never recorded, so a flood of rejected
//! messages does not extend the wait.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crybot_common::models::{Decision, LimitScope};
use crybot_common::traits::{Clock, SystemClock};

use crate::utils::time::{ceil_secs, seconds_between};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_actor_limit")]
    pub actor_limit: u32,
    #[serde(default = "default_window_secs")]
    pub actor_window_secs: u64,
    #[serde(default = "default_channel_limit")]
    pub channel_limit: u32,
    #[serde(default = "default_window_secs")]
    pub channel_window_secs: u64,
}

fn default_actor_limit() -> u32 {
    10
}

fn default_channel_limit() -> u32 {
    30
}

fn default_window_secs() -> u64 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            actor_limit: default_actor_limit(),
            actor_window_secs: default_window_secs(),
            channel_limit: default_channel_limit(),
            channel_window_secs: default_window_secs(),
        }
    }
}

/// Admitted-request timestamps for one actor or channel.
#[derive(Debug, Clone)]
pub struct ActorWindow {
    timestamps: VecDeque<DateTime<Utc>>,
    limit: u32,
    window_secs: u64,
}

impl ActorWindow {
    pub fn new(limit: u32, window_secs: u64) -> Self {
        Self {
            timestamps: VecDeque::new(),
            limit,
            window_secs,
        }
    }

    /// Drops timestamps that are `window_secs` or more in the past.
    fn prune(&mut self, now: DateTime<Utc>) {
        let window = self.window_secs as f64;
        while self
            .timestamps
            .front()
            .is_some_and(|&t| seconds_between(t, now) >= window)
        {
            self.timestamps.pop_front();
        }
    }

    /// `None` if there is room, otherwise the whole seconds until the oldest
    /// timestamp leaves the window (at least 1).
    fn check(&mut self, now: DateTime<Utc>) -> Option<u64> {
        if self.limit == 0 {
            return None;
        }
        self.prune(now);
        if (self.timestamps.len() as u32) < self.limit {
            return None;
        }
        let oldest = self.timestamps.front().copied().unwrap_or(now);
        let remaining = self.window_secs as f64 - seconds_between(oldest, now);
        Some(ceil_secs(remaining).max(1))
    }

    fn record(&mut self, now: DateTime<Utc>) {
        // A caller-supplied `now` can lag a previous one; keep the sequence ordered.
        let at = match self.timestamps.back() {
            Some(&last) if last > now => last,
            _ => now,
        };
        self.timestamps.push_back(at);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

#[derive(Debug, Default)]
struct Windows {
    actors: HashMap<String, ActorWindow>,
    channels: HashMap<String, ActorWindow>,
}

pub struct RateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    windows: Mutex<Windows>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        debug!(
            "Initializing RateLimiter (actor {}/{}s, channel {}/{}s)",
            config.actor_limit, config.actor_window_secs, config.channel_limit, config.channel_window_secs
        );
        Self {
            config,
            clock,
            windows: Mutex::new(Windows::default()),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admission decision for one unit of work at `now`.
    ///
    /// The actor window is consulted first, so when both windows are full the
    /// caller sees the actor's denial. Both windows are updated only when both
    /// have room.
    pub fn admit(&self, actor_id: &str, channel_id: &str, now: DateTime<Utc>) -> Decision {
        let mut guard = self.windows.lock();
        let Windows { actors, channels } = &mut *guard;

        let actor = actors
            .entry(actor_id.to_string())
            .or_insert_with(|| ActorWindow::new(self.config.actor_limit, self.config.actor_window_secs));
        if let Some(retry_after_secs) = actor.check(now) {
            debug!("Actor '{}' rate limited for {}s", actor_id, retry_after_secs);
            return Decision::Denied {
                retry_after_secs,
                scope: LimitScope::Actor,
            };
        }

        let channel = channels
            .entry(channel_id.to_string())
            .or_insert_with(|| ActorWindow::new(self.config.channel_limit, self.config.channel_window_secs));
        if let Some(retry_after_secs) = channel.check(now) {
            debug!("Channel '{}' rate limited for {}s", channel_id, retry_after_secs);
            return Decision::Denied {
                retry_after_secs,
                scope: LimitScope::Channel,
            };
        }

        actor.record(now);
        channel.record(now);
        Decision::Allowed
    }

    /// [`RateLimiter::admit`] at the limiter's own clock.
    pub fn check(&self, actor_id: &str, channel_id: &str) -> Decision {
        self.admit(actor_id, channel_id, self.clock.now())
    }

    /// Seconds until `id` could be admitted on the given axis; 0 if it could be now.
    /// Read-only apart from pruning.
    pub fn wait_time(&self, scope: LimitScope, id: &str, now: DateTime<Utc>) -> u64 {
        let mut guard = self.windows.lock();
        let map = match scope {
            LimitScope::Actor => &mut guard.actors,
            LimitScope::Channel => &mut guard.channels,
        };
        map.get_mut(id).and_then(|w| w.check(now)).unwrap_or(0)
    }

    /// Forgets an actor's window. Returns whether one existed.
    pub fn reset_actor(&self, actor_id: &str) -> bool {
        let removed = self.windows.lock().actors.remove(actor_id).is_some();
        if removed {
            info!("Rate limit window reset for actor '{}'", actor_id);
        }
        removed
    }

    pub fn reset_channel(&self, channel_id: &str) -> bool {
        let removed = self.windows.lock().channels.remove(channel_id).is_some();
        if removed {
            info!("Rate limit window reset for channel '{}'", channel_id);
        }
        removed
    }

    pub fn tracked_actors(&self) -> usize {
        self.windows.lock().actors.len()
    }

    pub fn tracked_channels(&self) -> usize {
        self.windows.lock().channels.len()
    }

    /// Actors with at least one admission inside their window, by the
    /// limiter's clock.
    pub fn active_actors(&self) -> usize {
        let now = self.clock.now();
        let mut guard = self.windows.lock();
        let mut active = 0;
        for window in guard.actors.values_mut() {
            window.prune(now);
            if !window.is_empty() {
                active += 1;
            }
        }
        active
    }
}
