// File: crybot-core/src/metrics/mod.rs
//! Process-wide counters, gauges and histograms with a Prometheus text export.

pub mod registry;

pub use registry::{
    Counter, Gauge, Histogram, HistogramStats, MetricKind, MetricSample, MetricsRegistry,
    MetricsSummary, BUCKET_BOUNDARIES, HISTORY_CAP,
};

/// Metric names shared between the dispatcher, the message loop and maintenance.
pub mod names {
    pub const MESSAGES_TOTAL: &str = "bot_messages_total";
    pub const COMMANDS_TOTAL: &str = "bot_commands_total";
    pub const ERRORS_TOTAL: &str = "bot_errors_total";
    pub const ACTIVE_USERS: &str = "bot_active_users";
    pub const RESPONSE_TIME: &str = "bot_response_time_seconds";
    pub const COMMAND_DURATION: &str = "bot_command_duration_seconds";
    pub const CACHE_ENTRIES: &str = "crybot_cache_entries";
    pub const CACHE_HIT_RATE: &str = "crybot_cache_hit_rate";
    pub const RATELIMIT_TRACKED: &str = "crybot_ratelimit_tracked";
}
