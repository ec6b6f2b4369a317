// File: crybot-core/src/metrics/registry.rs

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use std::sync::Arc;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, warn};

use crybot_common::traits::{Clock, SystemClock};

use super::names;
use crate::utils::time::secs;

/// Upper bounds of the histogram buckets, in seconds for timing metrics.
pub const BUCKET_BOUNDARIES: [f64; 5] = [0.1, 0.5, 1.0, 5.0, f64::INFINITY];
const BUCKET_LABELS: [&str; 5] = ["0.1", "0.5", "1.0", "5.0", "+Inf"];

/// Maximum number of history samples, and of raw observations per histogram.
pub const HISTORY_CAP: usize = 10_000;

type Labels = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
struct MetricKey {
    name: String,
    labels: Labels,
}

impl MetricKey {
    fn new(name: &str, labels: &[(&str, &str)]) -> Self {
        Self {
            name: name.to_string(),
            labels: labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

impl MetricKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Histogram => "histogram",
        }
    }

    fn default_help(&self, name: &str) -> String {
        match self {
            MetricKind::Counter => format!("Total count of {}", name),
            MetricKind::Gauge => format!("Current value of {}", name),
            MetricKind::Histogram => format!("Histogram of {}", name),
        }
    }
}

/// One timestamped mutation. Counters record their new total, gauges the value
/// set, histograms the observed value.
#[derive(Debug, Clone, Serialize)]
pub struct MetricSample {
    pub name: String,
    pub labels: Labels,
    pub kind: MetricKind,
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct HistogramData {
    buckets: [u64; BUCKET_BOUNDARIES.len()],
    sum: f64,
    count: u64,
    observations: VecDeque<(DateTime<Utc>, f64)>,
}

impl HistogramData {
    fn observe(&mut self, value: f64, at: DateTime<Utc>) {
        // NaN fails every comparison and lands in +Inf.
        let idx = BUCKET_BOUNDARIES
            .iter()
            .position(|bound| value <= *bound)
            .unwrap_or(BUCKET_BOUNDARIES.len() - 1);
        self.buckets[idx] += 1;
        self.sum += value;
        self.count += 1;

        self.observations.push_back((at, value));
        while self.observations.len() > HISTORY_CAP {
            self.observations.pop_front();
        }
    }
}

/// Distribution of the raw observations a histogram still retains.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramStats {
    pub count: usize,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSummary {
    pub counters: usize,
    pub gauges: usize,
    pub histograms: usize,
    pub history_size: usize,
    /// Counter totals summed over all label sets, by name.
    pub totals: BTreeMap<String, f64>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Inner {
    counters: BTreeMap<MetricKey, f64>,
    gauges: BTreeMap<MetricKey, f64>,
    histograms: BTreeMap<MetricKey, HistogramData>,
    help: HashMap<String, String>,
    history: VecDeque<MetricSample>,
}

impl Inner {
    fn push_history(&mut self, key: &MetricKey, kind: MetricKind, value: f64, at: DateTime<Utc>) {
        self.history.push_back(MetricSample {
            name: key.name.clone(),
            labels: key.labels.clone(),
            kind,
            value,
            recorded_at: at,
        });
        while self.history.len() > HISTORY_CAP {
            self.history.pop_front();
        }
    }
}

/// Registry of named, labeled metrics.
///
/// `(name, labels)` identifies one instance; labels are kept sorted, so the
/// order callers pass them in never creates a second series.
pub struct MetricsRegistry {
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// A registry with the bot's standard series already present at zero,
    /// so they show up in the export before the first event.
    pub fn with_default_metrics() -> Self {
        let registry = Self::new();
        registry.register_defaults();
        registry
    }

    pub fn register_defaults(&self) {
        self.counter(names::MESSAGES_TOTAL, &[]);
        self.counter(names::COMMANDS_TOTAL, &[]);
        self.counter(names::ERRORS_TOTAL, &[]);
        self.gauge(names::ACTIVE_USERS, &[]);
        self.histogram(names::RESPONSE_TIME, &[]);
        debug!("Default metrics registered");
    }

    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> Counter<'_> {
        let key = MetricKey::new(name, labels);
        self.inner.lock().counters.entry(key.clone()).or_insert(0.0);
        Counter { registry: self, key }
    }

    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Gauge<'_> {
        let key = MetricKey::new(name, labels);
        self.inner.lock().gauges.entry(key.clone()).or_insert(0.0);
        Gauge { registry: self, key }
    }

    pub fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> Histogram<'_> {
        let key = MetricKey::new(name, labels);
        self.inner.lock().histograms.entry(key.clone()).or_default();
        Histogram { registry: self, key }
    }

    /// Replaces the generated `# HELP` text for every series called `name`.
    pub fn describe(&self, name: &str, help: &str) {
        self.inner
            .lock()
            .help
            .insert(name.to_string(), help.replace('\n', " "));
    }

    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let key = MetricKey::new(name, labels);
        self.inner.lock().counters.get(&key).copied()
    }

    pub fn gauge_value(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        let key = MetricKey::new(name, labels);
        self.inner.lock().gauges.get(&key).copied()
    }

    /// `None` if the histogram does not exist or has no retained observations.
    pub fn histogram_stats(&self, name: &str, labels: &[(&str, &str)]) -> Option<HistogramStats> {
        let key = MetricKey::new(name, labels);
        let mut values: Vec<f64> = {
            let inner = self.inner.lock();
            let data = inner.histograms.get(&key)?;
            data.observations.iter().map(|(_, v)| *v).collect()
        };
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let count = values.len();
        let sum: f64 = values.iter().sum();
        let at = |q: f64| values[((count as f64 * q) as usize).min(count - 1)];
        Some(HistogramStats {
            count,
            sum,
            min: values[0],
            max: values[count - 1],
            avg: sum / count as f64,
            p50: at(0.5),
            p95: at(0.95),
            p99: at(0.99),
        })
    }

    pub fn history_len(&self) -> usize {
        self.inner.lock().history.len()
    }

    /// Drops history samples and raw histogram observations recorded more than
    /// `max_age_secs` ago. Running totals, bucket counts and gauge values stay.
    /// Returns how many history samples were removed.
    pub fn prune_older_than(&self, max_age_secs: i64) -> usize {
        let Some(cutoff) = self.clock.now().checked_sub_signed(secs(max_age_secs)) else {
            return 0;
        };

        let mut inner = self.inner.lock();
        let before = inner.history.len();
        inner.history.retain(|s| s.recorded_at >= cutoff);
        let removed = before - inner.history.len();

        for data in inner.histograms.values_mut() {
            data.observations.retain(|(at, _)| *at >= cutoff);
        }

        if removed > 0 {
            debug!("Pruned {} metric samples older than {}s", removed, max_age_secs);
        }
        removed
    }

    pub fn summary(&self) -> MetricsSummary {
        let generated_at = self.clock.now();
        let inner = self.inner.lock();
        let mut totals = BTreeMap::new();
        for (key, value) in &inner.counters {
            *totals.entry(key.name.clone()).or_insert(0.0) += *value;
        }
        MetricsSummary {
            counters: inner.counters.len(),
            gauges: inner.gauges.len(),
            histograms: inner.histograms.len(),
            history_size: inner.history.len(),
            totals,
            generated_at,
        }
    }

    /// Prometheus text exposition of every series. `# HELP` and `# TYPE` are
    /// written once per metric name; histogram buckets are cumulative.
    pub fn export_text(&self) -> String {
        let inner = self.inner.lock();
        let mut out = String::new();

        let mut last: Option<&str> = None;
        for (key, value) in &inner.counters {
            write_header(&mut out, &inner.help, &key.name, MetricKind::Counter, &mut last);
            let _ = writeln!(out, "{}{} {}", key.name, format_labels(&key.labels, None), format_value(*value));
        }

        let mut last: Option<&str> = None;
        for (key, value) in &inner.gauges {
            write_header(&mut out, &inner.help, &key.name, MetricKind::Gauge, &mut last);
            let _ = writeln!(out, "{}{} {}", key.name, format_labels(&key.labels, None), format_value(*value));
        }

        let mut last: Option<&str> = None;
        for (key, data) in &inner.histograms {
            write_header(&mut out, &inner.help, &key.name, MetricKind::Histogram, &mut last);
            let mut cumulative = 0u64;
            for (count, le) in data.buckets.iter().zip(BUCKET_LABELS) {
                cumulative += count;
                let _ = writeln!(
                    out,
                    "{}_bucket{} {}",
                    key.name,
                    format_labels(&key.labels, Some(le)),
                    cumulative
                );
            }
            let labels = format_labels(&key.labels, None);
            let _ = writeln!(out, "{}_sum{} {}", key.name, labels, format_value(data.sum));
            let _ = writeln!(out, "{}_count{} {}", key.name, labels, data.count);
        }

        out
    }

    fn increment_counter(&self, key: &MetricKey, by: f64) {
        if !(by >= 0.0) {
            warn!("Ignoring counter '{}' increment by {}", key.name, by);
            return;
        }
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        let total = {
            let value = inner.counters.entry(key.clone()).or_insert(0.0);
            *value += by;
            *value
        };
        inner.push_history(key, MetricKind::Counter, total, now);
    }

    fn set_gauge(&self, key: &MetricKey, value: f64) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.gauges.insert(key.clone(), value);
        inner.push_history(key, MetricKind::Gauge, value, now);
    }

    fn observe_histogram(&self, key: &MetricKey, value: f64) {
        let now = self.clock.now();
        let mut inner = self.inner.lock();
        inner.histograms.entry(key.clone()).or_default().observe(value, now);
        inner.push_history(key, MetricKind::Histogram, value, now);
    }
}

/// Handle to one counter series.
pub struct Counter<'a> {
    registry: &'a MetricsRegistry,
    key: MetricKey,
}

impl Counter<'_> {
    /// Adds `by`; negative or NaN increments are ignored.
    pub fn increment(&self, by: f64) {
        self.registry.increment_counter(&self.key, by);
    }

    pub fn inc(&self) {
        self.increment(1.0);
    }

    pub fn value(&self) -> f64 {
        self.registry.inner.lock().counters.get(&self.key).copied().unwrap_or(0.0)
    }
}

pub struct Gauge<'a> {
    registry: &'a MetricsRegistry,
    key: MetricKey,
}

impl Gauge<'_> {
    pub fn set(&self, value: f64) {
        self.registry.set_gauge(&self.key, value);
    }

    pub fn value(&self) -> f64 {
        self.registry.inner.lock().gauges.get(&self.key).copied().unwrap_or(0.0)
    }
}

pub struct Histogram<'a> {
    registry: &'a MetricsRegistry,
    key: MetricKey,
}

impl Histogram<'_> {
    pub fn observe(&self, value: f64) {
        self.registry.observe_histogram(&self.key, value);
    }

    pub fn count(&self) -> u64 {
        self.registry.inner.lock().histograms.get(&self.key).map(|h| h.count).unwrap_or(0)
    }

    pub fn sum(&self) -> f64 {
        self.registry.inner.lock().histograms.get(&self.key).map(|h| h.sum).unwrap_or(0.0)
    }
}

fn write_header<'a>(
    out: &mut String,
    help: &HashMap<String, String>,
    name: &'a str,
    kind: MetricKind,
    last: &mut Option<&'a str>,
) {
    if *last == Some(name) {
        return;
    }
    let text = help.get(name).cloned().unwrap_or_else(|| kind.default_help(name));
    let _ = writeln!(out, "# HELP {} {}", name, text);
    let _ = writeln!(out, "# TYPE {} {}", name, kind.as_str());
    *last = Some(name);
}

fn format_labels(labels: &Labels, le: Option<&str>) -> String {
    if labels.is_empty() && le.is_none() {
        return String::new();
    }
    let mut parts: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label_value(v)))
        .collect();
    if let Some(le) = le {
        parts.push(format!("le=\"{}\"", le));
    }
    format!("{{{}}}", parts.join(","))
}

fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}
