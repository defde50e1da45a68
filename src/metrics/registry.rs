//! Metric registry
//!
//! Owns every sink of one scenario run. Built-in metrics are registered up
//! front; scenarios declare their own by name and get back a handle.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

use super::sinks::{
    Counter, CounterValues, Gauge, GaugeValues, Rate, RateValues, Trend, TrendValues,
};
use super::threshold::Aggregation;

pub const HTTP_REQS: &str = "http_reqs";
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
pub const CHECKS: &str = "checks";
pub const ITERATIONS: &str = "iterations";
pub const ITERATION_DURATION: &str = "iteration_duration";
pub const VUS: &str = "vus";
pub const VUS_MAX: &str = "vus_max";

/// Kind of a registered metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Gauge => write!(f, "gauge"),
            MetricKind::Rate => write!(f, "rate"),
            MetricKind::Trend => write!(f, "trend"),
        }
    }
}

#[derive(Debug, Clone)]
enum Sink {
    Counter(Counter),
    Gauge(Gauge),
    Rate(Rate),
    Trend(Trend),
}

impl Sink {
    fn kind(&self) -> MetricKind {
        match self {
            Sink::Counter(_) => MetricKind::Counter,
            Sink::Gauge(_) => MetricKind::Gauge,
            Sink::Rate(_) => MetricKind::Rate,
            Sink::Trend(_) => MetricKind::Trend,
        }
    }
}

/// Pass/fail tally for a single named check
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTally {
    pub passes: u64,
    pub fails: u64,
}

#[derive(Debug)]
struct Inner {
    started_at: Instant,
    sinks: RwLock<IndexMap<String, Sink>>,
    checks: Mutex<IndexMap<String, CheckTally>>,
}

/// Shared metric registry for one scenario run
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<Inner>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

macro_rules! sink_accessor {
    ($(#[$doc:meta])* $fn:ident, $variant:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $fn(&self, name: &str) -> $ty {
            if let Some(sink) = self.inner.sinks.read().get(name) {
                return match sink {
                    Sink::$variant(handle) => handle.clone(),
                    other => {
                        warn!(
                            metric = name,
                            registered = %other.kind(),
                            requested = %MetricKind::$variant,
                            "Metric kind mismatch, returning detached sink"
                        );
                        <$ty>::default()
                    }
                };
            }

            let mut sinks = self.inner.sinks.write();
            match sinks
                .entry(name.to_string())
                .or_insert_with(|| Sink::$variant(<$ty>::default()))
            {
                Sink::$variant(handle) => handle.clone(),
                _ => <$ty>::default(),
            }
        }
    };
}

impl Metrics {
    /// Create a registry with the built-in metrics registered
    pub fn new() -> Self {
        let metrics = Self {
            inner: Arc::new(Inner {
                started_at: Instant::now(),
                sinks: RwLock::new(IndexMap::new()),
                checks: Mutex::new(IndexMap::new()),
            }),
        };

        metrics.counter(HTTP_REQS);
        metrics.trend(HTTP_REQ_DURATION);
        metrics.rate(HTTP_REQ_FAILED);
        metrics.rate(CHECKS);
        metrics.counter(ITERATIONS);
        metrics.trend(ITERATION_DURATION);
        metrics.gauge(VUS);
        metrics.gauge(VUS_MAX);

        metrics
    }

    sink_accessor!(
        /// Get or register a counter
        counter, Counter, Counter
    );
    sink_accessor!(
        /// Get or register a gauge
        gauge, Gauge, Gauge
    );
    sink_accessor!(
        /// Get or register a rate
        rate, Rate, Rate
    );
    sink_accessor!(
        /// Get or register a trend
        trend, Trend, Trend
    );

    /// Record a named check into the `checks` rate and its own tally
    pub fn check(&self, name: &str, passed: bool) -> bool {
        self.rate(CHECKS).add(passed);
        let mut checks = self.inner.checks.lock();
        let tally = checks.entry(name.to_string()).or_default();
        if passed {
            tally.passes += 1;
        } else {
            tally.fails += 1;
        }
        passed
    }

    /// Kind of a registered metric
    pub fn kind_of(&self, name: &str) -> Option<MetricKind> {
        self.inner.sinks.read().get(name).map(Sink::kind)
    }

    /// Time since the registry was created
    pub fn elapsed(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    /// Compute one aggregation over a metric, `None` if the metric has no data
    /// or the aggregation does not apply to its kind
    pub fn aggregate(&self, name: &str, aggregation: &Aggregation) -> Option<f64> {
        let sink = self.inner.sinks.read().get(name).cloned()?;
        match (sink, aggregation) {
            (Sink::Counter(c), Aggregation::Count) => Some(c.count()),
            (Sink::Counter(c), Aggregation::Rate) => {
                let secs = self.elapsed().as_secs_f64();
                (secs > 0.0).then(|| c.count() / secs)
            }
            (Sink::Gauge(g), Aggregation::Value) => Some(g.value()),
            (Sink::Rate(r), Aggregation::Rate) => r.rate(),
            (Sink::Trend(t), agg) if !t.is_empty() => {
                let values = t.values();
                match agg {
                    Aggregation::Avg => Some(values.avg),
                    Aggregation::Min => Some(values.min),
                    Aggregation::Med => Some(values.med),
                    Aggregation::Max => Some(values.max),
                    Aggregation::Percentile(p) => t.percentile(*p),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Freeze the current state of every metric
    pub fn snapshot(&self) -> MetricsSnapshot {
        let elapsed = self.elapsed();
        let secs = elapsed.as_secs_f64();
        let metrics = self
            .inner
            .sinks
            .read()
            .iter()
            .map(|(name, sink)| {
                let values = match sink {
                    Sink::Counter(c) => MetricValues::Counter(CounterValues {
                        count: c.count(),
                        rate: if secs > 0.0 { c.count() / secs } else { 0.0 },
                    }),
                    Sink::Gauge(g) => MetricValues::Gauge(g.values()),
                    Sink::Rate(r) => MetricValues::Rate(r.values()),
                    Sink::Trend(t) => MetricValues::Trend(t.values()),
                };
                (name.clone(), values)
            })
            .collect();

        MetricsSnapshot {
            elapsed,
            metrics,
            checks: self.inner.checks.lock().clone(),
        }
    }
}

/// Frozen values of one metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum MetricValues {
    Counter(CounterValues),
    Gauge(GaugeValues),
    Rate(RateValues),
    Trend(TrendValues),
}

/// Point-in-time copy of a registry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub metrics: IndexMap<String, MetricValues>,
    #[serde(default)]
    pub checks: IndexMap<String, CheckTally>,
}

impl MetricsSnapshot {
    /// Counter total
    pub fn count(&self, name: &str) -> Option<f64> {
        match self.metrics.get(name)? {
            MetricValues::Counter(v) => Some(v.count),
            _ => None,
        }
    }

    /// Rate fraction
    pub fn rate(&self, name: &str) -> Option<f64> {
        match self.metrics.get(name)? {
            MetricValues::Rate(v) => Some(v.rate),
            _ => None,
        }
    }

    /// Trend summary
    pub fn trend(&self, name: &str) -> Option<&TrendValues> {
        match self.metrics.get(name)? {
            MetricValues::Trend(v) => Some(v),
            _ => None,
        }
    }

    /// Gauge values
    pub fn gauge(&self, name: &str) -> Option<&GaugeValues> {
        match self.metrics.get(name)? {
            MetricValues::Gauge(v) => Some(v),
            _ => None,
        }
    }
}
