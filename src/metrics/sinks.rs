//! Metric sinks
//!
//! Cheap, cloneable handles around shared metric state. Every handle of the
//! same metric points at the same sink, so scenario code can hold one per
//! iteration while the registry snapshots them at the end of the run.

use hdrhistogram::Histogram;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Monotonic sum (e.g. `http_reqs`, `connection_errors`)
#[derive(Debug, Clone, Default)]
pub struct Counter {
    sum: Arc<Mutex<f64>>,
}

impl Counter {
    /// Add to the counter
    pub fn add(&self, value: f64) {
        *self.sum.lock() += value;
    }

    /// Increment by one
    pub fn inc(&self) {
        self.add(1.0);
    }

    /// Current sum
    pub fn count(&self) -> f64 {
        *self.sum.lock()
    }
}

#[derive(Debug, Default)]
struct GaugeState {
    value: f64,
    min: f64,
    max: f64,
    touched: bool,
}

impl GaugeState {
    fn observe(&mut self, value: f64) {
        self.value = value;
        if !self.touched {
            self.min = value;
            self.max = value;
            self.touched = true;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
    }
}

/// Last-value metric with min/max tracking (e.g. `vus`, `active_visitors`)
#[derive(Debug, Clone, Default)]
pub struct Gauge {
    state: Arc<Mutex<GaugeState>>,
}

impl Gauge {
    /// Set the gauge to an absolute value
    pub fn set(&self, value: f64) {
        self.state.lock().observe(value);
    }

    /// Move the gauge by `delta` (negative to decrement)
    pub fn add(&self, delta: f64) {
        let mut state = self.state.lock();
        let next = state.value + delta;
        state.observe(next);
    }

    /// Current value
    pub fn value(&self) -> f64 {
        self.state.lock().value
    }

    pub(crate) fn values(&self) -> GaugeValues {
        let state = self.state.lock();
        GaugeValues {
            value: state.value,
            min: state.min,
            max: state.max,
        }
    }
}

/// Ratio of true samples to all samples (e.g. `checks`, `http_req_failed`)
#[derive(Debug, Clone, Default)]
pub struct Rate {
    state: Arc<Mutex<(u64, u64)>>,
}

impl Rate {
    /// Record one sample
    pub fn add(&self, passed: bool) {
        let mut state = self.state.lock();
        if passed {
            state.0 += 1;
        } else {
            state.1 += 1;
        }
    }

    /// Number of true and false samples
    pub fn tally(&self) -> (u64, u64) {
        *self.state.lock()
    }

    /// Fraction of true samples, `None` without samples
    pub fn rate(&self) -> Option<f64> {
        let (passes, fails) = self.tally();
        let total = passes + fails;
        (total > 0).then(|| passes as f64 / total as f64)
    }

    pub(crate) fn values(&self) -> RateValues {
        let (passes, fails) = self.tally();
        RateValues {
            rate: self.rate().unwrap_or(0.0),
            passes,
            fails,
        }
    }
}

/// Significant figures kept by trend histograms
const TREND_SIGFIG: u8 = 3;

#[derive(Debug, Default)]
struct TrendState {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    /// Samples in microseconds, created on first record
    histogram: Option<Histogram<u64>>,
}

/// Timing distribution in milliseconds (e.g. `http_req_duration`)
///
/// Count, sum, min and max are exact. Percentiles come from an HDR histogram
/// at three significant figures, so memory stays flat however long the run.
#[derive(Debug, Clone, Default)]
pub struct Trend {
    state: Arc<Mutex<TrendState>>,
}

impl Trend {
    /// Record one sample; non-finite values are ignored
    pub fn add(&self, value: f64) {
        if !value.is_finite() {
            return;
        }
        let mut state = self.state.lock();
        if state.count == 0 {
            state.min = value;
            state.max = value;
        } else {
            state.min = state.min.min(value);
            state.max = state.max.max(value);
        }
        state.count += 1;
        state.sum += value;

        if state.histogram.is_none() {
            state.histogram = Histogram::new(TREND_SIGFIG)
                .map_err(|e| warn!(error = %e, "Failed to create trend histogram"))
                .ok();
        }
        if let Some(histogram) = state.histogram.as_mut() {
            // Negative samples saturate to 0
            histogram.saturating_record((value * 1000.0).round() as u64);
        }
    }

    /// Number of samples recorded
    pub fn len(&self) -> usize {
        self.state.lock().count as usize
    }

    /// Whether no samples were recorded
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Percentile `p` (0-100) of the samples
    pub fn percentile(&self, p: f64) -> Option<f64> {
        self.state.lock().percentile(p)
    }

    pub(crate) fn values(&self) -> TrendValues {
        let state = self.state.lock();
        if state.count == 0 {
            return TrendValues::default();
        }
        TrendValues {
            avg: state.sum / state.count as f64,
            min: state.min,
            med: state.percentile(50.0).unwrap_or_default(),
            max: state.max,
            p90: state.percentile(90.0).unwrap_or_default(),
            p95: state.percentile(95.0).unwrap_or_default(),
        }
    }
}

impl TrendState {
    fn percentile(&self, p: f64) -> Option<f64> {
        let histogram = self.histogram.as_ref().filter(|h| !h.is_empty())?;
        let quantile = p.clamp(0.0, 100.0) / 100.0;
        if quantile <= 0.0 {
            return Some(self.min);
        }
        if quantile >= 1.0 {
            return Some(self.max);
        }
        let micros = histogram.median_equivalent(histogram.value_at_quantile(quantile));
        // Bucket midpoints can fall just outside the observed range
        Some((micros as f64 / 1000.0).clamp(self.min, self.max))
    }
}

/// Snapshot of a counter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterValues {
    pub count: f64,
    /// Count per second of run time
    pub rate: f64,
}

/// Snapshot of a gauge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GaugeValues {
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// Snapshot of a rate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateValues {
    pub rate: f64,
    pub passes: u64,
    pub fails: u64,
}

/// Snapshot of a trend
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TrendValues {
    pub avg: f64,
    pub min: f64,
    pub med: f64,
    pub max: f64,
    pub p90: f64,
    pub p95: f64,
}
