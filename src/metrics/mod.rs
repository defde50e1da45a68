//! Run metrics
//!
//! Counters, gauges, rates and trends aggregated over one scenario run,
//! plus threshold evaluation on top of them.
//!
//! ## Built-in metrics
//!
//! - `http_reqs` - every request issued
//! - `http_req_duration` - request latency in milliseconds
//! - `http_req_failed` - requests that errored or returned a status outside 200..400
//! - `checks` - pass rate over all recorded checks
//! - `iterations`, `iteration_duration` - completed iterations and their wall time
//! - `vus`, `vus_max` - running virtual users

mod registry;
mod sinks;
pub mod threshold;

pub use registry::{
    CHECKS, CheckTally, HTTP_REQ_DURATION, HTTP_REQ_FAILED, HTTP_REQS, ITERATION_DURATION,
    ITERATIONS, MetricKind, MetricValues, Metrics, MetricsSnapshot, VUS, VUS_MAX,
};
pub use sinks::{
    Counter, CounterValues, Gauge, GaugeValues, Rate, RateValues, Trend, TrendValues,
};
pub use threshold::{Threshold, ThresholdError, ThresholdResult, evaluate_thresholds};
