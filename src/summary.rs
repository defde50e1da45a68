//! End-of-run summary
//!
//! Condenses a scenario's final metrics into the console block:
//!
//! ```text
//! PERFORMANCE TEST RESULTS
//! ===========================
//! Total Iterations: 100
//! Success Rate: 90.00%
//! Average Response Time: 250.50ms
//! Total Requests: 700
//! Error Rate: 5.00%
//! ```
//!
//! followed by threshold outcomes and per-check tallies when there are any.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

use crate::metrics::{
    CHECKS, CheckTally, HTTP_REQ_DURATION, HTTP_REQ_FAILED, HTTP_REQS, ITERATIONS, MetricsSnapshot,
    ThresholdResult,
};
use crate::scenarios::ScenarioReport;

/// Headline numbers of one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryReport {
    pub iterations: u64,
    /// Percentage of passed checks
    pub success_rate: f64,
    /// Mean request duration in milliseconds
    pub avg_response_time: f64,
    pub total_requests: u64,
    /// Percentage of failed requests
    pub error_rate: f64,
    pub thresholds: Vec<ThresholdResult>,
    pub checks: IndexMap<String, CheckTally>,
}

impl SummaryReport {
    /// Summarize a snapshot; missing metrics count as zero
    pub fn from_snapshot(snapshot: &MetricsSnapshot, thresholds: &[ThresholdResult]) -> Self {
        Self {
            iterations: snapshot.count(ITERATIONS).unwrap_or(0.0) as u64,
            success_rate: snapshot.rate(CHECKS).unwrap_or(0.0) * 100.0,
            avg_response_time: snapshot
                .trend(HTTP_REQ_DURATION)
                .map(|t| t.avg)
                .unwrap_or(0.0),
            total_requests: snapshot.count(HTTP_REQS).unwrap_or(0.0) as u64,
            error_rate: snapshot.rate(HTTP_REQ_FAILED).unwrap_or(0.0) * 100.0,
            thresholds: thresholds.to_vec(),
            checks: snapshot.checks.clone(),
        }
    }

    pub fn from_report(report: &ScenarioReport) -> Self {
        Self::from_snapshot(&report.metrics, &report.thresholds)
    }

    /// Final stdout line
    pub fn completion_line(&self) -> String {
        format!(
            "Performance test completed with {} iterations",
            self.iterations
        )
    }
}

impl fmt::Display for SummaryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "PERFORMANCE TEST RESULTS")?;
        writeln!(f, "===========================")?;
        writeln!(f, "Total Iterations: {}", self.iterations)?;
        writeln!(f, "Success Rate: {:.2}%", self.success_rate)?;
        writeln!(f, "Average Response Time: {:.2}ms", self.avg_response_time)?;
        writeln!(f, "Total Requests: {}", self.total_requests)?;
        writeln!(f, "Error Rate: {:.2}%", self.error_rate)?;

        if !self.thresholds.is_empty() {
            writeln!(f)?;
            writeln!(f, "Thresholds:")?;
            for t in &self.thresholds {
                let mark = if t.passed { "ok" } else { "CROSSED" };
                match t.observed {
                    Some(observed) => writeln!(
                        f,
                        "  {:<8} {}: {} (observed {observed:.2})",
                        mark, t.metric, t.expression
                    )?,
                    None => writeln!(f, "  {:<8} {}: {} (no data)", mark, t.metric, t.expression)?,
                }
            }
        }

        if !self.checks.is_empty() {
            writeln!(f)?;
            writeln!(f, "Checks:")?;
            for (name, tally) in &self.checks {
                writeln!(
                    f,
                    "  {name}: {} passed, {} failed",
                    tally.passes, tally.fails
                )?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{CounterValues, MetricValues, RateValues, TrendValues};
    use std::time::Duration;

    fn snapshot() -> MetricsSnapshot {
        let mut metrics = IndexMap::new();
        metrics.insert(
            ITERATIONS.to_string(),
            MetricValues::Counter(CounterValues {
                count: 100.0,
                rate: 10.0,
            }),
        );
        metrics.insert(
            CHECKS.to_string(),
            MetricValues::Rate(RateValues {
                rate: 0.9,
                passes: 630,
                fails: 70,
            }),
        );
        metrics.insert(
            HTTP_REQ_DURATION.to_string(),
            MetricValues::Trend(TrendValues {
                avg: 250.5,
                ..TrendValues::default()
            }),
        );
        metrics.insert(
            HTTP_REQS.to_string(),
            MetricValues::Counter(CounterValues {
                count: 700.0,
                rate: 70.0,
            }),
        );
        metrics.insert(
            HTTP_REQ_FAILED.to_string(),
            MetricValues::Rate(RateValues {
                rate: 0.05,
                passes: 35,
                fails: 665,
            }),
        );

        MetricsSnapshot {
            elapsed: Duration::from_secs(10),
            metrics,
            checks: IndexMap::new(),
        }
    }

    #[test]
    fn test_summary_block() {
        let report = SummaryReport::from_snapshot(&snapshot(), &[]);
        let text = report.to_string();

        assert!(text.starts_with("PERFORMANCE TEST RESULTS\n===========================\n"));
        assert!(text.contains("Total Iterations: 100\n"));
        assert!(text.contains("Success Rate: 90.00%"));
        assert!(text.contains("Average Response Time: 250.50ms"));
        assert!(text.contains("Total Requests: 700"));
        assert!(text.contains("Error Rate: 5.00%"));
        assert!(!text.contains("Thresholds:"));
        assert_eq!(
            report.completion_line(),
            "Performance test completed with 100 iterations"
        );
    }

    #[test]
    fn test_missing_metrics_are_zero() {
        let report = SummaryReport::from_snapshot(&MetricsSnapshot::default(), &[]);
        let text = report.to_string();
        assert!(text.contains("Total Iterations: 0\n"));
        assert!(text.contains("Success Rate: 0.00%"));
        assert!(text.contains("Average Response Time: 0.00ms"));
        assert!(text.contains("Error Rate: 0.00%"));
    }

    #[test]
    fn test_thresholds_and_checks_listed() {
        let mut snapshot = snapshot();
        snapshot.checks.insert(
            "Verify OTP successful".to_string(),
            CheckTally {
                passes: 90,
                fails: 10,
            },
        );
        let thresholds = vec![
            ThresholdResult {
                metric: CHECKS.to_string(),
                expression: "rate>0.85".to_string(),
                observed: Some(0.9),
                passed: true,
            },
            ThresholdResult {
                metric: "visitor_creation_time".to_string(),
                expression: "p(95)<100".to_string(),
                observed: None,
                passed: false,
            },
        ];

        let text = SummaryReport::from_snapshot(&snapshot, &thresholds).to_string();
        assert!(text.contains("ok       checks: rate>0.85 (observed 0.90)"));
        assert!(text.contains("CROSSED  visitor_creation_time: p(95)<100 (no data)"));
        assert!(text.contains("Verify OTP successful: 90 passed, 10 failed"));
    }
}
