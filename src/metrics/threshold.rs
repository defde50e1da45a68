//! Pass/fail thresholds over run metrics
//!
//! Expressions have the form `<aggregation> <op> <bound>`, for example
//! `p(95)<5000` on `http_req_duration` or `rate<0.1` on `http_req_failed`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use super::registry::Metrics;

/// Errors from parsing threshold expressions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    #[error("Missing comparison operator in '{0}'")]
    MissingOperator(String),

    #[error("Unknown aggregation '{aggregation}' in '{expression}'")]
    UnknownAggregation {
        aggregation: String,
        expression: String,
    },

    #[error("Invalid bound '{bound}' in '{expression}'")]
    InvalidBound { bound: String, expression: String },
}

/// How a metric is reduced to a single number
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    Avg,
    Min,
    Med,
    Max,
    /// Percentile, 0-100
    Percentile(f64),
    Rate,
    Count,
    Value,
}

impl FromStr for Aggregation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "med" => Ok(Aggregation::Med),
            "max" => Ok(Aggregation::Max),
            "rate" => Ok(Aggregation::Rate),
            "count" => Ok(Aggregation::Count),
            "value" => Ok(Aggregation::Value),
            other => other
                .strip_prefix("p(")
                .and_then(|rest| rest.strip_suffix(')'))
                .and_then(|p| p.trim().parse::<f64>().ok())
                .filter(|p| (0.0..=100.0).contains(p))
                .map(Aggregation::Percentile)
                .ok_or(()),
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
}

impl Comparison {
    fn holds(self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }
}

/// A parsed threshold expression
#[derive(Debug, Clone, PartialEq)]
pub struct Threshold {
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
}

impl FromStr for Threshold {
    type Err = ThresholdError;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        let compact: String = expression.chars().filter(|c| !c.is_whitespace()).collect();
        let op_start = compact
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| ThresholdError::MissingOperator(expression.to_string()))?;

        let (lhs, rest) = compact.split_at(op_start);
        let (comparison, op_len) = match rest.as_bytes() {
            [b'<', b'=', ..] => (Comparison::Le, 2),
            [b'>', b'=', ..] => (Comparison::Ge, 2),
            [b'=', b'=', ..] => (Comparison::Eq, 2),
            [b'!', b'=', ..] => (Comparison::Ne, 2),
            [b'<', ..] => (Comparison::Lt, 1),
            [b'>', ..] => (Comparison::Gt, 1),
            _ => return Err(ThresholdError::MissingOperator(expression.to_string())),
        };

        let aggregation =
            lhs.parse::<Aggregation>()
                .map_err(|_| ThresholdError::UnknownAggregation {
                    aggregation: lhs.to_string(),
                    expression: expression.to_string(),
                })?;

        let bound_str = &rest[op_len..];
        let bound = bound_str
            .parse::<f64>()
            .map_err(|_| ThresholdError::InvalidBound {
                bound: bound_str.to_string(),
                expression: expression.to_string(),
            })?;

        Ok(Self {
            aggregation,
            comparison,
            bound,
        })
    }
}

impl Threshold {
    /// Whether the observed value satisfies the threshold; missing data fails
    pub fn passes(&self, observed: Option<f64>) -> bool {
        observed.is_some_and(|v| self.comparison.holds(v, self.bound))
    }
}

/// Outcome of one threshold expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed: Option<f64>,
    pub passed: bool,
}

/// Parse every expression without evaluating
pub fn parse_thresholds(
    thresholds: &IndexMap<String, Vec<String>>,
) -> Result<Vec<(String, String, Threshold)>, ThresholdError> {
    thresholds
        .iter()
        .flat_map(|(metric, exprs)| exprs.iter().map(move |e| (metric, e)))
        .map(|(metric, expr)| {
            expr.parse::<Threshold>()
                .map(|threshold| (metric.clone(), expr.clone(), threshold))
        })
        .collect()
}

/// Evaluate thresholds against a metric registry
pub fn evaluate_thresholds(
    metrics: &Metrics,
    thresholds: &IndexMap<String, Vec<String>>,
) -> Result<Vec<ThresholdResult>, ThresholdError> {
    Ok(parse_thresholds(thresholds)?
        .into_iter()
        .map(|(metric, expression, threshold)| {
            let observed = metrics.aggregate(&metric, &threshold.aggregation);
            ThresholdResult {
                passed: threshold.passes(observed),
                metric,
                expression,
                observed,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::registry::{CHECKS, HTTP_REQ_DURATION, HTTP_REQ_FAILED};

    #[test]
    fn test_parse_percentile() {
        let t: Threshold = "p(95)<5000".parse().unwrap();
        assert_eq!(t.aggregation, Aggregation::Percentile(95.0));
        assert_eq!(t.comparison, Comparison::Lt);
        assert_eq!(t.bound, 5000.0);
    }

    #[test]
    fn test_parse_with_spaces_and_two_char_ops() {
        let t: Threshold = "rate >= 0.85".parse().unwrap();
        assert_eq!(t.aggregation, Aggregation::Rate);
        assert_eq!(t.comparison, Comparison::Ge);

        let t: Threshold = "count!=0".parse().unwrap();
        assert_eq!(t.comparison, Comparison::Ne);

        let t: Threshold = "p(99.9) <= 1500".parse().unwrap();
        assert_eq!(t.aggregation, Aggregation::Percentile(99.9));
        assert_eq!(t.comparison, Comparison::Le);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "rate".parse::<Threshold>(),
            Err(ThresholdError::MissingOperator(_))
        ));
        assert!(matches!(
            "p(150)<1".parse::<Threshold>(),
            Err(ThresholdError::UnknownAggregation { .. })
        ));
        assert!(matches!(
            "median<1".parse::<Threshold>(),
            Err(ThresholdError::UnknownAggregation { .. })
        ));
        assert!(matches!(
            "avg<fast".parse::<Threshold>(),
            Err(ThresholdError::InvalidBound { .. })
        ));
    }

    #[test]
    fn test_missing_data_fails() {
        let t: Threshold = "rate>0.85".parse().unwrap();
        assert!(!t.passes(None));
        assert!(t.passes(Some(0.9)));
        assert!(!t.passes(Some(0.85)));
    }

    #[test]
    fn test_evaluate_defaults() {
        let metrics = Metrics::new();
        let durations = metrics.trend(HTTP_REQ_DURATION);
        for ms in [120.0, 250.0, 6000.0] {
            durations.add(ms);
        }
        let failed = metrics.rate(HTTP_REQ_FAILED);
        for _ in 0..19 {
            failed.add(false);
        }
        failed.add(true);
        for _ in 0..9 {
            metrics.check("ok", true);
        }
        metrics.check("ok", false);

        let mut thresholds = IndexMap::new();
        thresholds.insert(HTTP_REQ_DURATION.to_string(), vec!["p(95)<5000".to_string()]);
        thresholds.insert(HTTP_REQ_FAILED.to_string(), vec!["rate<0.1".to_string()]);
        thresholds.insert(CHECKS.to_string(), vec!["rate>0.85".to_string()]);

        let results = evaluate_thresholds(&metrics, &thresholds).unwrap();
        assert_eq!(results.len(), 3);
        assert!(!results[0].passed, "p95 is above 5000ms");
        assert!(results[1].passed, "5% failures is below 10%");
        assert!(results[2].passed, "90% checks is above 85%");
    }
}
