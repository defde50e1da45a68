//! Prometheus metrics
//!
//! Exposes run progress and every scenario's live metrics in Prometheus text
//! format at `/metrics`.
//!
//! ## Metrics Exposed
//!
//! - `turnstile_execution_status` - 0=running, 1=completed, 2=failed
//! - `turnstile_scenarios_total`, `turnstile_scenarios_completed`,
//!   `turnstile_scenarios_passed`, `turnstile_scenarios_failed`
//! - `turnstile_elapsed_seconds`
//! - one family per run metric, labelled by `scenario`:
//!   counters as `<name>_total`, rates as `<name>_rate`, gauges as `<name>`,
//!   trends as `<name>` with a `stat` label (avg, min, med, max, p90, p95)
//! - `turnstile_check_passes` / `turnstile_check_fails` per named check
//!
//! ```yaml
//! scrape_configs:
//!   - job_name: 'turnstile'
//!     static_configs:
//!       - targets: ['turnstile:8080']
//!     metrics_path: '/metrics'
//! ```

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use indexmap::IndexMap;
use std::fmt::{self, Write};

use super::state::{ApiState, ExecutionStatus};
use crate::metrics::{MetricKind, MetricValues};

const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Generate Prometheus-format metrics
pub async fn metrics_handler(State(state): State<ApiState>) -> impl IntoResponse {
    match render(&state) {
        Ok(output) => (StatusCode::OK, [("content-type", CONTENT_TYPE)], output),
        Err(_) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", CONTENT_TYPE)],
            String::new(),
        ),
    }
}

/// One sample line: labels and value
type Sample = (Vec<(&'static str, String)>, f64);

/// Render the exposition text
pub fn render(state: &ApiState) -> Result<String, fmt::Error> {
    let status = state.get_status_response();
    let mut output = String::new();

    writeln!(output, "# HELP turnstile_info Turnstile build information")?;
    writeln!(output, "# TYPE turnstile_info gauge")?;
    writeln!(
        output,
        "turnstile_info{{version=\"{}\"}} 1",
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(output)?;

    let status_value = match status.status {
        ExecutionStatus::Running => 0,
        ExecutionStatus::Completed => 1,
        ExecutionStatus::Failed => 2,
    };
    write_single(
        &mut output,
        "turnstile_execution_status",
        "Current execution status (0=running, 1=completed, 2=failed)",
        status_value as f64,
    )?;
    write_single(
        &mut output,
        "turnstile_scenarios_total",
        "Total number of scenarios selected",
        status.scenarios_total as f64,
    )?;
    write_single(
        &mut output,
        "turnstile_scenarios_completed",
        "Number of scenarios finished",
        status.scenarios_completed as f64,
    )?;
    write_single(
        &mut output,
        "turnstile_scenarios_passed",
        "Number of scenarios that held their thresholds",
        status.scenarios_passed as f64,
    )?;
    write_single(
        &mut output,
        "turnstile_scenarios_failed",
        "Number of scenarios that crossed a threshold or errored",
        status.scenarios_failed as f64,
    )?;
    write_single(
        &mut output,
        "turnstile_elapsed_seconds",
        "Time elapsed since start",
        status.elapsed_ms as f64 / 1000.0,
    )?;

    // Group samples by family so each HELP/TYPE header appears once
    let mut families: IndexMap<String, (MetricKind, Vec<Sample>)> = IndexMap::new();
    let mut check_passes = Vec::new();
    let mut check_fails = Vec::new();

    for (scenario, snapshot) in state.live_snapshots() {
        for (name, values) in &snapshot.metrics {
            let base = sanitize(name);
            let scenario_label = ("scenario", scenario.clone());
            match values {
                MetricValues::Counter(v) => families
                    .entry(format!("turnstile_{base}_total"))
                    .or_insert_with(|| (MetricKind::Counter, Vec::new()))
                    .1
                    .push((vec![scenario_label], v.count)),
                MetricValues::Gauge(v) => families
                    .entry(format!("turnstile_{base}"))
                    .or_insert_with(|| (MetricKind::Gauge, Vec::new()))
                    .1
                    .push((vec![scenario_label], v.value)),
                MetricValues::Rate(v) => families
                    .entry(format!("turnstile_{base}_rate"))
                    .or_insert_with(|| (MetricKind::Rate, Vec::new()))
                    .1
                    .push((vec![scenario_label], v.rate)),
                MetricValues::Trend(v) => {
                    let samples = &mut families
                        .entry(format!("turnstile_{base}"))
                        .or_insert_with(|| (MetricKind::Trend, Vec::new()))
                        .1;
                    for (stat, value) in [
                        ("avg", v.avg),
                        ("min", v.min),
                        ("med", v.med),
                        ("max", v.max),
                        ("p90", v.p90),
                        ("p95", v.p95),
                    ] {
                        samples.push((
                            vec![scenario_label.clone(), ("stat", stat.to_string())],
                            value,
                        ));
                    }
                }
            }
        }

        for (check, tally) in &snapshot.checks {
            let labels = vec![("scenario", scenario.clone()), ("check", check.clone())];
            check_passes.push((labels.clone(), tally.passes as f64));
            check_fails.push((labels, tally.fails as f64));
        }
    }

    for (family, (kind, samples)) in &families {
        let prom_type = match kind {
            MetricKind::Counter => "counter",
            _ => "gauge",
        };
        writeln!(output, "# HELP {family} Run metric ({kind})")?;
        writeln!(output, "# TYPE {family} {prom_type}")?;
        for sample in samples {
            write_sample(&mut output, family, sample)?;
        }
        writeln!(output)?;
    }

    if !check_passes.is_empty() {
        for (family, help, samples) in [
            ("turnstile_check_passes", "Passed evaluations per check", &check_passes),
            ("turnstile_check_fails", "Failed evaluations per check", &check_fails),
        ] {
            writeln!(output, "# HELP {family} {help}")?;
            writeln!(output, "# TYPE {family} counter")?;
            for sample in samples {
                write_sample(&mut output, family, sample)?;
            }
            writeln!(output)?;
        }
    }

    Ok(output)
}

fn write_single(output: &mut String, name: &str, help: &str, value: f64) -> fmt::Result {
    writeln!(output, "# HELP {name} {help}")?;
    writeln!(output, "# TYPE {name} gauge")?;
    writeln!(output, "{name} {value}")?;
    writeln!(output)
}

fn write_sample(output: &mut String, family: &str, (labels, value): &Sample) -> fmt::Result {
    let labels = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    writeln!(output, "{family}{{{labels}}} {value}")
}

/// Metric names may only hold `[a-zA-Z0-9_:]`
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == ':' { c } else { '_' })
        .collect()
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}
