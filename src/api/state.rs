//! API State management
//!
//! Shared state for the status API, tracking scenario progress and the live
//! metric registries of running scenarios.

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::metrics::{Metrics, MetricsSnapshot};
use crate::scenarios::ScenarioReport;

/// Execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Scenarios are currently running
    Running,
    /// Every scenario held its thresholds
    Completed,
    /// Some scenario crossed a threshold or errored
    Failed,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStatus::Running => write!(f, "running"),
            ExecutionStatus::Completed => write!(f, "completed"),
            ExecutionStatus::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug)]
struct InnerState {
    status: ExecutionStatus,
    started_at: Instant,
    completed_at: Option<Instant>,
    scenarios_total: usize,
    scenarios_passed: usize,
    scenarios_failed: usize,
    /// Registries of scenarios started so far, finished ones included
    live: IndexMap<String, Metrics>,
    running: Vec<String>,
    results: Vec<ScenarioReport>,
}

/// Shared API state
#[derive(Debug, Clone)]
pub struct ApiState {
    inner: Arc<RwLock<InnerState>>,
}

impl Default for ApiState {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiState {
    /// Create new API state
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(InnerState {
                status: ExecutionStatus::Running,
                started_at: Instant::now(),
                completed_at: None,
                scenarios_total: 0,
                scenarios_passed: 0,
                scenarios_failed: 0,
                live: IndexMap::new(),
                running: Vec::new(),
                results: Vec::new(),
            })),
        }
    }

    /// Set total number of scenarios to run
    pub fn set_total_scenarios(&self, total: usize) {
        self.inner.write().scenarios_total = total;
    }

    /// Mark a scenario as started, exposing its registry
    pub fn start_scenario(&self, name: &str, metrics: Metrics) {
        let mut state = self.inner.write();
        state.live.insert(name.to_string(), metrics);
        state.running.push(name.to_string());
    }

    /// Record a finished scenario
    pub fn record_result(&self, report: ScenarioReport) {
        let mut state = self.inner.write();
        if report.passed {
            state.scenarios_passed += 1;
        } else {
            state.scenarios_failed += 1;
        }
        state.running.retain(|name| *name != report.scenario);
        state.results.push(report);
    }

    /// Record a scenario that ended without a report
    pub fn record_error(&self, name: &str) {
        let mut state = self.inner.write();
        state.scenarios_failed += 1;
        state.running.retain(|n| n != name);
    }

    /// Mark execution as complete
    pub fn complete(&self, success: bool) {
        let mut state = self.inner.write();
        state.status = if success {
            ExecutionStatus::Completed
        } else {
            ExecutionStatus::Failed
        };
        state.completed_at = Some(Instant::now());
        state.running.clear();
    }

    /// Get current status
    pub fn status(&self) -> ExecutionStatus {
        self.inner.read().status
    }

    /// Get status summary for API response
    pub fn get_status_response(&self) -> StatusResponse {
        let state = self.inner.read();
        StatusResponse {
            status: state.status,
            scenarios_total: state.scenarios_total,
            scenarios_completed: state.scenarios_passed + state.scenarios_failed,
            scenarios_passed: state.scenarios_passed,
            scenarios_failed: state.scenarios_failed,
            running: state.running.clone(),
            elapsed_ms: state.started_at.elapsed().as_millis() as u64,
            duration_ms: state
                .completed_at
                .map(|t| t.duration_since(state.started_at).as_millis() as u64),
        }
    }

    /// Get all results
    pub fn get_results(&self) -> Vec<ScenarioReport> {
        self.inner.read().results.clone()
    }

    /// Current metric values of every started scenario
    pub fn live_snapshots(&self) -> Vec<(String, MetricsSnapshot)> {
        let live: Vec<_> = self
            .inner
            .read()
            .live
            .iter()
            .map(|(name, metrics)| (name.clone(), metrics.clone()))
            .collect();
        // Snapshot outside the state lock
        live.into_iter()
            .map(|(name, metrics)| (name, metrics.snapshot()))
            .collect()
    }

    /// Check if execution is complete
    pub fn is_complete(&self) -> bool {
        self.inner.read().status != ExecutionStatus::Running
    }

    /// Get elapsed time
    pub fn elapsed(&self) -> Duration {
        self.inner.read().started_at.elapsed()
    }
}

/// Status API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: ExecutionStatus,
    pub scenarios_total: usize,
    pub scenarios_completed: usize,
    pub scenarios_passed: usize,
    pub scenarios_failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub running: Vec<String>,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

/// Health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: ExecutionStatus,
}

/// Results response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub status: ExecutionStatus,
    pub results: Vec<ScenarioReport>,
}
