//! Scenario trait and supporting types
//!
//! A `Scenario` is the body of one virtual iteration. The executor invokes it
//! repeatedly according to `ScenarioOptions` and folds the run into a
//! `ScenarioReport`.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::client::{ClientError, HttpClient, VisitorClient};
use crate::config::{TargetConfig, VisitorConfig};
use crate::executor::ExecutorConfig;
use crate::metrics::{ITERATIONS, Metrics, MetricsSnapshot, ThresholdError, ThresholdResult};

/// Errors that can occur while setting up or running a scenario
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid threshold: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Resolved options for one scenario run
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioOptions {
    /// Per-request timeout
    pub timeout: Duration,
    /// Pause after every iteration
    pub think_time: Duration,
    /// VU scheduling
    pub executor: ExecutorConfig,
    /// metric name -> threshold expressions
    pub thresholds: IndexMap<String, Vec<String>>,
}

impl Default for ScenarioOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            think_time: Duration::ZERO,
            executor: ExecutorConfig::default(),
            thresholds: IndexMap::new(),
        }
    }
}

/// Everything an iteration needs: clients, target settings and the metric registry
#[derive(Debug, Clone)]
pub struct ScenarioContext {
    /// Registry of the current run
    pub metrics: Metrics,
    /// Instrumented client without API headers
    pub http: HttpClient,
    /// Authenticated visitor-management client
    pub visitor: VisitorClient,
    /// Endpoints polled by the health probe
    pub probe_urls: Vec<Url>,
    /// Visitor flow settings
    pub settings: VisitorConfig,
    /// Per-request timeout
    pub request_timeout: Duration,
}

impl ScenarioContext {
    /// Build a context recording into `metrics`
    pub fn new(
        metrics: Metrics,
        target: &TargetConfig,
        settings: VisitorConfig,
        request_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let http = HttpClient::new(metrics.clone())?;
        let visitor = VisitorClient::new(&target.base_url, http.clone())?
            .with_token(&target.api_key, &target.api_secret)
            .with_timeout(request_timeout);
        let probe_urls = target
            .health_urls
            .iter()
            .map(|u| Url::parse(u))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            metrics,
            http,
            visitor,
            probe_urls,
            settings,
            request_timeout,
        })
    }
}

/// Outcome of a finished scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Name of the scenario
    pub scenario: String,
    /// Whether every threshold held
    pub passed: bool,
    /// Completed iterations
    pub iterations: u64,
    /// Wall time of the run
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    /// Threshold outcomes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thresholds: Vec<ThresholdResult>,
    /// Final metric values
    pub metrics: MetricsSnapshot,
    /// Summary message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ScenarioReport {
    /// Create a report from the final snapshot and threshold outcomes
    pub fn new(
        scenario: impl Into<String>,
        metrics: MetricsSnapshot,
        thresholds: Vec<ThresholdResult>,
        duration: Duration,
    ) -> Self {
        let passed = thresholds.iter().all(|t| t.passed);
        let iterations = metrics.count(ITERATIONS).unwrap_or(0.0) as u64;
        Self {
            scenario: scenario.into(),
            passed,
            iterations,
            duration,
            thresholds,
            metrics,
            message: None,
        }
    }

    /// Add a summary message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Thresholds that did not hold
    pub fn crossed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.thresholds.iter().filter(|t| !t.passed)
    }
}

/// Trait for load-test scenarios
///
/// Each scenario is the body of one virtual iteration. Scenarios are
/// registered in the `SCENARIOS` registry and selected by name.
///
/// ## Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
/// use turnstile::scenarios::{Scenario, ScenarioContext};
///
/// pub struct PingScenario;
///
/// #[async_trait]
/// impl Scenario for PingScenario {
///     fn name(&self) -> &'static str { "ping" }
///     fn description(&self) -> &'static str { "GET the site root" }
///
///     async fn iteration(&self, ctx: &ScenarioContext) -> bool {
///         let request = ctx.http.inner().get(ctx.visitor.base_url().clone());
///         matches!(ctx.http.send(request, "ping").await, Ok(r) if r.is_ok())
///     }
/// }
/// ```
#[async_trait]
pub trait Scenario: Send + Sync {
    /// Unique name (used in CLI and config)
    fn name(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &'static str;

    /// Run one virtual iteration, returning whether it succeeded
    ///
    /// Failures are recorded into metrics; iterations never error out.
    async fn iteration(&self, ctx: &ScenarioContext) -> bool;

    /// Default options for this scenario
    fn default_options(&self) -> ScenarioOptions {
        ScenarioOptions::default()
    }
}
