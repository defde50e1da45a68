//! Health Probe
//!
//! Polls the configured probe URLs once per iteration.
//!
//! ## What it checks
//!
//! 1. Each URL answers a plain GET (no API headers)
//! 2. The answer is `200`, recorded as check `Endpoint <index> is accessible`
//!
//! A transport failure counts as status `0` and is logged as a refused
//! connection. Failures never abort the iteration.
//!
//! ## Options
//!
//! - `timeout`: Per-request timeout (default: 10s)
//! - `executor`: default one VU, one iteration

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::traits::{Scenario, ScenarioContext, ScenarioOptions};
use crate::executor::ExecutorConfig;

/// Default per-request timeout for probes
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Classified probe outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStatus {
    /// Status 200
    Accessible,
    /// No response at all
    Unreachable,
    /// Any other status
    Unexpected(u16),
}

impl ProbeStatus {
    pub fn from_status(status: u16) -> Self {
        match status {
            200 => ProbeStatus::Accessible,
            0 => ProbeStatus::Unreachable,
            other => ProbeStatus::Unexpected(other),
        }
    }

    pub fn is_accessible(&self) -> bool {
        matches!(self, ProbeStatus::Accessible)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Accessible => write!(f, "accessible"),
            ProbeStatus::Unreachable => write!(f, "unreachable"),
            ProbeStatus::Unexpected(status) => write!(f, "unexpected status {status}"),
        }
    }
}

/// Check label for the probe at `index`
pub fn probe_label(index: usize) -> String {
    format!("Endpoint {index} is accessible")
}

/// Health probe scenario
pub struct HealthScenario;

impl HealthScenario {
    /// Probe every URL in order and return each outcome
    pub async fn probe_all(ctx: &ScenarioContext) -> Vec<ProbeStatus> {
        let mut outcomes = Vec::with_capacity(ctx.probe_urls.len());

        for (index, url) in ctx.probe_urls.iter().enumerate() {
            let request = ctx
                .http
                .inner()
                .get(url.clone())
                .timeout(ctx.request_timeout);

            let status = match ctx.http.send(request, "health_probe").await {
                Ok(response) => response.status,
                Err(e) => {
                    debug!(endpoint = index, url = %url, error = %e, "Probe request failed");
                    0
                }
            };

            let outcome = ProbeStatus::from_status(status);
            ctx.metrics.check(&probe_label(index), outcome.is_accessible());

            match outcome {
                ProbeStatus::Accessible => debug!(endpoint = index, url = %url, "Endpoint accessible"),
                ProbeStatus::Unreachable => {
                    warn!(endpoint = index, url = %url, "Connection refused for endpoint {index}")
                }
                ProbeStatus::Unexpected(status) => {
                    info!(endpoint = index, url = %url, status, "Endpoint returned unexpected status")
                }
            }
            outcomes.push(outcome);
        }

        outcomes
    }
}

#[async_trait]
impl Scenario for HealthScenario {
    fn name(&self) -> &'static str {
        "health"
    }

    fn description(&self) -> &'static str {
        "Probe the service endpoints for a 200 response"
    }

    async fn iteration(&self, ctx: &ScenarioContext) -> bool {
        Self::probe_all(ctx)
            .await
            .iter()
            .all(ProbeStatus::is_accessible)
    }

    fn default_options(&self) -> ScenarioOptions {
        ScenarioOptions {
            timeout: DEFAULT_PROBE_TIMEOUT,
            think_time: Duration::ZERO,
            executor: ExecutorConfig::shared(1, 1),
            ..ScenarioOptions::default()
        }
    }
}
