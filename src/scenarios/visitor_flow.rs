//! Visitor Flow
//!
//! Walks a new visitor through registration, one virtual visitor per
//! iteration.
//!
//! ## What it checks
//!
//! 1. Security desk login
//! 2. Organization and referral lookups
//! 3. OTP generation and verification for a fresh mobile number
//! 4. Visitor record creation (timed into `visitor_creation_time`)
//! 5. Visitor listing for the configured location
//!
//! Each step passes on status `200`. Steps run strictly in order; a transport
//! error aborts the rest of the iteration and is counted in
//! `connection_errors` instead of producing checks.
//!
//! ## Options
//!
//! - `timeout`: Per-request timeout (default: 30s)
//! - `think_time`: Pause after each iteration (default: 2s)
//! - `executor`: default ramp 5 -> 10 -> 20 -> 5 -> 0 VUs over 7s

use async_trait::async_trait;
use indexmap::IndexMap;
use std::time::Duration;
use tracing::{debug, error, info};

use super::identity::Identity;
use super::traits::{Scenario, ScenarioContext, ScenarioOptions};
use crate::client::{ClientResult, DEFAULT_FLOW_TIMEOUT, Endpoint, HttpResponse};
use crate::executor::{ExecutorConfig, Stage};
use crate::metrics::{CHECKS, Gauge, HTTP_REQ_DURATION, HTTP_REQ_FAILED};

pub const VISITOR_CREATION_TIME: &str = "visitor_creation_time";
pub const API_SUCCESS_RATE: &str = "api_success_rate";
pub const ACTIVE_VISITORS: &str = "active_visitors";
pub const TOTAL_REQUESTS: &str = "total_requests";
pub const CONNECTION_ERRORS: &str = "connection_errors";

/// Default pause after each iteration
pub const DEFAULT_THINK_TIME: Duration = Duration::from_secs(2);

/// Check recorded for a flow step
pub fn check_label(endpoint: Endpoint) -> &'static str {
    match endpoint {
        Endpoint::SecurityLogin => "Security Login successful",
        Endpoint::GetOrganizations => "Get Organizations successful",
        Endpoint::GetReferrals => "Get Referrals successful",
        Endpoint::GenerateOtp => "Generate OTP successful",
        Endpoint::VerifyOtp => "Verify OTP successful",
        Endpoint::CreateVisitorRecord => "Create Visitor successful",
        Endpoint::GetVisitors => "Get Visitors successful",
    }
}

/// Pass/fail of every completed step, in call order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepResults {
    steps: Vec<(Endpoint, bool)>,
}

impl StepResults {
    fn record(&mut self, endpoint: Endpoint, response: &HttpResponse) {
        self.steps.push((endpoint, response.is_ok()));
    }

    pub fn iter(&self) -> impl Iterator<Item = (Endpoint, bool)> + '_ {
        self.steps.iter().copied()
    }

    pub fn get(&self, endpoint: Endpoint) -> Option<bool> {
        self.iter().find(|(e, _)| *e == endpoint).map(|(_, ok)| ok)
    }

    /// True when all seven steps ran and passed
    pub fn all_passed(&self) -> bool {
        self.steps.len() == Endpoint::FLOW.len() && self.steps.iter().all(|(_, ok)| *ok)
    }

    pub fn failed(&self) -> Vec<Endpoint> {
        self.iter().filter(|(_, ok)| !ok).map(|(e, _)| e).collect()
    }
}

/// Holds `active_visitors` up for the life of an iteration
struct ActiveVisitor(Gauge);

impl ActiveVisitor {
    fn enter(gauge: Gauge) -> Self {
        gauge.add(1.0);
        Self(gauge)
    }
}

impl Drop for ActiveVisitor {
    fn drop(&mut self) {
        self.0.add(-1.0);
    }
}

/// Run the seven requests for `identity`, stopping at the first transport error
pub async fn run_flow(ctx: &ScenarioContext, identity: &Identity) -> ClientResult<StepResults> {
    let visitor = &ctx.visitor;
    let total_requests = ctx.metrics.counter(TOTAL_REQUESTS);
    let mut steps = StepResults::default();

    total_requests.inc();
    let response = visitor.security_login().await?;
    steps.record(Endpoint::SecurityLogin, &response);

    total_requests.inc();
    let response = visitor.get_organizations().await?;
    steps.record(Endpoint::GetOrganizations, &response);

    total_requests.inc();
    let response = visitor.get_referrals().await?;
    steps.record(Endpoint::GetReferrals, &response);

    total_requests.inc();
    let response = visitor.generate_otp(&identity.mobile).await?;
    steps.record(Endpoint::GenerateOtp, &response);

    total_requests.inc();
    let response = visitor
        .verify_otp(&identity.mobile, &ctx.settings.otp)
        .await?;
    steps.record(Endpoint::VerifyOtp, &response);

    let record = identity.record(&ctx.settings);
    total_requests.inc();
    let response = visitor.create_visitor_record(&record).await?;
    ctx.metrics
        .trend(VISITOR_CREATION_TIME)
        .add(response.duration.as_secs_f64() * 1000.0);
    steps.record(Endpoint::CreateVisitorRecord, &response);

    total_requests.inc();
    let response = visitor.get_visitors(&ctx.settings.location).await?;
    steps.record(Endpoint::GetVisitors, &response);

    Ok(steps)
}

/// Visitor registration flow scenario
pub struct VisitorFlowScenario;

impl VisitorFlowScenario {
    /// Ramp used when no executor is configured
    pub fn default_stages() -> Vec<Stage> {
        vec![
            Stage::new(Duration::from_secs(1), 5),
            Stage::new(Duration::from_secs(3), 10),
            Stage::new(Duration::from_secs(1), 20),
            Stage::new(Duration::from_secs(1), 5),
            Stage::new(Duration::from_secs(1), 0),
        ]
    }

    /// Thresholds used when none are configured
    pub fn default_thresholds() -> IndexMap<String, Vec<String>> {
        IndexMap::from([
            (HTTP_REQ_DURATION.to_string(), vec!["p(95)<5000".to_string()]),
            (HTTP_REQ_FAILED.to_string(), vec!["rate<0.1".to_string()]),
            (CHECKS.to_string(), vec!["rate>0.85".to_string()]),
        ])
    }
}

#[async_trait]
impl Scenario for VisitorFlowScenario {
    fn name(&self) -> &'static str {
        "visitor-flow"
    }

    fn description(&self) -> &'static str {
        "Register a new visitor end to end under ramping load"
    }

    async fn iteration(&self, ctx: &ScenarioContext) -> bool {
        let identity = Identity::generate(&mut rand::rng(), &ctx.settings.mobile_prefix);
        let _active = ActiveVisitor::enter(ctx.metrics.gauge(ACTIVE_VISITORS));

        debug!(test_id = %identity.test_id, mobile = %identity.mobile, "Starting visitor flow");

        let success = match run_flow(ctx, &identity).await {
            Ok(steps) => {
                for (endpoint, passed) in steps.iter() {
                    ctx.metrics.check(check_label(endpoint), passed);
                }
                let success = steps.all_passed();
                if !success {
                    info!(
                        test_id = %identity.test_id,
                        failed = ?steps.failed(),
                        "Some requests failed in iteration {}",
                        identity.test_id
                    );
                }
                success
            }
            Err(e) => {
                ctx.metrics.counter(CONNECTION_ERRORS).inc();
                error!(test_id = %identity.test_id, error = %e, "Test {} error", identity.test_id);
                false
            }
        };

        ctx.metrics.rate(API_SUCCESS_RATE).add(success);
        success
    }

    fn default_options(&self) -> ScenarioOptions {
        ScenarioOptions {
            timeout: DEFAULT_FLOW_TIMEOUT,
            think_time: DEFAULT_THINK_TIME,
            executor: ExecutorConfig::ramping(Self::default_stages()),
            thresholds: Self::default_thresholds(),
        }
    }
}
