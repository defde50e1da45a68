//! Load-test scenarios
//!
//! This module provides the `Scenario` trait and the scenarios run against
//! the visitor-management API.
//!
//! - **health**: one-shot probe of the service endpoints
//! - **visitor-flow**: seven-step visitor registration under ramping load
//!
//! ## Adding New Scenarios
//!
//! 1. Create a new file in `src/scenarios/`
//! 2. Implement the `Scenario` trait
//! 3. Register in `registry.rs`

mod health;
pub mod identity;
pub mod registry;
mod traits;
mod visitor_flow;

pub use health::{DEFAULT_PROBE_TIMEOUT, HealthScenario, ProbeStatus, probe_label};
pub use identity::Identity;
pub use registry::{SCENARIOS, get_scenario, list_scenarios};
pub use traits::*;
pub use visitor_flow::{
    ACTIVE_VISITORS, API_SUCCESS_RATE, CONNECTION_ERRORS, DEFAULT_THINK_TIME, StepResults,
    TOTAL_REQUESTS, VISITOR_CREATION_TIME, VisitorFlowScenario, check_label, run_flow,
};
