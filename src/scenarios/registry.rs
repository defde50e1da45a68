//! Scenario registry
//!
//! Central registry of all available scenarios. New scenarios should be
//! registered here.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use std::sync::Arc;

use super::traits::Scenario;
use super::{HealthScenario, VisitorFlowScenario};

/// Global registry of all available scenarios
///
/// Insertion order is the order `list` prints and `run` starts them in.
pub static SCENARIOS: Lazy<IndexMap<&'static str, Arc<dyn Scenario>>> = Lazy::new(|| {
    let mut m: IndexMap<&'static str, Arc<dyn Scenario>> = IndexMap::new();

    m.insert("health", Arc::new(HealthScenario));
    m.insert("visitor-flow", Arc::new(VisitorFlowScenario));

    m
});

/// Get a scenario by name
pub fn get_scenario(name: &str) -> Option<Arc<dyn Scenario>> {
    SCENARIOS.get(name).cloned()
}

/// List all available scenario names
pub fn list_scenarios() -> Vec<&'static str> {
    SCENARIOS.keys().copied().collect()
}
