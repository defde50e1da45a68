//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::time::Duration;

use turnstile::config::{TargetConfig, VisitorConfig};
use turnstile::metrics::Metrics;
use turnstile::scenarios::ScenarioContext;
use turnstile_testkit::MockServer;

pub const API_KEY: &str = "6781f3e727502ca";
pub const API_SECRET: &str = "e5b0baf152d66fc";

/// Target pointing every URL at the mock
pub fn target(server: &MockServer) -> TargetConfig {
    TargetConfig {
        base_url: server.base_url(),
        health_urls: server.health_urls(),
        api_key: API_KEY.to_string(),
        api_secret: API_SECRET.to_string(),
    }
}

pub fn context(target: &TargetConfig, metrics: Metrics, timeout: Duration) -> ScenarioContext {
    ScenarioContext::new(metrics, target, VisitorConfig::default(), timeout)
        .expect("context from valid target")
}

pub fn mock_context(server: &MockServer, metrics: Metrics) -> ScenarioContext {
    context(&target(server), metrics, Duration::from_secs(5))
}
