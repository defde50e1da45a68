//! Turnstile - load testing for the visitor-management API
//!
//! Drives virtual users through the visitor registration workflow, probes
//! service health, aggregates request metrics and judges the run against
//! thresholds.
//!
//! ## Modules
//!
//! - [`client`] - instrumented HTTP client and visitor-management API calls
//! - [`metrics`] - counters, gauges, rates, trends and thresholds
//! - [`scenarios`] - the `Scenario` trait, health probe and visitor flow
//! - [`executor`] - ramping-vus and shared-iterations scheduling
//! - [`config`] - YAML run configuration
//! - [`summary`] - end-of-run console summary
//! - [`api`] - status HTTP API with Prometheus metrics

pub mod api;
pub mod client;
pub mod config;
pub mod executor;
pub mod metrics;
pub mod scenarios;
pub mod summary;
