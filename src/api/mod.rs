//! Status HTTP API
//!
//! Provides an HTTP API for monitoring a load run while it executes, so
//! orchestration tools can wait for completion and scrape live metrics.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check (always returns 200 if running)
//! - `GET /status` - Current execution status
//! - `GET /results` - Scenario reports (202 until the run completes)
//! - `GET /metrics` - Prometheus exposition of run progress and live metrics

mod metrics;
mod server;
mod state;

pub use metrics::render as render_metrics;
pub use server::{create_router, start_api_server};
pub use state::{ApiState, ExecutionStatus, HealthResponse, ResultsResponse, StatusResponse};
