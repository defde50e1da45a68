//! HTTP Server for Status API
//!
//! Axum-based HTTP server providing status endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::metrics::metrics_handler;
use super::state::{ApiState, ExecutionStatus, HealthResponse, ResultsResponse, StatusResponse};

/// Start the API server on the given port
///
/// Runs until the process exits.
pub async fn start_api_server(
    port: u16,
    state: ApiState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = port, "Starting status API server");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the API router
pub fn create_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/results", get(results_handler))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
///
/// Returns 200 if the service is running.
async fn health_handler(State(state): State<ApiState>) -> Json<HealthResponse> {
    let status = state.status();
    Json(HealthResponse {
        healthy: true,
        status,
    })
}

/// Status endpoint
///
/// Returns current execution status and progress.
async fn status_handler(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(state.get_status_response())
}

/// Results endpoint
///
/// Returns all scenario reports.
/// Returns 202 Accepted while scenarios are still running.
async fn results_handler(State(state): State<ApiState>) -> (StatusCode, Json<ResultsResponse>) {
    let status = state.status();
    let results = state.get_results();

    let status_code = match status {
        ExecutionStatus::Running => StatusCode::ACCEPTED,
        ExecutionStatus::Completed => StatusCode::OK,
        ExecutionStatus::Failed => StatusCode::OK, // Crossed thresholds still have results
    };

    (status_code, Json(ResultsResponse { status, results }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSnapshot;
    use crate::scenarios::ScenarioReport;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    async fn get_path(state: ApiState, uri: &str) -> axum::response::Response {
        create_router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = get_path(ApiState::new(), "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let state = ApiState::new();
        state.set_total_scenarios(2);

        let response = get_path(state, "/status").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let status: StatusResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(status.scenarios_total, 2);
        assert_eq!(status.status, ExecutionStatus::Running);
    }

    #[tokio::test]
    async fn test_results_running() {
        let response = get_path(ApiState::new(), "/results").await;

        // Should return 202 Accepted while running
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_results_completed() {
        let state = ApiState::new();
        state.record_result(ScenarioReport::new(
            "health",
            MetricsSnapshot::default(),
            vec![],
            Duration::from_millis(12),
        ));
        state.complete(true);

        let response = get_path(state, "/results").await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let results: ResultsResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(results.status, ExecutionStatus::Completed);
        assert_eq!(results.results.len(), 1);
        assert_eq!(results.results[0].scenario, "health");
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let response = get_path(ApiState::new(), "/metrics").await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
