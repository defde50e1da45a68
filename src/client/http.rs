//! Instrumented HTTP client
//!
//! Thin wrapper over `reqwest` that records the built-in request metrics
//! (`http_reqs`, `http_req_duration`, `http_req_failed`) for every call.

use reqwest::{Client, RequestBuilder};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

use crate::metrics::{HTTP_REQ_DURATION, HTTP_REQ_FAILED, HTTP_REQS, Metrics};

/// Errors that can occur when talking to the target API
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ClientError {
    /// Whether the request timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Request(e) if e.is_timeout())
    }

    /// Whether the connection could not be established
    pub fn is_connect(&self) -> bool {
        matches!(self, ClientError::Request(e) if e.is_connect())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Status and timing of a completed request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub duration: Duration,
    pub body_len: usize,
}

impl HttpResponse {
    /// Exactly HTTP 200
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Whether a status counts as a failed request (`http_req_failed`)
pub fn is_failed_status(status: u16) -> bool {
    !(200..400).contains(&status)
}

/// HTTP client bound to a metric registry
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    metrics: Metrics,
}

impl HttpClient {
    /// Create a client recording into `metrics`
    pub fn new(metrics: Metrics) -> ClientResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("turnstile/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, metrics))
    }

    /// Create a client around an existing `reqwest::Client`
    pub fn with_client(client: Client, metrics: Metrics) -> Self {
        Self { client, metrics }
    }

    /// Underlying `reqwest` client, for building requests
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Registry this client records into
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Send a request, draining the body, and record request metrics
    ///
    /// Non-success statuses are returned as `Ok`; only transport failures
    /// (connect, timeout, body read) are errors.
    pub async fn send(&self, request: RequestBuilder, tag: &str) -> ClientResult<HttpResponse> {
        let start = Instant::now();
        let result = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>((status, body.len()))
        }
        .await;
        let duration = start.elapsed();

        self.metrics.counter(HTTP_REQS).inc();
        self.metrics
            .trend(HTTP_REQ_DURATION)
            .add(duration.as_secs_f64() * 1000.0);

        match result {
            Ok((status, body_len)) => {
                self.metrics
                    .rate(HTTP_REQ_FAILED)
                    .add(is_failed_status(status));
                debug!(api = tag, status, duration_ms = duration.as_millis(), "Request complete");
                Ok(HttpResponse {
                    status,
                    duration,
                    body_len,
                })
            }
            Err(e) => {
                self.metrics.rate(HTTP_REQ_FAILED).add(true);
                debug!(api = tag, error = %e, duration_ms = duration.as_millis(), "Request error");
                Err(e.into())
            }
        }
    }
}
