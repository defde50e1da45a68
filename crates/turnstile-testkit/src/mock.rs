//! Mock visitor-management API
//!
//! An in-process axum server answering the endpoints of the visitor
//! registration flow and the health probe, so scenarios can be exercised
//! without a real deployment. Every request is recorded for assertions.
//!
//! # Example
//!
//! ```rust,no_run
//! use turnstile_testkit::mock::MockVisitorApi;
//!
//! # async fn example() -> std::io::Result<()> {
//! let server = MockVisitorApi::new()
//!     .with_otp("341470")
//!     .failing("visitor.get_referral", 500)
//!     .spawn()
//!     .await?;
//!
//! let base_url = server.base_url();
//! // ... point a client at base_url ...
//! assert!(server.requests().is_empty());
//! # Ok(())
//! # }
//! ```

use axum::{
    Json, Router,
    body::Bytes,
    extract::{RawQuery, State},
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::debug;

/// Path prefix of every API method
pub const METHOD_PREFIX: &str = "/api/method/visitor_management.custom_api.";

/// Security desk page polled by the health probe
pub const SECURITY_DESK_PATH: &str = "/security_desk/visitor";

/// A request as the mock received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    /// Query string exactly as sent
    pub raw_query: Option<String>,
    /// Decoded query parameters
    pub query: HashMap<String, String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl RecordedRequest {
    /// `<module>.<method>` when this was an API call
    pub fn api_method(&self) -> Option<&str> {
        self.path.strip_prefix(METHOD_PREFIX)
    }
}

/// Behaviour of a mock server, built before spawning
#[derive(Debug, Clone)]
pub struct MockVisitorApi {
    accepted_otp: String,
    failing: HashMap<String, u16>,
    health_status: u16,
    latency: Duration,
    authorization: Option<String>,
}

impl Default for MockVisitorApi {
    fn default() -> Self {
        Self {
            accepted_otp: "341470".to_string(),
            failing: HashMap::new(),
            health_status: 200,
            latency: Duration::ZERO,
            authorization: None,
        }
    }
}

impl MockVisitorApi {
    /// Mock accepting the default OTP, with every endpoint healthy
    pub fn new() -> Self {
        Self::default()
    }

    /// OTP that `verify_otp` accepts
    pub fn with_otp(mut self, otp: impl Into<String>) -> Self {
        self.accepted_otp = otp.into();
        self
    }

    /// Answer `method_path` (e.g. `visitor.get_org`) with `status`
    pub fn failing(mut self, method_path: impl Into<String>, status: u16) -> Self {
        self.failing.insert(method_path.into(), status);
        self
    }

    /// Status of the security desk page
    pub fn with_health_status(mut self, status: u16) -> Self {
        self.health_status = status;
        self
    }

    /// Delay before every response
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Reject API calls without `Authorization: token <key>:<secret>`
    pub fn with_token(mut self, api_key: &str, api_secret: &str) -> Self {
        self.authorization = Some(format!("token {api_key}:{api_secret}"));
        self
    }

    /// Bind an ephemeral loopback port and start serving
    pub async fn spawn(self) -> std::io::Result<MockServer> {
        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(MockState {
            config: self,
            requests: Mutex::new(Vec::new()),
            created: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                debug!(error = %e, "Mock server stopped");
            }
        });

        debug!(%addr, "Mock visitor API listening");
        Ok(MockServer { addr, state, task })
    }
}

#[derive(Debug)]
struct MockState {
    config: MockVisitorApi,
    requests: Mutex<Vec<RecordedRequest>>,
    created: Mutex<Vec<Value>>,
}

/// A running mock; stops when dropped
#[derive(Debug)]
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockServer {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// `http://127.0.0.1:<port>`
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url())
    }

    /// The two URLs the health probe polls by default, on this server
    pub fn health_urls(&self) -> Vec<String> {
        vec![
            self.url(SECURITY_DESK_PATH),
            self.url(&format!("{METHOD_PREFIX}visitor.get_org")),
        ]
    }

    /// Every request received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Requests to one API method
    pub fn requests_to(&self, method_path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.api_method() == Some(method_path))
            .collect()
    }

    /// Visitor records accepted by `create_visitor_record`, decoded
    pub fn created_visitors(&self) -> Vec<Value> {
        self.state.created.lock().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// URL on loopback where nothing is listening
pub fn unreachable_url() -> std::io::Result<String> {
    let listener = std::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("http://{addr}"))
}

async fn handle(
    State(state): State<Arc<MockState>>,
    method: Method,
    uri: Uri,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let header_value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    let query: HashMap<String, String> = raw_query
        .as_deref()
        .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let request = RecordedRequest {
        method,
        path: uri.path().to_string(),
        raw_query,
        query,
        authorization: header_value(header::AUTHORIZATION),
        content_type: header_value(header::CONTENT_TYPE),
        body: String::from_utf8_lossy(&body).into_owned(),
    };
    state.requests.lock().push(request.clone());

    if !state.config.latency.is_zero() {
        tokio::time::sleep(state.config.latency).await;
    }

    let config = &state.config;
    if request.path == SECURITY_DESK_PATH {
        return reply(config.health_status, json!({ "page": "security_desk" }));
    }

    let Some(api_method) = request.api_method() else {
        return reply(404, json!({ "exc_type": "DoesNotExistError" }));
    };

    if let Some(status) = config.failing.get(api_method) {
        return reply(*status, json!({ "exc_type": "MockFailure" }));
    }

    if let Some(expected) = &config.authorization {
        if request.authorization.as_ref() != Some(expected) {
            return reply(401, json!({ "exc_type": "AuthenticationError" }));
        }
    }

    let is_get = request.method == Method::GET;
    let is_post = request.method == Method::POST;
    match api_method {
        "entry_exit.security_login" if is_post => {
            reply(200, json!({ "message": { "logged_in": true } }))
        }
        "visitor.get_org" if is_get => reply(200, json!({ "message": [{ "name": "Org-1" }] })),
        "visitor.get_referral" if is_get => {
            reply(200, json!({ "message": [{ "name": "EMP4_FH" }] }))
        }
        "visitor.generate_and_send_otp" if is_get => match request.query.get("mobile") {
            Some(mobile) if is_mobile(mobile) => reply(200, json!({ "message": "OTP sent" })),
            _ => reply(417, json!({ "exc_type": "ValidationError" })),
        },
        "visitor.verify_otp" if is_get => {
            if request.query.get("otp") == Some(&config.accepted_otp) {
                reply(200, json!({ "message": "verified" }))
            } else {
                reply(401, json!({ "exc_type": "InvalidOTP" }))
            }
        }
        "visitor.create_visitor_record" if is_post => match decode_visitor(&request.body) {
            Some(record) => {
                state.created.lock().push(record);
                reply(200, json!({ "message": "created" }))
            }
            None => reply(417, json!({ "exc_type": "ValidationError" })),
        },
        "visitor.get_visitors" if is_get => match request.query.get("location") {
            Some(location) => reply(200, json!({ "message": [], "location": location })),
            None => reply(417, json!({ "exc_type": "ValidationError" })),
        },
        _ => reply(404, json!({ "exc_type": "DoesNotExistError" })),
    }
}

fn reply(status: u16, body: Value) -> Response {
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(body)).into_response()
}

fn is_mobile(value: &str) -> bool {
    value.len() == 10 && value.chars().all(|c| c.is_ascii_digit())
}

/// Unwrap `{"data": "<record json>"}` into the record object
fn decode_visitor(body: &str) -> Option<Value> {
    let envelope: Value = serde_json::from_str(body).ok()?;
    let inner = envelope.get("data")?.as_str()?;
    let record: Value = serde_json::from_str(inner).ok()?;
    let fields = record.as_object()?;
    (fields.contains_key("visitor_name") && fields.contains_key("mobile_number")).then_some(record)
}
