//! Visitor-management HTTP API client
//!
//! One method per endpoint of the registration flow. Every call carries the
//! shared `Authorization: token <key>:<secret>` header and a JSON content
//! type. Responses are reduced to status and timing.

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder};
use std::time::Duration;
use url::Url;

use super::http::{ClientResult, HttpClient, HttpResponse};
use super::types::{API_METHOD_PREFIX, Endpoint, VisitorEnvelope, VisitorRecord};

/// Default per-request timeout for flow calls
pub const DEFAULT_FLOW_TIMEOUT: Duration = Duration::from_secs(30);

/// Body sent to `security_login`
const LOGIN_BODY: &str = "{}";

/// Client for the visitor-management API
///
/// # Example
/// ```no_run
/// use turnstile::client::{HttpClient, VisitorClient};
/// use turnstile::metrics::Metrics;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let http = HttpClient::new(Metrics::new())?;
/// let client = VisitorClient::new("http://127.0.0.1:8000", http)?
///     .with_token("key", "secret");
/// let response = client.get_organizations().await?;
/// println!("status: {}", response.status);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct VisitorClient {
    /// Base URL of the site, always ending in `/`
    base_url: Url,
    http: HttpClient,
    /// Full `Authorization` header value
    authorization: Option<String>,
    timeout: Duration,
}

impl VisitorClient {
    /// Create a client for the given site URL
    pub fn new(base_url: &str, http: HttpClient) -> ClientResult<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            http,
            authorization: None,
            timeout: DEFAULT_FLOW_TIMEOUT,
        })
    }

    /// Authenticate with an API key/secret pair
    pub fn with_token(mut self, api_key: &str, api_secret: &str) -> Self {
        self.authorization = Some(format!("token {api_key}:{api_secret}"));
        self
    }

    /// Override the per-request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Base URL
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Full URL of an endpoint, with an optional `%20`-encoded query
    pub fn endpoint_url(&self, endpoint: Endpoint, query: &[(&str, &str)]) -> ClientResult<Url> {
        let mut url = self
            .base_url
            .join(&format!("{API_METHOD_PREFIX}.{}", endpoint.method_path()))?;
        if !query.is_empty() {
            url.set_query(Some(&encode_query(query)));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let mut builder = self
            .http
            .inner()
            .request(method, url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json");
        if let Some(auth) = &self.authorization {
            builder = builder.header(AUTHORIZATION, auth);
        }
        builder
    }

    async fn get(&self, endpoint: Endpoint, query: &[(&str, &str)]) -> ClientResult<HttpResponse> {
        let url = self.endpoint_url(endpoint, query)?;
        self.http
            .send(self.request(Method::GET, url), endpoint.tag())
            .await
    }

    async fn post(&self, endpoint: Endpoint, body: String) -> ClientResult<HttpResponse> {
        let url = self.endpoint_url(endpoint, &[])?;
        self.http
            .send(self.request(Method::POST, url).body(body), endpoint.tag())
            .await
    }

    // =========================================================================
    // Session
    // =========================================================================

    /// POST security_login with an empty JSON object
    pub async fn security_login(&self) -> ClientResult<HttpResponse> {
        self.post(Endpoint::SecurityLogin, LOGIN_BODY.to_string())
            .await
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// GET get_org
    pub async fn get_organizations(&self) -> ClientResult<HttpResponse> {
        self.get(Endpoint::GetOrganizations, &[]).await
    }

    /// GET get_referral
    pub async fn get_referrals(&self) -> ClientResult<HttpResponse> {
        self.get(Endpoint::GetReferrals, &[]).await
    }

    // =========================================================================
    // OTP
    // =========================================================================

    /// GET generate_and_send_otp for a mobile number
    pub async fn generate_otp(&self, mobile: &str) -> ClientResult<HttpResponse> {
        self.get(Endpoint::GenerateOtp, &[("mobile", mobile)]).await
    }

    /// GET verify_otp for a mobile number and code
    pub async fn verify_otp(&self, mobile: &str, otp: &str) -> ClientResult<HttpResponse> {
        self.get(Endpoint::VerifyOtp, &[("mobile", mobile), ("otp", otp)])
            .await
    }

    // =========================================================================
    // Visitors
    // =========================================================================

    /// POST create_visitor_record with the double-encoded envelope
    pub async fn create_visitor_record(&self, record: &VisitorRecord) -> ClientResult<HttpResponse> {
        let body = VisitorEnvelope::encode_body(record)?;
        self.post(Endpoint::CreateVisitorRecord, body).await
    }

    /// GET get_visitors filtered by location
    pub async fn get_visitors(&self, location: &str) -> ClientResult<HttpResponse> {
        self.get(Endpoint::GetVisitors, &[("location", location)])
            .await
    }
}

/// Build a query string with `%20` for spaces
fn encode_query(pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
