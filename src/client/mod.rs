//! Target API clients
//!
//! `HttpClient` records request metrics for every call; `VisitorClient`
//! builds the visitor-management requests on top of it.

mod http;
mod types;
mod visitor;

pub use http::{ClientError, ClientResult, HttpClient, HttpResponse, is_failed_status};
pub use types::*;
pub use visitor::{DEFAULT_FLOW_TIMEOUT, VisitorClient};
