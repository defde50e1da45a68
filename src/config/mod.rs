//! Configuration parsing
//!
//! Handles parsing of run configuration files and scenario options.
//!
//! ## Configuration Format
//!
//! ```yaml
//! target:
//!   base_url: http://127.0.0.1:8000
//!   health_urls:
//!     - http://127.0.0.1:3000/security_desk/visitor
//!   api_key: 6781f3e727502ca
//!   api_secret: e5b0baf152d66fc
//!
//! visitor:
//!   location: Open Work Space 2 - IITMRP E Block
//!   otp: "341470"
//!   mobile_prefix: "892594"
//!
//! scenarios:
//!   health:
//!     timeout: 10s
//!     executor:
//!       type: shared-iterations
//!       vus: 1
//!       iterations: 1
//!
//!   visitor-flow:
//!     think_time: 2s
//!     executor:
//!       type: ramping-vus
//!       stages:
//!         - { duration: 1s, target: 5 }
//!         - { duration: 3s, target: 10 }
//!     thresholds:
//!       http_req_duration: ["p(95)<5000"]
//! ```
//!
//! `VISITOR_API_KEY`, `VISITOR_API_SECRET` and `TURNSTILE_BASE_URL` override
//! the file when set.

mod plan;

pub use plan::{
    Config, ConfigError, ENV_API_KEY, ENV_API_SECRET, ENV_BASE_URL, MOBILE_NUMBER_LEN,
    MOBILE_SUFFIX_LEN, ScenarioConfig, TargetConfig, VisitorConfig,
};
