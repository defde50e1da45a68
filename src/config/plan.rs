//! Load plan configuration types
//!
//! Defines the structure of the YAML run configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::client::ClientError;
use crate::executor::ExecutorConfig;
use crate::metrics::ThresholdError;
use crate::metrics::threshold::parse_thresholds;
use crate::scenarios::registry::SCENARIOS;
use crate::scenarios::{ScenarioContext, ScenarioOptions};

/// Environment variable overriding `target.api_key`
pub const ENV_API_KEY: &str = "VISITOR_API_KEY";
/// Environment variable overriding `target.api_secret`
pub const ENV_API_SECRET: &str = "VISITOR_API_SECRET";
/// Environment variable overriding `target.base_url`
pub const ENV_BASE_URL: &str = "TURNSTILE_BASE_URL";

/// Digits in a generated mobile number
pub const MOBILE_NUMBER_LEN: usize = 10;
/// Random digits appended to the mobile prefix
pub const MOBILE_SUFFIX_LEN: usize = 4;

/// Errors that can occur during configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid threshold: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("Failed to create client: {0}")]
    Client(#[from] ClientError),
}

/// Where requests are sent and how they authenticate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Site URL for the visitor flow (e.g. "http://127.0.0.1:8000")
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Endpoints polled by the health probe
    #[serde(default = "default_health_urls")]
    pub health_urls: Vec<String>,

    /// API key half of the `token key:secret` header
    #[serde(default = "default_api_key")]
    pub api_key: String,

    /// API secret half of the `token key:secret` header
    #[serde(default = "default_api_secret")]
    pub api_secret: String,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_health_urls() -> Vec<String> {
    vec![
        "http://127.0.0.1:3000/security_desk/visitor".to_string(),
        "http://127.0.0.1:3000/api/method/visitor_management.custom_api.visitor.get_org"
            .to_string(),
    ]
}

fn default_api_key() -> String {
    "6781f3e727502ca".to_string()
}

fn default_api_secret() -> String {
    "e5b0baf152d66fc".to_string()
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            health_urls: default_health_urls(),
            api_key: default_api_key(),
            api_secret: default_api_secret(),
        }
    }
}

/// Fixed values used by the visitor registration flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisitorConfig {
    /// Location for new visitors and the visitor list filter
    pub location: String,
    /// OTP submitted to `verify_otp`
    ///
    /// A fixed code: only a backend configured to accept it will pass.
    pub otp: String,
    /// Leading digits of generated mobile numbers
    ///
    /// Only 9000 suffixes exist per prefix, so numbers repeat across a run.
    pub mobile_prefix: String,
    pub type_of_visit: String,
    pub referral_name: String,
    pub reason: String,
}

impl Default for VisitorConfig {
    fn default() -> Self {
        Self {
            location: "Open Work Space 2 - IITMRP E Block".to_string(),
            otp: "341470".to_string(),
            mobile_prefix: "892594".to_string(),
            type_of_visit: "Meeting".to_string(),
            referral_name: "EMP4_FH".to_string(),
            reason: "Performance Test".to_string(),
        }
    }
}

/// Per-scenario overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// Whether this scenario runs
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Per-request timeout
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout: Option<Duration>,

    /// Pause after each iteration
    #[serde(
        default,
        with = "humantime_serde",
        skip_serializing_if = "Option::is_none"
    )]
    pub think_time: Option<Duration>,

    /// VU scheduling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executor: Option<ExecutorConfig>,

    /// metric name -> threshold expressions; replaces the defaults when set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<IndexMap<String, Vec<String>>>,
}

fn default_enabled() -> bool {
    true
}

impl ScenarioConfig {
    /// Merge over a scenario's defaults
    pub fn to_options(&self, defaults: &ScenarioOptions) -> ScenarioOptions {
        ScenarioOptions {
            timeout: self.timeout.unwrap_or(defaults.timeout),
            think_time: self.think_time.unwrap_or(defaults.think_time),
            executor: self
                .executor
                .clone()
                .unwrap_or_else(|| defaults.executor.clone()),
            thresholds: self
                .thresholds
                .clone()
                .unwrap_or_else(|| defaults.thresholds.clone()),
        }
    }

    /// Config that spells out the given options in full
    pub fn from_options(opts: &ScenarioOptions) -> Self {
        Self {
            enabled: true,
            timeout: Some(opts.timeout),
            think_time: Some(opts.think_time),
            executor: Some(opts.executor.clone()),
            thresholds: (!opts.thresholds.is_empty()).then(|| opts.thresholds.clone()),
        }
    }
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: None,
            think_time: None,
            executor: None,
            thresholds: None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Target API
    #[serde(default)]
    pub target: TargetConfig,

    /// Visitor flow settings
    #[serde(default)]
    pub visitor: VisitorConfig,

    /// Scenario configurations (scenario_name -> config)
    #[serde(default)]
    pub scenarios: IndexMap<String, ScenarioConfig>,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from a variable lookup
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup(ENV_API_KEY) {
            self.target.api_key = key;
        }
        if let Some(secret) = lookup(ENV_API_SECRET) {
            self.target.api_secret = secret;
        }
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.target.base_url = url;
        }
    }

    /// Validate URLs, visitor settings, executors and thresholds
    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.target.base_url).map_err(|e| {
            ConfigError::Invalid(format!("target.base_url '{}': {e}", self.target.base_url))
        })?;
        for url in &self.target.health_urls {
            Url::parse(url)
                .map_err(|e| ConfigError::Invalid(format!("target.health_urls '{url}': {e}")))?;
        }

        let prefix = &self.visitor.mobile_prefix;
        let prefix_len = MOBILE_NUMBER_LEN - MOBILE_SUFFIX_LEN;
        if prefix.len() != prefix_len || !prefix.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid(format!(
                "visitor.mobile_prefix must be {prefix_len} digits, got '{prefix}'"
            )));
        }
        if self.visitor.otp.is_empty() || !self.visitor.otp.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::Invalid(format!(
                "visitor.otp must be numeric, got '{}'",
                self.visitor.otp
            )));
        }

        for (name, scenario) in &self.scenarios {
            if !SCENARIOS.contains_key(name.as_str()) {
                return Err(ConfigError::Invalid(format!("unknown scenario '{name}'")));
            }
            if let Some(executor) = &scenario.executor {
                executor
                    .validate()
                    .map_err(|e| ConfigError::Invalid(format!("scenarios.{name}.executor: {e}")))?;
            }
            if let Some(thresholds) = &scenario.thresholds {
                parse_thresholds(thresholds)?;
            }
        }

        Ok(())
    }

    /// Get configuration for a specific scenario
    pub fn scenario_config(&self, name: &str) -> Option<&ScenarioConfig> {
        self.scenarios.get(name)
    }

    /// Check if a specific scenario is enabled
    pub fn is_scenario_enabled(&self, name: &str) -> bool {
        self.scenarios.get(name).map(|c| c.enabled).unwrap_or(true) // Default to enabled if not specified
    }

    /// Get list of enabled scenarios
    pub fn enabled_scenarios(&self) -> Vec<&str> {
        self.scenarios
            .iter()
            .filter(|(_, c)| c.enabled)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Create a ScenarioContext for one run
    pub fn to_scenario_context(
        &self,
        metrics: crate::metrics::Metrics,
        opts: &ScenarioOptions,
    ) -> Result<ScenarioContext, ConfigError> {
        Ok(ScenarioContext::new(
            metrics,
            &self.target,
            self.visitor.clone(),
            opts.timeout,
        )?)
    }

    /// Generate a default configuration with every scenario spelled out
    pub fn default_config() -> Self {
        Config {
            target: TargetConfig::default(),
            visitor: VisitorConfig::default(),
            scenarios: SCENARIOS
                .iter()
                .map(|(name, scenario)| {
                    (
                        name.to_string(),
                        ScenarioConfig::from_options(&scenario.default_options()),
                    )
                })
                .collect(),
        }
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::Stage;

    const SAMPLE_CONFIG: &str = r#"
target:
  base_url: http://localhost:8000
  api_key: abc
  api_secret: def

visitor:
  location: TAMCOE

scenarios:
  health:
    enabled: false
  visitor-flow:
    timeout: 5s
    think_time: 500ms
    executor:
      type: ramping-vus
      stages:
        - { duration: 2s, target: 3 }
        - { duration: 1s, target: 0 }
    thresholds:
      http_req_duration: ["p(95)<2000"]
"#;

    #[test]
    fn test_parse_config() {
        let config = Config::from_yaml(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.target.base_url, "http://localhost:8000");
        assert_eq!(config.target.api_key, "abc");
        assert_eq!(config.target.health_urls.len(), 2);
        assert_eq!(config.visitor.location, "TAMCOE");
        // Unset visitor fields keep their defaults
        assert_eq!(config.visitor.otp, "341470");
        assert_eq!(config.scenarios.len(), 2);
        config.validate().unwrap();
    }

    #[test]
    fn test_scenario_enabled() {
        let config = Config::from_yaml(SAMPLE_CONFIG).unwrap();
        assert!(!config.is_scenario_enabled("health"));
        assert!(config.is_scenario_enabled("visitor-flow"));
        assert!(config.is_scenario_enabled("unknown")); // Default to enabled
        assert_eq!(config.enabled_scenarios(), vec!["visitor-flow"]);
    }

    #[test]
    fn test_to_options_merges_defaults() {
        let config = Config::from_yaml(SAMPLE_CONFIG).unwrap();
        let defaults = ScenarioOptions {
            think_time: Duration::from_secs(2),
            ..ScenarioOptions::default()
        };

        let opts = config.scenarios["visitor-flow"].to_options(&defaults);
        assert_eq!(opts.timeout, Duration::from_secs(5));
        assert_eq!(opts.think_time, Duration::from_millis(500));
        assert_eq!(
            opts.executor,
            ExecutorConfig::ramping(vec![
                Stage::new(Duration::from_secs(2), 3),
                Stage::new(Duration::from_secs(1), 0),
            ])
        );
        assert_eq!(opts.thresholds["http_req_duration"], vec!["p(95)<2000"]);

        let opts = ScenarioConfig::default().to_options(&defaults);
        assert_eq!(opts, defaults);
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::from_yaml(SAMPLE_CONFIG).unwrap();
        config.apply_overrides(|key| match key {
            ENV_API_KEY => Some("env-key".to_string()),
            ENV_BASE_URL => Some("http://10.0.0.5:8000".to_string()),
            _ => None,
        });
        assert_eq!(config.target.api_key, "env-key");
        assert_eq!(config.target.api_secret, "def");
        assert_eq!(config.target.base_url, "http://10.0.0.5:8000");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default_config();
        config.visitor.mobile_prefix = "8925942".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default_config();
        config.visitor.otp = "abc".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default_config();
        config.target.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default_config();
        config
            .scenarios
            .insert("smoke".to_string(), ScenarioConfig::default());
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default_config();
        config.scenarios["visitor-flow"].thresholds =
            Some(IndexMap::from([("checks".to_string(), vec!["rate".to_string()])]));
        assert!(matches!(config.validate(), Err(ConfigError::Threshold(_))));
    }

    #[test]
    fn test_default_config() {
        let config = Config::default_config();
        config.validate().unwrap();
        assert!(config.scenarios.contains_key("health"));
        assert!(config.scenarios.contains_key("visitor-flow"));
        assert_eq!(
            config.scenarios["health"].timeout,
            Some(Duration::from_secs(10))
        );
    }

    #[test]
    fn test_roundtrip() {
        let config = Config::default_config();
        let yaml = config.to_yaml().unwrap();
        let parsed = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config, parsed);
    }
}
