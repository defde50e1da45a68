//! Executor configuration
//!
//! ```yaml
//! executor:
//!   type: ramping-vus
//!   stages:
//!     - { duration: 1s, target: 5 }
//!     - { duration: 3s, target: 10 }
//! ```
//!
//! ```yaml
//! executor:
//!   type: shared-iterations
//!   vus: 1
//!   iterations: 1
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default time VUs get to finish after the last stage
pub const DEFAULT_GRACEFUL_RAMP_DOWN: Duration = Duration::from_secs(30);

/// Default cap on a shared-iterations run
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(600);

/// One ramp stage: reach `target` VUs linearly over `duration`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: u64,
}

impl Stage {
    pub fn new(duration: Duration, target: u64) -> Self {
        Self { duration, target }
    }
}

/// How virtual users are scheduled for a scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ExecutorConfig {
    /// Ramp the VU count through stages
    RampingVus {
        #[serde(default)]
        start_vus: u64,
        stages: Vec<Stage>,
        #[serde(
            default = "default_graceful_ramp_down",
            with = "humantime_serde"
        )]
        graceful_ramp_down: Duration,
    },
    /// A fixed number of VUs sharing a fixed number of iterations
    SharedIterations {
        #[serde(default = "default_one")]
        vus: u64,
        #[serde(default = "default_one")]
        iterations: u64,
        #[serde(default = "default_max_duration", with = "humantime_serde")]
        max_duration: Duration,
    },
}

fn default_graceful_ramp_down() -> Duration {
    DEFAULT_GRACEFUL_RAMP_DOWN
}

fn default_max_duration() -> Duration {
    DEFAULT_MAX_DURATION
}

fn default_one() -> u64 {
    1
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        ExecutorConfig::SharedIterations {
            vus: 1,
            iterations: 1,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

impl ExecutorConfig {
    /// Ramping executor with the default ramp-down grace
    pub fn ramping(stages: Vec<Stage>) -> Self {
        ExecutorConfig::RampingVus {
            start_vus: 0,
            stages,
            graceful_ramp_down: DEFAULT_GRACEFUL_RAMP_DOWN,
        }
    }

    /// Shared-iterations executor with the default duration cap
    pub fn shared(vus: u64, iterations: u64) -> Self {
        ExecutorConfig::SharedIterations {
            vus,
            iterations,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }

    /// Short executor name
    pub fn kind(&self) -> &'static str {
        match self {
            ExecutorConfig::RampingVus { .. } => "ramping-vus",
            ExecutorConfig::SharedIterations { .. } => "shared-iterations",
        }
    }

    /// Highest number of VUs the executor will run at once
    pub fn max_vus(&self) -> u64 {
        match self {
            ExecutorConfig::RampingVus {
                start_vus, stages, ..
            } => stages.iter().map(|s| s.target).fold(*start_vus, u64::max),
            ExecutorConfig::SharedIterations {
                vus, iterations, ..
            } => (*vus).min(*iterations),
        }
    }

    /// Check structural constraints
    pub fn validate(&self) -> Result<(), String> {
        match self {
            ExecutorConfig::RampingVus { stages, .. } => {
                if stages.is_empty() {
                    return Err("ramping-vus needs at least one stage".into());
                }
                if stages.iter().all(|s| s.duration.is_zero()) {
                    return Err("ramping-vus stages have zero total duration".into());
                }
                Ok(())
            }
            ExecutorConfig::SharedIterations {
                vus, iterations, ..
            } => {
                if *vus == 0 {
                    return Err("shared-iterations needs at least one VU".into());
                }
                if *iterations == 0 {
                    return Err("shared-iterations needs at least one iteration".into());
                }
                Ok(())
            }
        }
    }
}
