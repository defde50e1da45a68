//! Virtual-user executors
//!
//! Drive a [`Scenario`] according to its [`ExecutorConfig`]:
//!
//! - **ramping-vus**: VU count follows linear stages, re-evaluated every tick
//! - **shared-iterations**: a fixed pool of VUs drains a shared iteration count
//!
//! Every iteration is counted in `iterations` and timed in
//! `iteration_duration` (think time included). `vus` tracks the VUs currently
//! running and `vus_max` the most the executor will ever start.

mod config;
mod ramping;
mod shared;

pub use config::{DEFAULT_GRACEFUL_RAMP_DOWN, DEFAULT_MAX_DURATION, ExecutorConfig, Stage};
pub use ramping::{target_at, total_duration};

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::metrics::threshold::parse_thresholds;
use crate::metrics::{Gauge, ITERATION_DURATION, ITERATIONS, VUS, VUS_MAX, evaluate_thresholds};
use crate::scenarios::{Scenario, ScenarioContext, ScenarioError, ScenarioOptions, ScenarioReport};

/// Controller tick for ramping executors
pub const TICK: Duration = Duration::from_millis(100);

/// Run one scenario to completion and evaluate its thresholds
pub async fn run_scenario(
    scenario: Arc<dyn Scenario>,
    ctx: Arc<ScenarioContext>,
    opts: &ScenarioOptions,
) -> Result<ScenarioReport, ScenarioError> {
    opts.executor.validate().map_err(ScenarioError::Config)?;
    parse_thresholds(&opts.thresholds)?;

    let name = scenario.name();
    let max_vus = opts.executor.max_vus();
    let started = Instant::now();

    ctx.metrics.gauge(VUS_MAX).set(max_vus as f64);
    ctx.metrics.gauge(VUS).set(0.0);

    info!(
        scenario = name,
        executor = opts.executor.kind(),
        max_vus,
        think_time_ms = opts.think_time.as_millis() as u64,
        "Starting scenario"
    );

    let runner = IterationRunner::new(scenario.clone(), ctx.clone(), opts.think_time);
    let tracker = VuTracker::new(ctx.metrics.gauge(VUS));

    match &opts.executor {
        ExecutorConfig::RampingVus {
            start_vus,
            stages,
            graceful_ramp_down,
        } => {
            ramping::run(runner, tracker, *start_vus, stages, *graceful_ramp_down).await;
        }
        ExecutorConfig::SharedIterations {
            vus,
            iterations,
            max_duration,
        } => {
            shared::run(runner, tracker, *vus, *iterations, *max_duration).await;
        }
    }

    let thresholds = evaluate_thresholds(&ctx.metrics, &opts.thresholds)?;
    for crossed in thresholds.iter().filter(|t| !t.passed) {
        warn!(
            scenario = name,
            metric = %crossed.metric,
            threshold = %crossed.expression,
            observed = ?crossed.observed,
            "Threshold crossed"
        );
    }

    let report = ScenarioReport::new(name, ctx.metrics.snapshot(), thresholds, started.elapsed());
    let held = report.thresholds.iter().filter(|t| t.passed).count();
    let message = format!(
        "{} iterations, {held}/{} thresholds held",
        report.iterations,
        report.thresholds.len()
    );
    Ok(report.with_message(message))
}

/// Runs single iterations and records the harness metrics around them
#[derive(Clone)]
pub(crate) struct IterationRunner {
    scenario: Arc<dyn Scenario>,
    ctx: Arc<ScenarioContext>,
    think_time: Duration,
}

impl IterationRunner {
    fn new(scenario: Arc<dyn Scenario>, ctx: Arc<ScenarioContext>, think_time: Duration) -> Self {
        Self {
            scenario,
            ctx,
            think_time,
        }
    }

    async fn run_once(&self) -> bool {
        let started = Instant::now();
        let ok = self.scenario.iteration(&self.ctx).await;
        if !self.think_time.is_zero() {
            tokio::time::sleep(self.think_time).await;
        }

        let metrics = &self.ctx.metrics;
        metrics.counter(ITERATIONS).inc();
        metrics
            .trend(ITERATION_DURATION)
            .add(started.elapsed().as_secs_f64() * 1000.0);
        ok
    }
}

/// Keeps the `vus` gauge equal to the number of running VUs
#[derive(Clone)]
pub(crate) struct VuTracker {
    active: Arc<Mutex<u64>>,
    gauge: Gauge,
}

impl VuTracker {
    fn new(gauge: Gauge) -> Self {
        Self {
            active: Arc::new(Mutex::new(0)),
            gauge,
        }
    }

    /// Mark a VU as running until the guard drops
    fn enter(&self) -> VuGuard {
        let mut active = self.active.lock();
        *active += 1;
        self.gauge.set(*active as f64);
        VuGuard {
            tracker: self.clone(),
        }
    }
}

pub(crate) struct VuGuard {
    tracker: VuTracker,
}

impl Drop for VuGuard {
    fn drop(&mut self) {
        let mut active = self.tracker.active.lock();
        *active = active.saturating_sub(1);
        self.tracker.gauge.set(*active as f64);
    }
}

/// Wait for every VU, aborting whatever is still running after `grace`
async fn drain_within(vus: &mut JoinSet<()>, grace: Duration) {
    if tokio::time::timeout(grace, join_all(vus)).await.is_err() {
        warn!(
            remaining = vus.len(),
            grace_ms = grace.as_millis() as u64,
            "VUs still running after grace period, aborting"
        );
        vus.abort_all();
        join_all(vus).await;
    }
}

async fn join_all(vus: &mut JoinSet<()>) {
    while let Some(joined) = vus.join_next().await {
        match joined {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => debug!("VU aborted"),
            Err(e) => error!(error = %e, "VU task panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TargetConfig, VisitorConfig};
    use crate::metrics::Metrics;
    use async_trait::async_trait;
    use indexmap::IndexMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct CountingScenario {
        calls: AtomicU64,
        pause: Duration,
    }

    impl CountingScenario {
        fn new(pause: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU64::new(0),
                pause,
            })
        }
    }

    #[async_trait]
    impl Scenario for CountingScenario {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn description(&self) -> &'static str {
            "Counts its iterations"
        }

        async fn iteration(&self, ctx: &ScenarioContext) -> bool {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.pause).await;
            ctx.metrics.check("always", true)
        }
    }

    fn context() -> Arc<ScenarioContext> {
        Arc::new(
            ScenarioContext::new(
                Metrics::new(),
                &TargetConfig::default(),
                VisitorConfig::default(),
                Duration::from_secs(1),
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_shared_iterations_runs_exact_count() {
        let scenario = CountingScenario::new(Duration::from_millis(5));
        let ctx = context();
        let opts = ScenarioOptions {
            executor: ExecutorConfig::shared(3, 10),
            ..ScenarioOptions::default()
        };

        let report = run_scenario(scenario.clone(), ctx.clone(), &opts)
            .await
            .unwrap();

        assert_eq!(scenario.calls.load(Ordering::SeqCst), 10);
        assert_eq!(report.iterations, 10);
        assert!(report.passed);

        let vus = report.metrics.gauge(VUS).unwrap();
        assert_eq!(vus.value, 0.0);
        assert!(vus.max <= 3.0);
        assert_eq!(report.metrics.gauge(VUS_MAX).unwrap().value, 3.0);
    }

    #[tokio::test]
    async fn test_ramping_follows_stages_and_winds_down() {
        let scenario = CountingScenario::new(Duration::from_millis(20));
        let ctx = context();
        let opts = ScenarioOptions {
            executor: ExecutorConfig::RampingVus {
                start_vus: 0,
                stages: vec![
                    Stage::new(Duration::from_millis(300), 2),
                    Stage::new(Duration::from_millis(200), 0),
                ],
                graceful_ramp_down: Duration::from_secs(1),
            },
            ..ScenarioOptions::default()
        };

        let report = run_scenario(scenario.clone(), ctx, &opts).await.unwrap();

        assert!(report.iterations > 0);
        assert_eq!(report.iterations, scenario.calls.load(Ordering::SeqCst));
        let vus = report.metrics.gauge(VUS).unwrap();
        assert_eq!(vus.value, 0.0);
        assert!(vus.max <= 2.0);
        assert!(report.duration < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_ramping_aborts_after_grace() {
        let scenario = CountingScenario::new(Duration::from_secs(30));
        let ctx = context();
        let opts = ScenarioOptions {
            executor: ExecutorConfig::RampingVus {
                start_vus: 1,
                stages: vec![Stage::new(Duration::from_millis(100), 1)],
                graceful_ramp_down: Duration::from_millis(100),
            },
            ..ScenarioOptions::default()
        };

        let report = run_scenario(scenario.clone(), ctx, &opts).await.unwrap();

        // The only iteration was aborted before completing
        assert_eq!(scenario.calls.load(Ordering::SeqCst), 1);
        assert_eq!(report.iterations, 0);
        assert_eq!(report.metrics.gauge(VUS).unwrap().value, 0.0);
        assert!(report.duration < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_thresholds_decide_report() {
        let ctx = context();
        let mut thresholds = IndexMap::new();
        thresholds.insert(ITERATIONS.to_string(), vec!["count==4".to_string()]);
        thresholds.insert("checks".to_string(), vec!["rate>0.85".to_string()]);
        let opts = ScenarioOptions {
            executor: ExecutorConfig::shared(2, 4),
            thresholds,
            ..ScenarioOptions::default()
        };

        let report = run_scenario(CountingScenario::new(Duration::ZERO), ctx, &opts)
            .await
            .unwrap();
        assert!(report.passed);
        assert_eq!(report.thresholds.len(), 2);

        let ctx = context();
        let mut thresholds = IndexMap::new();
        thresholds.insert(ITERATIONS.to_string(), vec!["count>4".to_string()]);
        let opts = ScenarioOptions {
            executor: ExecutorConfig::shared(2, 4),
            thresholds,
            ..ScenarioOptions::default()
        };

        let report = run_scenario(CountingScenario::new(Duration::ZERO), ctx, &opts)
            .await
            .unwrap();
        assert!(!report.passed);
        assert_eq!(report.crossed_thresholds().count(), 1);
    }

    #[tokio::test]
    async fn test_think_time_counts_toward_iteration_duration() {
        let ctx = context();
        let opts = ScenarioOptions {
            think_time: Duration::from_millis(50),
            executor: ExecutorConfig::shared(1, 2),
            ..ScenarioOptions::default()
        };

        let report = run_scenario(CountingScenario::new(Duration::ZERO), ctx, &opts)
            .await
            .unwrap();
        let trend = report.metrics.trend(ITERATION_DURATION).unwrap();
        assert!(trend.min >= 50.0);
    }

    #[tokio::test]
    async fn test_invalid_options_rejected() {
        let opts = ScenarioOptions {
            executor: ExecutorConfig::shared(0, 1),
            ..ScenarioOptions::default()
        };
        let err = run_scenario(CountingScenario::new(Duration::ZERO), context(), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, ScenarioError::Config(_)));

        let mut thresholds = IndexMap::new();
        thresholds.insert("checks".to_string(), vec!["rate~1".to_string()]);
        let opts = ScenarioOptions {
            thresholds,
            ..ScenarioOptions::default()
        };
        let err = run_scenario(CountingScenario::new(Duration::ZERO), context(), &opts)
            .await
            .unwrap_err();
        assert!(matches!(err, ScenarioError::Threshold(_)));
    }
}
