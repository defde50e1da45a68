//! ramping-vus executor

use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info};

use super::config::Stage;
use super::{IterationRunner, TICK, VuTracker, drain_within};

/// Sum of all stage durations
pub fn total_duration(stages: &[Stage]) -> Duration {
    stages.iter().map(|s| s.duration).sum()
}

/// Target VU count `elapsed` into the run
///
/// Linear within each stage from the previous target (or `start_vus`),
/// rounded down. Past the last stage the last target holds.
pub fn target_at(start_vus: u64, stages: &[Stage], elapsed: Duration) -> u64 {
    let mut from = start_vus;
    let mut remaining = elapsed;

    for stage in stages {
        if remaining < stage.duration {
            let progress = remaining.as_secs_f64() / stage.duration.as_secs_f64();
            let value = from as f64 + (stage.target as f64 - from as f64) * progress;
            return value.floor() as u64;
        }
        remaining -= stage.duration;
        from = stage.target;
    }

    from
}

pub(super) async fn run(
    runner: IterationRunner,
    tracker: VuTracker,
    start_vus: u64,
    stages: &[Stage],
    graceful_ramp_down: Duration,
) {
    let total = total_duration(stages);
    let started = Instant::now();
    let (target_tx, target_rx) = watch::channel(0u64);
    let mut vus = JoinSet::new();
    let mut spawned = 0u64;
    let mut ticker = tokio::time::interval(TICK);

    loop {
        ticker.tick().await;
        let elapsed = started.elapsed();
        if elapsed >= total {
            break;
        }

        let target = target_at(start_vus, stages, elapsed);
        if target_tx.send_replace(target) != target {
            debug!(target, elapsed_ms = elapsed.as_millis() as u64, "VU target changed");
        }
        while spawned < target {
            vus.spawn(vu_loop(
                spawned,
                runner.clone(),
                tracker.clone(),
                target_rx.clone(),
            ));
            spawned += 1;
        }
    }

    // Stages are over: no VU starts another iteration
    target_tx.send_replace(0);
    drop(target_tx);

    info!(
        started_vus = spawned,
        grace_ms = graceful_ramp_down.as_millis() as u64,
        "Ramp complete, waiting for VUs"
    );
    drain_within(&mut vus, graceful_ramp_down).await;
}

/// VU `index` iterates while the target is above it and idles otherwise
async fn vu_loop(
    index: u64,
    runner: IterationRunner,
    tracker: VuTracker,
    mut target: watch::Receiver<u64>,
) {
    loop {
        if target.wait_for(|t| index < *t).await.is_err() {
            return;
        }

        let _running = tracker.enter();
        loop {
            let current = *target.borrow();
            if index >= current {
                break;
            }
            runner.run_once().await;
        }
    }
}
