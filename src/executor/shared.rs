//! shared-iterations executor

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::info;

use super::{IterationRunner, VuTracker, drain_within};

pub(super) async fn run(
    runner: IterationRunner,
    tracker: VuTracker,
    vus: u64,
    iterations: u64,
    max_duration: Duration,
) {
    let claimed = Arc::new(AtomicU64::new(0));
    let mut set = JoinSet::new();

    for _ in 0..vus.min(iterations) {
        let runner = runner.clone();
        let tracker = tracker.clone();
        let claimed = Arc::clone(&claimed);
        set.spawn(async move {
            let _running = tracker.enter();
            while claimed.fetch_add(1, Ordering::SeqCst) < iterations {
                runner.run_once().await;
            }
        });
    }

    info!(vus = set.len(), iterations, "VUs started");
    drain_within(&mut set, max_duration).await;
}
