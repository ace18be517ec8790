use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::sync::{SyncEngine, SyncOutcome};

/// Runs a sync pass immediately and then on a fixed interval.
pub struct Scheduler {
    engine: Arc<SyncEngine>,
    interval: Duration,
}

/// Handle to a running scheduler. Dropping it leaves the loop running;
/// call [`SchedulerHandle::stop`] to end it.
pub struct SchedulerHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl Scheduler {
    pub fn new(engine: Arc<SyncEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Spawn the sync loop on the current tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let Scheduler { engine, interval } = self;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A pass that outlives the interval must not trigger a burst of catch-up passes.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!("Sync scheduler started (every {}s)", interval.as_secs());

            loop {
                // The first tick completes immediately.
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    _ = token.cancelled() => break,
                    outcome = engine.sync_now() => log_outcome(&outcome),
                }
            }

            tracing::info!("Sync scheduler stopped");
        });

        SchedulerHandle { cancel, task }
    }
}

impl SchedulerHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Cancel the loop (including an in-flight fetch) and wait for it to exit.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::warn!("Sync scheduler task ended abnormally: {}", e);
        }
    }
}

fn log_outcome(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Completed(report) => tracing::debug!(
            "Scheduled sync completed: {} added, {} conflicts",
            report.added,
            report.conflicts.len()
        ),
        SyncOutcome::Skipped => tracing::debug!("Scheduled sync skipped: pass already running"),
        SyncOutcome::Failed { message } => {
            tracing::warn!("Scheduled sync failed: {}", message)
        }
    }
}
