//! Background maintenance loop for the daemon.

use crate::jobs::JobRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Periodically prune terminal job records so a long-lived daemon does
/// not accumulate them. Exits on the shutdown signal.
pub fn spawn_scheduler(jobs: Arc<JobRegistry>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
      tokio::select! {
        _ = ticker.tick() => {
          jobs.cleanup();
          debug!(jobs = jobs.job_count(), "Job registry cleanup");
        }
        _ = shutdown.recv() => {
          debug!("Scheduler shutting down");
          break;
        }
      }
    }
  })
}
