//! Periodic scan trigger.

use compliance_core::ScanRequest;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::coordinator::Coordinator;

/// Fires scheduled scan requests at a fixed period.
pub struct Scheduler;

impl Scheduler {
    /// Start the scheduler task.
    ///
    /// Returns `None` when `interval` is `None` or zero, leaving the agent in
    /// manual-only mode. The first scan is requested immediately.
    pub fn spawn(
        coordinator: Coordinator,
        profile: impl Into<String>,
        interval: Option<Duration>,
    ) -> Option<SchedulerHandle> {
        let period = interval.filter(|d| !d.is_zero())?;
        let profile = profile.into();
        info!(period_secs = period.as_secs(), %profile, "scheduler started");
        let task = tokio::spawn(run(coordinator, profile, period));
        Some(SchedulerHandle { task })
    }
}

/// Handle to a running scheduler
#[derive(Debug)]
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop firing. A scan already in flight is not affected.
    pub fn stop(self) {
        self.task.abort();
        info!("scheduler stopped");
    }
}

async fn run(coordinator: Coordinator, profile: String, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let ack = coordinator.request_scan(ScanRequest::scheduled(profile.as_str()));
        if !ack.accepted {
            debug!(job_id = ack.job_id, "scheduled tick dropped, scan in progress");
        }
    }
}
