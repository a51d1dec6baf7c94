//! Periodic reporting loop.

use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use vpnode_core::{HealthChecker, ReportCycle};

/// Run a cycle every `period` until the task is aborted. The first cycle
/// starts immediately.
pub async fn run(cycle: ReportCycle, period: Duration, health: HealthChecker) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(period_secs = period.as_secs(), "Reporting loop started");
    loop {
        ticker.tick().await;

        let report = cycle.run_once().await;
        if !report.degraded_sources.is_empty() {
            warn!(degraded = ?report.degraded_sources, "Cycle reported default values");
        }
        health.observe_cycle(&report).await;
    }
}
