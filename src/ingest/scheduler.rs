// src/ingest/scheduler.rs
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::ingest::orchestrator::{PollOrchestrator, PollState};

/// Spawn the background poll loop. Ticks every `schedule_delay()`; ticks that land
/// while the orchestrator is suspended are skipped, errors are logged and the loop
/// keeps going.
pub fn spawn_poll_scheduler(orchestrator: Arc<PollOrchestrator>) -> JoinHandle<()> {
    let delay = orchestrator.schedule_delay();
    tracing::info!(target: "poller", delay_ms = delay.as_millis() as u64, "poll scheduler started");

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(delay);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if orchestrator.state() == PollState::Suspended {
                tracing::debug!(target: "poller", "suspended; tick skipped");
                continue;
            }

            match orchestrator.run_cycle().await {
                Ok(report) if report.suspended_for.is_some() => {
                    tracing::info!(
                        target: "poller",
                        wait_ms = report.suspended_for.map(|d| d.as_millis() as u64),
                        "scheduled tick hit rate limit"
                    );
                }
                Ok(report) => {
                    tracing::debug!(
                        target: "poller",
                        dispatched = report.dispatched,
                        skipped = report.skipped,
                        "scheduled tick"
                    );
                }
                Err(e) => {
                    tracing::warn!(target: "poller", error = %e, "scheduled poll failed");
                }
            }
        }
    })
}
