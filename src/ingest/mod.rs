// src/ingest/mod.rs
pub mod backoff;
pub mod dispatch;
pub mod orchestrator;
pub mod providers;
pub mod scheduler;
pub mod session;
pub mod types;

use metrics::{describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

pub use orchestrator::{Command, CommandReport, CycleReport, PollOrchestrator, PollState};

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("poll_cycles_total", "Scheduled poll cycles started.");
        describe_counter!("poll_items_fetched_total", "Items returned by reads.");
        describe_counter!(
            "poll_items_dispatched_total",
            "Items handed to the dispatcher and recorded in history."
        );
        describe_counter!(
            "poll_items_skipped_total",
            "Items dropped as recently seen duplicates."
        );
        describe_counter!("poll_fetch_errors_total", "Reads that failed with a fetch error.");
        describe_counter!(
            "poll_rate_limited_total",
            "Reads answered with a rate-limit signal."
        );
        describe_counter!("poll_updates_total", "Update operations attempted.");
        describe_counter!(
            "poll_update_errors_total",
            "Update operations that failed and were dropped."
        );
        describe_histogram!("poll_fetch_ms", "Backend request time in milliseconds.");
        describe_gauge!("poll_suspended", "1 while the poller is suspended, 0 otherwise.");
        describe_gauge!(
            "poll_last_cycle_ts",
            "Unix ts when a scheduled cycle last started."
        );
    });
}
