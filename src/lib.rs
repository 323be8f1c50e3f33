// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod ingest;
pub mod metrics;

// ---- Re-exports for stable public API ----
pub use crate::api::create_router;
pub use crate::error::{ConfigError, DataFetchError, PollError, RateLimitSignal, ReadError, SessionError};
pub use crate::history::DedupHistory;
pub use crate::ingest::{Command, CommandReport, CycleReport, PollOrchestrator, PollState};
