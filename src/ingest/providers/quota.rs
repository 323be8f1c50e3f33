// src/ingest/providers/quota.rs
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::RateLimitSignal;
use crate::ingest::backoff::AUTO_DELAY_WINDOW;
use crate::ingest::providers::transport::Response;

pub const REMAINING_HEADER: &str = "x-ratelimit-remaining";
pub const RESET_HEADER: &str = "x-ratelimit-reset";

/// Decides whether a failed response means "rate limited" and for how long.
pub trait RateLimitProbe: Send + Sync {
    fn probe(
        &self,
        resp: &Response,
        first_read: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<RateLimitSignal>;
}

/// `X-RateLimit-Remaining: 0` marks exhaustion. The wait comes from
/// `X-RateLimit-Reset` (epoch seconds), else one hour after the first read.
pub struct HeaderRateLimitProbe;

impl RateLimitProbe for HeaderRateLimitProbe {
    fn probe(
        &self,
        resp: &Response,
        first_read: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<RateLimitSignal> {
        let remaining: i64 = resp.header(REMAINING_HEADER)?.trim().parse().ok()?;
        if remaining != 0 {
            return None;
        }

        let wait = match resp
            .header(RESET_HEADER)
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            Some(reset) => {
                let secs = reset.saturating_sub(now.timestamp()).max(0);
                Duration::from_secs(secs as u64)
            }
            None => {
                let elapsed = (now - first_read).to_std().unwrap_or_default();
                AUTO_DELAY_WINDOW.saturating_sub(elapsed)
            }
        };
        tracing::warn!(target: "poller", wait_ms = wait.as_millis() as u64, "provider quota exhausted");
        Some(RateLimitSignal::new(wait))
    }
}
