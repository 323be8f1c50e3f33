//! # Rate backoff
//! Turns a request quota into a polling cadence, and a provider's rate-limit
//! signal into a suspend duration. Pure functions, no clocks read here.

use std::time::Duration;

use crate::error::RateLimitSignal;

/// Basis for auto-delay: the provider window is assumed to reset hourly.
pub const AUTO_DELAY_WINDOW: Duration = Duration::from_secs(3600);

/// `window * period / rate_limit`, e.g. 150 requests per hour -> 24s.
///
/// `rate_limit` is validated to be non-zero at config time; zero yields the whole window.
pub fn nominal_delay(rate_limit: u32, window: Duration, period: u32) -> Duration {
    let total = window.checked_mul(period).unwrap_or(Duration::MAX);
    if rate_limit == 0 {
        return total;
    }
    total / rate_limit
}

/// How long to stay suspended after a rate-limit signal.
///
/// Without auto-delay the provider's own estimate is used verbatim. With it, the
/// remainder of a one-hour window is used, given the time `elapsed` since the
/// current run started, floored at zero.
pub fn resolve_suspend_duration(
    signal: &RateLimitSignal,
    auto_delay: bool,
    elapsed: Duration,
) -> Duration {
    if !auto_delay {
        return signal.wait;
    }
    AUTO_DELAY_WINDOW.saturating_sub(elapsed)
}
