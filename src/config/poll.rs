// src/config/poll.rs
use std::time::Duration;

use crate::error::ConfigError;
use crate::history::MAX_HISTORY_CAP;
use crate::ingest::backoff::nominal_delay;
use crate::ingest::types::Params;

pub const DEFAULT_MAX_HISTORY: usize = 200;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Poller settings. Built once, validated, then never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub max_history: usize,
    pub skip_duplicates: bool,
    pub poll_enabled: bool,
    /// Requests allowed per `rate_window * rate_limit_period`. `None` disables rate pacing.
    pub rate_limit: Option<u32>,
    pub rate_window: Option<Duration>,
    pub rate_limit_period: Option<u32>,
    /// Suspend until the hourly window resets instead of trusting the provider's hint.
    pub auto_delay: bool,
    /// Cadence used when rate pacing is off.
    pub poll_interval: Duration,
    pub query: Params,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_history: DEFAULT_MAX_HISTORY,
            skip_duplicates: false,
            poll_enabled: true,
            rate_limit: None,
            rate_window: None,
            rate_limit_period: None,
            auto_delay: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            query: Params::new(),
        }
    }
}

impl PollConfig {
    pub fn with_rate_limit(mut self, limit: u32, window: Duration, period: u32) -> Self {
        self.rate_limit = Some(limit);
        self.rate_window = Some(window);
        self.rate_limit_period = Some(period);
        self
    }

    pub fn with_query(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_history == 0 || self.max_history > MAX_HISTORY_CAP {
            return Err(ConfigError::InvalidValue {
                field: "max_history",
                reason: format!("must be within 1..={MAX_HISTORY_CAP}"),
            });
        }
        if let Some(limit) = self.rate_limit {
            if limit == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "rate_limit",
                    reason: "must be greater than zero".into(),
                });
            }
            let Some(window) = self.rate_window else {
                return Err(ConfigError::MalformedRateLimit {
                    missing: "rate_window",
                });
            };
            let Some(period) = self.rate_limit_period else {
                return Err(ConfigError::MalformedRateLimit {
                    missing: "rate_limit_period",
                });
            };
            if window.is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "rate_window",
                    reason: "must be non-zero".into(),
                });
            }
            if period == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "rate_limit_period",
                    reason: "must be greater than zero".into(),
                });
            }
            if nominal_delay(limit, window, period).is_zero() {
                return Err(ConfigError::InvalidValue {
                    field: "rate_limit",
                    reason: format!("{limit} per {window:?} x {period} leaves no delay between polls"),
                });
            }
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "poll_interval",
                reason: "must be non-zero".into(),
            });
        }
        Ok(())
    }

    /// Delay between scheduled cycles.
    pub fn schedule_delay(&self) -> Duration {
        match (self.rate_limit, self.rate_window, self.rate_limit_period) {
            (Some(limit), Some(window), Some(period)) => nominal_delay(limit, window, period),
            _ => self.poll_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_without_window_fails_fast() {
        let mut cfg = PollConfig::default();
        cfg.rate_limit = Some(150);
        cfg.rate_limit_period = Some(1);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::MalformedRateLimit {
                missing: "rate_window"
            })
        );
    }

    #[test]
    fn rate_limit_without_period_fails_fast() {
        let mut cfg = PollConfig::default();
        cfg.rate_limit = Some(150);
        cfg.rate_window = Some(Duration::from_secs(3600));
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::MalformedRateLimit { missing: "rate_limit_period" })
        ));
    }

    #[test]
    fn schedule_uses_quota_when_configured() {
        let cfg = PollConfig::default().with_rate_limit(150, Duration::from_secs(3600), 1);
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.schedule_delay(), Duration::from_millis(24_000));
        assert_eq!(PollConfig::default().schedule_delay(), DEFAULT_POLL_INTERVAL);
    }

    #[test]
    fn zero_window_or_period_rejected() {
        let cfg = PollConfig::default().with_rate_limit(150, Duration::ZERO, 1);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "rate_window", .. })
        ));
        let cfg = PollConfig::default().with_rate_limit(150, Duration::from_secs(3600), 0);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "rate_limit_period", .. })
        ));
    }

    #[test]
    fn quota_rounding_to_zero_delay_rejected() {
        let cfg = PollConfig::default().with_rate_limit(u32::MAX, Duration::from_nanos(1), 1);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::InvalidValue { field: "rate_limit", .. })
        ));
    }

    #[test]
    fn zero_history_rejected() {
        let cfg = PollConfig {
            max_history: 0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }
}
