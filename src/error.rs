//! Error types shared by the poller, its backends and the control surface.
//!
//! A rate-limit signal is not part of [`PollError`]; it is a
//! recoverable outcome of a read and is consumed by the orchestrator.

use std::time::Duration;

use thiserror::Error;

/// Boxed cause carried by transport/parse failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Provider asked us to back off for `wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSignal {
    pub wait: Duration,
}

impl RateLimitSignal {
    pub fn new(wait: Duration) -> Self {
        Self { wait }
    }
}

impl std::fmt::Display for RateLimitSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "retry in {}ms", self.wait.as_millis())
    }
}

/// Transport or parse failure reported by a backend.
#[derive(Error, Debug)]
#[error("data fetch failed: {message}")]
pub struct DataFetchError {
    message: String,
    #[source]
    source: Option<BoxError>,
}

impl DataFetchError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure of `read_data`.
#[derive(Error, Debug)]
pub enum ReadError {
    #[error("rate limit exceeded, {0}")]
    RateLimited(RateLimitSignal),

    #[error(transparent)]
    Fetch(#[from] DataFetchError),
}

/// Session setup failures (credential/signing problems).
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("malformed credentials: {0}")]
    MalformedCredentials(String),

    #[error("session setup failed: {0}")]
    Setup(String),
}

/// Construction-time misconfiguration. Always fatal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("rate limiting is enabled but `{missing}` is not configured")]
    MalformedRateLimit { missing: &'static str },

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: String,
    },

    #[error("unknown source path: {0}")]
    UnknownPath(String),
}

/// Errors surfaced by a poll cycle or an ad-hoc command.
#[derive(Error, Debug)]
pub enum PollError {
    #[error(transparent)]
    Fetch(#[from] DataFetchError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[source] BoxError),
}
