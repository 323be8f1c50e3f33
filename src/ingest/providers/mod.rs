// src/ingest/providers/mod.rs
pub mod cursor;
pub mod decode;
pub mod quota;
pub mod status_feed;
pub mod transport;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::SourceSection;
use crate::error::{ConfigError, PollError};
use crate::ingest::types::{DataSourcePath, PathFactory};

pub use status_feed::{StatusFeedConfig, StatusFeedPath};
pub use transport::{FixtureTransport, Response, Transport};

/// Which status stream a path talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Public,
    Home,
    Search,
    Update,
    Delete,
}

impl PathKind {
    pub fn name(&self) -> &'static str {
        match self {
            PathKind::Public => "public",
            PathKind::Home => "home",
            PathKind::Search => "search",
            PathKind::Update => "update",
            PathKind::Delete => "delete",
        }
    }

    /// Read stream, or `None` for update-only paths.
    pub fn stream(&self) -> Option<&'static str> {
        match self {
            PathKind::Public => Some("statuses/public_timeline"),
            PathKind::Home => Some("statuses/home_timeline"),
            PathKind::Search => Some("search"),
            PathKind::Update | PathKind::Delete => None,
        }
    }

    pub fn format(&self) -> &'static str {
        match self {
            PathKind::Search => ".json",
            _ => ".xml",
        }
    }

    pub fn auth_required(&self) -> bool {
        matches!(self, PathKind::Home | PathKind::Update | PathKind::Delete)
    }
}

impl FromStr for PathKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "public" => Ok(PathKind::Public),
            "home" => Ok(PathKind::Home),
            "search" => Ok(PathKind::Search),
            "update" => Ok(PathKind::Update),
            "delete" => Ok(PathKind::Delete),
            other => Err(ConfigError::UnknownPath(other.to_string())),
        }
    }
}

/// Hands out fresh [`StatusFeedPath`]s sharing one transport.
#[derive(Clone)]
pub struct StatusFeedFactory {
    kind: PathKind,
    cfg: StatusFeedConfig,
    transport: Transport,
}

impl StatusFeedFactory {
    pub fn new(kind: PathKind, cfg: StatusFeedConfig, transport: Transport) -> Self {
        Self {
            kind,
            cfg,
            transport,
        }
    }

    /// Real HTTP factory from the `[source]` config section.
    pub fn from_source(src: &SourceSection) -> Result<Self, PollError> {
        let kind: PathKind = src.path.parse()?;
        let cfg = StatusFeedConfig {
            base_url: src.base_url.clone(),
            search_url: src.search_url.clone(),
            timeout: Duration::from_secs(src.timeout_secs.max(1)),
        };
        let transport = Transport::http(cfg.timeout)?;
        Ok(Self::new(kind, cfg, transport))
    }

    /// Fixture-backed factory; all paths it creates share `fixture`.
    pub fn fixture(kind: PathKind, fixture: Arc<FixtureTransport>) -> Self {
        let cfg = StatusFeedConfig {
            base_url: "http://fixture.local/1/".into(),
            search_url: None,
            timeout: Duration::from_secs(1),
        };
        Self::new(kind, cfg, Transport::Fixture(fixture))
    }
}

impl PathFactory for StatusFeedFactory {
    fn create(&self) -> Result<Arc<dyn DataSourcePath>, PollError> {
        Ok(Arc::new(StatusFeedPath::new(
            self.kind,
            self.cfg.clone(),
            self.transport.clone(),
        )))
    }
}
