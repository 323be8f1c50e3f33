// src/config/mod.rs
pub mod credentials;
pub mod poll;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;
use crate::ingest::types::Params;

pub use credentials::CredentialsSection;
pub use poll::PollConfig;

pub const ENV_CONFIG_PATH: &str = "POLLER_CONFIG_PATH";
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

/// Whole service configuration as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub poll: PollSection,
    pub source: SourceSection,
    pub credentials: CredentialsSection,
    pub server: ServerSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollSection {
    pub max_history: usize,
    pub skip_duplicates: bool,
    pub enabled: bool,
    pub rate_limit: Option<u32>,
    pub rate_window_secs: Option<u64>,
    pub rate_limit_period: Option<u32>,
    pub auto_delay: bool,
    pub interval_secs: u64,
    pub query: Params,
}

impl Default for PollSection {
    fn default() -> Self {
        let d = PollConfig::default();
        Self {
            max_history: d.max_history,
            skip_duplicates: d.skip_duplicates,
            enabled: d.poll_enabled,
            rate_limit: None,
            rate_window_secs: None,
            rate_limit_period: None,
            auto_delay: d.auto_delay,
            interval_secs: d.poll_interval.as_secs(),
            query: Params::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    /// "public" | "home" | "search" | "update" | "delete"
    pub path: String,
    pub base_url: String,
    /// Search lives on its own host for some providers.
    pub search_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for SourceSection {
    fn default() -> Self {
        Self {
            path: "public".into(),
            base_url: "http://127.0.0.1:9000/1/".into(),
            search_url: None,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub bind: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.into(),
        }
    }
}

impl AppConfig {
    /// Validated poll settings.
    pub fn poll_config(&self) -> Result<PollConfig, ConfigError> {
        let p = &self.poll;
        let cfg = PollConfig {
            max_history: p.max_history,
            skip_duplicates: p.skip_duplicates,
            poll_enabled: p.enabled,
            rate_limit: p.rate_limit,
            rate_window: p.rate_window_secs.map(Duration::from_secs),
            rate_limit_period: p.rate_limit_period,
            auto_delay: p.auto_delay,
            poll_interval: Duration::from_secs(p.interval_secs),
            query: p.query.clone(),
        };
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
}

/// Load config using env var + fallbacks:
/// 1) $POLLER_CONFIG_PATH
/// 2) config/poller.toml
/// 3) config/poller.json
/// 4) built-in defaults
pub fn load_config_default() -> Result<AppConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        } else {
            return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
        }
    }
    let toml_p = PathBuf::from("config/poller.toml");
    if toml_p.exists() {
        return load_config_from(&toml_p);
    }
    let json_p = PathBuf::from("config/poller.json");
    if json_p.exists() {
        return load_config_from(&json_p);
    }
    Ok(AppConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    let looks_json = s.trim_start().starts_with('{');
    if hint_ext == "json" || (hint_ext != "toml" && looks_json) {
        return serde_json::from_str(s).context("parsing JSON config");
    }
    toml::from_str(s).context("parsing TOML config")
}
