// src/config/credentials.rs
use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::env;

use crate::ingest::types::{CredentialSet, Credentials};

pub const ENV_CONSUMER_TOKEN: &str = "POLLER_CONSUMER_TOKEN";
pub const ENV_CONSUMER_SECRET: &str = "POLLER_CONSUMER_SECRET";
pub const ENV_USER_TOKEN: &str = "POLLER_USER_TOKEN";
pub const ENV_USER_SECRET: &str = "POLLER_USER_SECRET";

/// Background credentials as written in the config file.
/// A value of "ENV" means: read it from the matching `POLLER_*` env var.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsSection {
    pub consumer_token: Option<String>,
    pub consumer_secret: Option<String>,
    pub user_token: Option<String>,
    pub user_secret: Option<String>,
}

impl CredentialsSection {
    pub fn resolve(&self) -> Result<CredentialSet> {
        let consumer = pair(
            "consumer",
            resolve_value(&self.consumer_token, ENV_CONSUMER_TOKEN)?,
            resolve_value(&self.consumer_secret, ENV_CONSUMER_SECRET)?,
        )?;
        let user = pair(
            "user",
            resolve_value(&self.user_token, ENV_USER_TOKEN)?,
            resolve_value(&self.user_secret, ENV_USER_SECRET)?,
        )?;

        // Safe diagnostics: presence only
        tracing::info!(
            target: "poller",
            consumer = consumer.is_some(),
            user = user.is_some(),
            "background credentials resolved"
        );
        Ok(CredentialSet::new(consumer, user))
    }
}

fn resolve_value(raw: &Option<String>, env_key: &str) -> Result<Option<String>> {
    let Some(v) = raw else { return Ok(None) };
    let v = v.trim();
    if v.is_empty() {
        return Ok(None);
    }
    if v.eq_ignore_ascii_case("env") {
        return env::var(env_key)
            .map(Some)
            .map_err(|_| anyhow!("Missing {env_key} env var"));
    }
    Ok(Some(v.to_string()))
}

fn pair(kind: &str, token: Option<String>, secret: Option<String>) -> Result<Option<Credentials>> {
    match (token, secret) {
        (Some(t), Some(s)) => Ok(Some(Credentials::new(t, s))),
        (None, None) => Ok(None),
        _ => bail!("{kind} credentials need both token and secret"),
    }
}
