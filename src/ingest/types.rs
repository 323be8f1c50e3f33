// src/ingest/types.rs
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DataFetchError, PollError, ReadError};
use crate::ingest::session::SessionAware;

/// Free-form provider parameters (query, paging hints, ...).
pub type Params = HashMap<String, serde_json::Value>;
/// Per-item / per-command metadata.
pub type Headers = HashMap<String, serde_json::Value>;
/// Opaque item body. Backends decide what goes in here.
pub type Payload = serde_json::Value;

/// One-shot sequence returned by a single read. Cannot be iterated twice.
pub type ItemIter = Box<dyn Iterator<Item = Item> + Send>;

/// Token + secret pair, used both for the application (consumer) and the end user.
#[derive(Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct Credentials {
    pub token: String,
    pub secret: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            secret: secret.into(),
        }
    }
}

// Never print the secret.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &self.token)
            .field("secret", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    pub consumer: Option<Credentials>,
    pub user: Option<Credentials>,
}

impl CredentialSet {
    pub fn new(consumer: Option<Credentials>, user: Option<Credentials>) -> Self {
        Self { consumer, user }
    }

    /// User credentials without consumer credentials can never open a session.
    pub fn is_mismatched(&self) -> bool {
        self.user.is_some() && self.consumer.is_none()
    }

    /// Both halves present: a session should be opened.
    pub fn session_pair(&self) -> Option<(&Credentials, &Credentials)> {
        match (&self.consumer, &self.user) {
            (Some(c), Some(u)) => Some((c, u)),
            _ => None,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity::resolve(self.user.as_ref())
    }
}

/// Whose history and cursor apply to a poll/update.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    PerUser(String),
    Shared,
}

impl Identity {
    pub fn resolve(user: Option<&Credentials>) -> Self {
        match user {
            Some(c) => Identity::PerUser(c.token.clone()),
            None => Identity::Shared,
        }
    }
}

/// A unit of fetched or submitted data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub payload: Payload,
    #[serde(default)]
    pub headers: Headers,
}

impl Item {
    pub fn new(id: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: id.into(),
            payload,
            headers: Headers::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// What downstream receives for every new item.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchedItem {
    pub id: String,
    pub payload: Payload,
    pub headers: Headers,
    pub user: Option<Credentials>,
    pub consumer: Option<Credentials>,
}

impl DispatchedItem {
    pub fn from_item(item: Item, creds: &CredentialSet) -> Self {
        Self {
            id: item.id,
            payload: item.payload,
            headers: item.headers,
            user: creds.user.clone(),
            consumer: creds.consumer.clone(),
        }
    }
}

/// Contract every pluggable backend implements.
#[async_trait::async_trait]
pub trait DataSourcePath: Send + Sync {
    fn name(&self) -> &str;

    /// Items strictly after `cursor`, or an initial fetch when `cursor` is `None`.
    async fn read_data(&self, cursor: Option<&str>, params: &Params) -> Result<ItemIter, ReadError>;

    /// Submit `payload`. `Ok(None)` means the remote side rejected it non-fatally.
    async fn update_data(
        &self,
        payload: &Payload,
        headers: &Headers,
    ) -> Result<Option<Item>, DataFetchError>;

    /// Session lifecycle, for backends that have one.
    fn session(&self) -> Option<&dyn SessionAware> {
        None
    }
}

/// Builds fresh path instances (one per ad-hoc request).
pub trait PathFactory: Send + Sync {
    fn create(&self) -> Result<Arc<dyn DataSourcePath>, PollError>;
}

impl<F> PathFactory for F
where
    F: Fn() -> Result<Arc<dyn DataSourcePath>, PollError> + Send + Sync,
{
    fn create(&self) -> Result<Arc<dyn DataSourcePath>, PollError> {
        self()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_follows_user_token() {
        let u = Credentials::new("alice", "s1");
        assert_eq!(Identity::resolve(Some(&u)), Identity::PerUser("alice".into()));
        assert_eq!(Identity::resolve(None), Identity::Shared);
    }

    #[test]
    fn debug_redacts_secret() {
        let c = Credentials::new("tok", "very-secret");
        let s = format!("{c:?}");
        assert!(s.contains("tok"));
        assert!(!s.contains("very-secret"));
    }

    #[test]
    fn mismatch_needs_user_without_consumer() {
        let u = Credentials::new("u", "s");
        let c = Credentials::new("c", "s");
        assert!(CredentialSet::new(None, Some(u.clone())).is_mismatched());
        assert!(!CredentialSet::new(Some(c.clone()), Some(u)).is_mismatched());
        assert!(!CredentialSet::new(Some(c), None).is_mismatched());
        assert!(CredentialSet::default().session_pair().is_none());
    }
}
