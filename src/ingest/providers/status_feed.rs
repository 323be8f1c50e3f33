// src/ingest/providers/status_feed.rs
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};

use crate::error::{DataFetchError, ReadError, SessionError};
use crate::ingest::providers::cursor::{param_value, CursorParams};
use crate::ingest::providers::decode::{JsonResultsDecoder, PayloadDecoder, XmlStatusDecoder};
use crate::ingest::providers::quota::{HeaderRateLimitProbe, RateLimitProbe};
use crate::ingest::providers::transport::{Method, Request, Response, Transport};
use crate::ingest::providers::PathKind;
use crate::ingest::session::SessionAware;
use crate::ingest::types::{
    Credentials, DataSourcePath, Headers, Item, ItemIter, Params, Payload,
};

pub const UPDATE_STREAM: &str = "statuses/update";
pub const DESTROY_STREAM: &str = "statuses/destroy";
/// Header carrying the id of the status to delete.
pub const DATA_ID_HEADER: &str = "data_id";
/// Optional update headers copied into the form when present.
pub const UPDATE_FORM_HEADERS: [&str; 4] = ["in_reply_to_status_id", "lat", "long", "place_id"];
pub const TRIM_USER: &str = "trim_user";

#[derive(Debug, Clone)]
pub struct StatusFeedConfig {
    pub base_url: String,
    pub search_url: Option<String>,
    pub timeout: Duration,
}

struct ActiveSession {
    authorization: String,
    client: Option<reqwest::Client>,
}

pub struct StatusFeedPath {
    kind: PathKind,
    cfg: StatusFeedConfig,
    transport: Transport,
    decoder: Box<dyn PayloadDecoder>,
    probe: Box<dyn RateLimitProbe>,
    session: Mutex<Option<ActiveSession>>,
    first_read: Mutex<Option<DateTime<Utc>>>,
}

impl StatusFeedPath {
    pub fn new(kind: PathKind, cfg: StatusFeedConfig, transport: Transport) -> Self {
        let decoder: Box<dyn PayloadDecoder> = match kind {
            PathKind::Search => Box::new(JsonResultsDecoder),
            _ => Box::new(XmlStatusDecoder),
        };
        Self {
            kind,
            cfg,
            transport,
            decoder,
            probe: Box::new(HeaderRateLimitProbe),
            session: Mutex::new(None),
            first_read: Mutex::new(None),
        }
    }

    fn url(&self, stream: &str) -> String {
        let base = match (self.kind, &self.cfg.search_url) {
            (PathKind::Search, Some(s)) => s.as_str(),
            _ => self.cfg.base_url.as_str(),
        };
        let sep = if base.ends_with('/') { "" } else { "/" };
        format!(
            "{base}{sep}{}{}",
            stream.trim_start_matches('/'),
            self.kind.format()
        )
    }

    fn session_parts(&self) -> (Option<String>, Option<reqwest::Client>) {
        match &*self.session.lock() {
            Some(s) => (Some(s.authorization.clone()), s.client.clone()),
            None => (None, None),
        }
    }

    async fn send(
        &self,
        method: Method,
        url: String,
        params: Vec<(String, String)>,
    ) -> Result<Response, DataFetchError> {
        let (authorization, client) = self.session_parts();
        let req = Request {
            method,
            url,
            params,
            authorization,
        };
        self.transport.send(req, client).await
    }
}

#[async_trait]
impl DataSourcePath for StatusFeedPath {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn read_data(&self, cursor: Option<&str>, params: &Params) -> Result<ItemIter, ReadError> {
        let Some(stream) = self.kind.stream() else {
            return Ok(Box::new(std::iter::empty()));
        };
        let first_read = *self.first_read.lock().get_or_insert_with(Utc::now);

        let url = self.url(stream);
        let resp = self
            .send(Method::Get, url.clone(), CursorParams::merge(cursor, params))
            .await?;

        if !resp.is_ok() {
            if let Some(signal) = self.probe.probe(&resp, first_read, Utc::now()) {
                return Err(ReadError::RateLimited(signal));
            }
            tracing::warn!(target: "poller", status = resp.status, url = %url, "backend refused read");
            return Err(DataFetchError::new(format!("{url} returned HTTP {}", resp.status)).into());
        }

        let items: Vec<Item> = self.decoder.decode_list(&resp.body)?;
        Ok(Box::new(items.into_iter()))
    }

    async fn update_data(
        &self,
        payload: &Payload,
        headers: &Headers,
    ) -> Result<Option<Item>, DataFetchError> {
        let no_headers = Headers::new();
        let (url, headers) = match self.kind {
            PathKind::Delete => {
                let id = headers
                    .get(DATA_ID_HEADER)
                    .map(param_value)
                    .filter(|s| !s.trim().is_empty())
                    .ok_or_else(|| DataFetchError::new("delete needs a `data_id` header"))?;
                (self.url(&format!("{DESTROY_STREAM}/{id}")), &no_headers)
            }
            _ => (self.url(UPDATE_STREAM), headers),
        };

        let mut form: Vec<(String, String)> = UPDATE_FORM_HEADERS
            .iter()
            .filter_map(|k| headers.get(*k).map(|v| (k.to_string(), param_value(v))))
            .collect();
        let trim = headers
            .get(TRIM_USER)
            .map(param_value)
            .unwrap_or_else(|| "1".to_string());
        form.push((TRIM_USER.to_string(), trim));
        form.push(("status".to_string(), param_value(payload)));
        form.sort();

        let resp = self.send(Method::Post, url.clone(), form).await?;
        if !resp.is_ok() {
            tracing::warn!(target: "poller", status = resp.status, url = %url, body = %resp.body, "could not update status");
            return Ok(None);
        }
        XmlStatusDecoder::decode_one(&resp.body).map(Some)
    }

    fn session(&self) -> Option<&dyn SessionAware> {
        Some(self)
    }
}

fn check_credentials(kind: &str, c: &Credentials) -> Result<(), SessionError> {
    for (field, v) in [("token", &c.token), ("secret", &c.secret)] {
        if v.trim().is_empty() {
            return Err(SessionError::MalformedCredentials(format!("{kind} {field} is empty")));
        }
        if HeaderValue::from_str(v).is_err() {
            return Err(SessionError::MalformedCredentials(format!(
                "{kind} {field} contains characters not allowed in headers"
            )));
        }
    }
    Ok(())
}

impl SessionAware for StatusFeedPath {
    fn init_session(&self, consumer: &Credentials, user: &Credentials) -> Result<(), SessionError> {
        check_credentials("consumer", consumer)?;
        check_credentials("user", user)?;

        let authorization = format!(
            r#"OAuth oauth_consumer_key="{}", oauth_token="{}""#,
            consumer.token, user.token
        );
        let client = match &self.transport {
            Transport::Fixture(_) => None,
            Transport::Http(_) => {
                let value = HeaderValue::from_str(&authorization)
                    .map_err(|e| SessionError::Setup(e.to_string()))?;
                let mut headers = HeaderMap::new();
                headers.insert(AUTHORIZATION, value);
                let client = reqwest::Client::builder()
                    .default_headers(headers)
                    .timeout(self.cfg.timeout)
                    .build()
                    .map_err(|e| SessionError::Setup(e.to_string()))?;
                Some(client)
            }
        };

        *self.session.lock() = Some(ActiveSession {
            authorization,
            client,
        });
        Ok(())
    }

    fn end_session(&self) {
        self.session.lock().take();
    }

    fn is_session_active(&self) -> bool {
        self.session.lock().is_some()
    }

    fn is_auth_required(&self) -> bool {
        self.kind.auth_required()
    }
}
