// src/ingest/providers/transport.rs
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use parking_lot::Mutex;

use crate::error::DataFetchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// What a path asks the transport to do. GET sends `params` as query, POST as form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: String,
    pub params: Vec<(String, String)>,
    /// `Authorization` value when a session is active.
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    /// Lowercased header names.
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Response {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Canned responses for tests and offline runs. Every request is recorded.
#[derive(Default)]
pub struct FixtureTransport {
    responses: Mutex<VecDeque<Response>>,
    requests: Mutex<Vec<Request>>,
}

impl FixtureTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, resp: Response) {
        self.responses.lock().push_back(resp);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn last_request(&self) -> Option<Request> {
        self.requests.lock().last().cloned()
    }

    fn respond(&self, req: Request) -> Result<Response, DataFetchError> {
        let url = req.url.clone();
        self.requests.lock().push(req);
        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| DataFetchError::new(format!("no fixture response queued for {url}")))
    }
}

#[derive(Clone)]
pub enum Transport {
    Fixture(Arc<FixtureTransport>),
    Http(reqwest::Client),
}

impl Transport {
    pub fn http(timeout: std::time::Duration) -> Result<Self, DataFetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DataFetchError::with_source("building http client", e))?;
        Ok(Transport::Http(client))
    }

    /// `session_client` replaces the base client while a session is active.
    pub async fn send(
        &self,
        req: Request,
        session_client: Option<reqwest::Client>,
    ) -> Result<Response, DataFetchError> {
        match self {
            Transport::Fixture(f) => f.respond(req),
            Transport::Http(base) => {
                let client = session_client.unwrap_or_else(|| base.clone());
                let t0 = Instant::now();
                let builder = match req.method {
                    Method::Get => client.get(&req.url).query(&req.params),
                    Method::Post => client.post(&req.url).form(&req.params),
                };

                let resp = builder.send().await.map_err(|e| {
                    tracing::warn!(target: "poller", error = ?e, url = %req.url, "backend http error");
                    DataFetchError::with_source(format!("request to {} failed", req.url), e)
                })?;

                let status = resp.status().as_u16();
                let headers = resp
                    .headers()
                    .iter()
                    .filter_map(|(k, v)| {
                        v.to_str()
                            .ok()
                            .map(|v| (k.as_str().to_ascii_lowercase(), v.to_string()))
                    })
                    .collect();
                let body = resp
                    .text()
                    .await
                    .map_err(|e| DataFetchError::with_source("reading response body", e))?;

                histogram!("poll_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
                Ok(Response {
                    status,
                    headers,
                    body,
                })
            }
        }
    }
}
