// tests/support/mod.rs
//
// Scripted backend shared by the orchestrator tests. Reads and updates pop
// canned outcomes in order; session calls are counted.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use social_poller::error::{
    DataFetchError, PollError, RateLimitSignal, ReadError, SessionError,
};
use social_poller::ingest::session::SessionAware;
use social_poller::ingest::types::{
    Credentials, DataSourcePath, Headers, Item, ItemIter, Params, PathFactory, Payload,
};

pub enum Read {
    Items(Vec<&'static str>),
    RateLimited(Duration),
    Fail(&'static str),
}

pub enum Update {
    Accepted(&'static str),
    Rejected,
    Fail(&'static str),
}

#[derive(Default)]
pub struct ScriptedPath {
    reads: Mutex<VecDeque<Read>>,
    updates: Mutex<VecDeque<Update>>,
    pub read_calls: Mutex<Vec<(Option<String>, Params)>>,
    pub update_calls: Mutex<Vec<(Payload, Headers)>>,

    pub session_aware: bool,
    pub auth_required: bool,
    pub reject_session: bool,
    active: AtomicBool,
    pub inits: AtomicUsize,
    pub ends: AtomicUsize,
    pub reads_with_session: AtomicUsize,
}

impl ScriptedPath {
    pub fn sessionless() -> Self {
        Self::default()
    }

    pub fn sessionful() -> Self {
        Self {
            session_aware: true,
            ..Default::default()
        }
    }

    pub fn requiring_auth(mut self) -> Self {
        self.auth_required = true;
        self
    }

    pub fn rejecting_sessions(mut self) -> Self {
        self.reject_session = true;
        self
    }

    pub fn reads(self, script: Vec<Read>) -> Self {
        *self.reads.lock() = script.into();
        self
    }

    pub fn updates(self, script: Vec<Update>) -> Self {
        *self.updates.lock() = script.into();
        self
    }

    pub fn push_read(&self, r: Read) {
        self.reads.lock().push_back(r);
    }

    pub fn cursors(&self) -> Vec<Option<String>> {
        self.read_calls.lock().iter().map(|(c, _)| c.clone()).collect()
    }

    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    pub fn ends(&self) -> usize {
        self.ends.load(Ordering::SeqCst)
    }

    pub fn active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

pub fn item(id: &str) -> Item {
    Item::new(id, json!({ "text": format!("status {id}") }))
}

#[async_trait::async_trait]
impl DataSourcePath for ScriptedPath {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn read_data(&self, cursor: Option<&str>, params: &Params) -> Result<ItemIter, ReadError> {
        self.read_calls
            .lock()
            .push((cursor.map(str::to_string), params.clone()));
        if self.active() {
            self.reads_with_session.fetch_add(1, Ordering::SeqCst);
        }
        let next = self.reads.lock().pop_front();
        match next {
            None => Ok(Box::new(std::iter::empty())),
            Some(Read::Items(ids)) => {
                let items: Vec<Item> = ids.into_iter().map(item).collect();
                Ok(Box::new(items.into_iter()))
            }
            Some(Read::RateLimited(wait)) => Err(ReadError::RateLimited(RateLimitSignal::new(wait))),
            Some(Read::Fail(msg)) => Err(DataFetchError::new(msg).into()),
        }
    }

    async fn update_data(
        &self,
        payload: &Payload,
        headers: &Headers,
    ) -> Result<Option<Item>, DataFetchError> {
        self.update_calls
            .lock()
            .push((payload.clone(), headers.clone()));
        let next = self.updates.lock().pop_front();
        match next {
            None | Some(Update::Rejected) => Ok(None),
            Some(Update::Accepted(id)) => Ok(Some(item(id))),
            Some(Update::Fail(msg)) => Err(DataFetchError::new(msg)),
        }
    }

    fn session(&self) -> Option<&dyn SessionAware> {
        if self.session_aware {
            Some(self)
        } else {
            None
        }
    }
}

impl SessionAware for ScriptedPath {
    fn init_session(&self, _c: &Credentials, _u: &Credentials) -> Result<(), SessionError> {
        self.inits.fetch_add(1, Ordering::SeqCst);
        if self.reject_session {
            return Err(SessionError::MalformedCredentials("rejected by script".into()));
        }
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn end_session(&self) {
        self.ends.fetch_add(1, Ordering::SeqCst);
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_session_active(&self) -> bool {
        self.active()
    }

    fn is_auth_required(&self) -> bool {
        self.auth_required
    }
}

/// Factory that always hands back the same path instance.
pub fn same_path(path: Arc<ScriptedPath>) -> Arc<dyn PathFactory> {
    Arc::new(move || -> Result<Arc<dyn DataSourcePath>, PollError> {
        let p: Arc<dyn DataSourcePath> = path.clone();
        Ok(p)
    })
}

/// Factory producing a fresh sessionful path per call; all of them are kept for inspection.
#[derive(Default)]
pub struct FreshPaths {
    pub made: Mutex<Vec<Arc<ScriptedPath>>>,
    pub reads_per_path: Vec<&'static str>,
}

impl FreshPaths {
    pub fn new(reads_per_path: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            made: Mutex::new(Vec::new()),
            reads_per_path,
        })
    }

    pub fn path(&self, idx: usize) -> Arc<ScriptedPath> {
        self.made.lock()[idx].clone()
    }

    pub fn count(&self) -> usize {
        self.made.lock().len()
    }
}

impl PathFactory for FreshPaths {
    fn create(&self) -> Result<Arc<dyn DataSourcePath>, PollError> {
        let p = Arc::new(
            ScriptedPath::sessionful().reads(vec![Read::Items(self.reads_per_path.clone())]),
        );
        self.made.lock().push(p.clone());
        let p: Arc<dyn DataSourcePath> = p;
        Ok(p)
    }
}

pub fn consumer() -> Credentials {
    Credentials::new("app-key", "app-secret")
}

pub fn user(name: &str) -> Credentials {
    Credentials::new(name, format!("{name}-secret"))
}
