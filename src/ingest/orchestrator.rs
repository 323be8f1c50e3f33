//! # Poll orchestrator
//! Runs scheduled poll cycles and ad-hoc commands against one backend path.
//!
//! State is `Running` or `Suspended`. A rate-limit signal suspends the poller and
//! arms a one-shot resume timer; the transition and the arming happen under one
//! lock together with a generation bump, so a stale timer can never resume a
//! later suspension. Dedup history is shared by the scheduled and ad-hoc paths.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use metrics::{counter, gauge};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, Serializer};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::PollConfig;
use crate::error::{PollError, RateLimitSignal, ReadError};
use crate::history::DedupHistory;
use crate::ingest::backoff::resolve_suspend_duration;
use crate::ingest::dispatch::Dispatcher;
use crate::ingest::ensure_metrics_described;
use crate::ingest::session::{SessionCapability, SessionGuard};
use crate::ingest::types::{
    CredentialSet, Credentials, DataSourcePath, DispatchedItem, Headers, Identity, Item, Params,
    PathFactory, Payload,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollState {
    Running,
    Suspended,
}

/// Outcome of one read (scheduled or ad-hoc).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub dispatched: usize,
    pub skipped: usize,
    #[serde(rename = "suspended_for_ms", serialize_with = "millis")]
    pub suspended_for: Option<Duration>,
    /// Credentials were unusable; nothing was read.
    pub aborted: bool,
}

impl CycleReport {
    fn aborted() -> Self {
        Self {
            aborted: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandReport {
    pub aborted: bool,
    pub poll: Option<CycleReport>,
    /// `Some(true)` when an update produced a dispatched item.
    pub updated: Option<bool>,
}

fn millis<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&(d.as_millis() as u64)),
        None => s.serialize_none(),
    }
}

/// Inbound ad-hoc request. Every field is an optional override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Command {
    pub poll: Option<bool>,
    /// Defaults to `true` when a payload is present.
    pub update: Option<bool>,
    pub cursor: Option<String>,
    pub params: Option<Params>,
    pub payload: Option<Payload>,
    pub headers: Headers,
    pub consumer: Option<Credentials>,
    pub user: Option<Credentials>,
}

impl Command {
    pub fn poll() -> Self {
        Self {
            poll: Some(true),
            ..Default::default()
        }
    }

    pub fn update(payload: impl Into<Payload>) -> Self {
        Self {
            payload: Some(payload.into()),
            ..Default::default()
        }
    }

    pub fn with_user(mut self, user: Credentials) -> Self {
        self.user = Some(user);
        self
    }

    pub fn with_consumer(mut self, consumer: Credentials) -> Self {
        self.consumer = Some(consumer);
        self
    }

    pub fn with_cursor(mut self, cursor: &str) -> Self {
        self.cursor = Some(cursor.to_string());
        self
    }

    pub fn with_header(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.headers.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PollStatus {
    pub state: PollState,
    pub generation: u64,
    pub auth_required: bool,
    pub schedule_delay_ms: u64,
}

struct ControlInner {
    state: PollState,
    generation: u64,
    /// Start of the current run; reset on every resume. Basis for auto-delay.
    cycle_start: Instant,
    timer: Option<JoinHandle<()>>,
}

struct Control {
    inner: Mutex<ControlInner>,
}

impl Control {
    fn new() -> Self {
        Self {
            inner: Mutex::new(ControlInner {
                state: PollState::Running,
                generation: 0,
                cycle_start: Instant::now(),
                timer: None,
            }),
        }
    }

    fn state(&self) -> PollState {
        self.inner.lock().state
    }

    fn generation(&self) -> u64 {
        self.inner.lock().generation
    }

    /// Enter `Suspended` and arm the resume timer, atomically.
    /// A suspension while already suspended replaces the previous timer.
    fn suspend(self: &Arc<Self>, signal: &RateLimitSignal, auto_delay: bool) -> Duration {
        let mut g = self.inner.lock();
        let wait = resolve_suspend_duration(signal, auto_delay, g.cycle_start.elapsed());

        g.generation += 1;
        g.state = PollState::Suspended;
        let generation = g.generation;
        if let Some(old) = g.timer.take() {
            old.abort();
        }

        let control = Arc::clone(self);
        g.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            control.resume_from_timer(generation);
        }));
        gauge!("poll_suspended").set(1.0);
        wait
    }

    fn resume_from_timer(&self, generation: u64) -> bool {
        let mut g = self.inner.lock();
        if g.state == PollState::Running || g.generation != generation {
            tracing::debug!(target: "poller", generation, current = g.generation, "stale resume timer ignored");
            return false;
        }
        // this task is the timer; nothing to abort
        g.timer = None;
        Self::enter_running(&mut g);
        tracing::info!(target: "poller", "resumed by timer");
        true
    }

    fn resume(&self) -> bool {
        let mut g = self.inner.lock();
        if g.state == PollState::Running {
            return false;
        }
        if let Some(t) = g.timer.take() {
            t.abort();
        }
        Self::enter_running(&mut g);
        tracing::info!(target: "poller", "resumed externally");
        true
    }

    fn enter_running(g: &mut ControlInner) {
        g.state = PollState::Running;
        g.generation += 1;
        g.cycle_start = Instant::now();
        gauge!("poll_suspended").set(0.0);
    }

    fn cancel_timer(&self) {
        if let Some(t) = self.inner.lock().timer.take() {
            t.abort();
        }
    }
}

pub struct PollOrchestrator {
    config: PollConfig,
    background: CredentialSet,
    path: Arc<dyn DataSourcePath>,
    factory: Arc<dyn PathFactory>,
    history: Arc<DedupHistory>,
    dispatcher: Arc<dyn Dispatcher>,
    control: Arc<Control>,
}

impl PollOrchestrator {
    /// Validates `config` and creates the background path. Misconfiguration is fatal.
    pub fn new(
        config: PollConfig,
        background: CredentialSet,
        factory: Arc<dyn PathFactory>,
        dispatcher: Arc<dyn Dispatcher>,
    ) -> Result<Self, PollError> {
        config.validate()?;
        ensure_metrics_described();

        let path = factory.create()?;
        if background.is_mismatched() {
            tracing::warn!(
                target: "poller",
                path = path.name(),
                "background user credentials configured without consumer credentials; scheduled cycles will be skipped"
            );
        }
        tracing::info!(
            target: "poller",
            path = path.name(),
            delay_ms = config.schedule_delay().as_millis() as u64,
            max_history = config.max_history,
            skip_duplicates = config.skip_duplicates,
            "orchestrator ready"
        );

        let history = Arc::new(DedupHistory::new(config.max_history, config.skip_duplicates));
        Ok(Self {
            config,
            background,
            path,
            factory,
            history,
            dispatcher,
            control: Arc::new(Control::new()),
        })
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn history(&self) -> &Arc<DedupHistory> {
        &self.history
    }

    pub fn state(&self) -> PollState {
        self.control.state()
    }

    pub fn generation(&self) -> u64 {
        self.control.generation()
    }

    pub fn is_auth_required(&self) -> bool {
        SessionCapability::of(self.path.as_ref()).is_auth_required()
    }

    /// Whether a host should run the background scheduler at all.
    pub fn should_schedule(&self) -> bool {
        self.config.poll_enabled && !(self.is_auth_required() && self.background.user.is_none())
    }

    pub fn schedule_delay(&self) -> Duration {
        self.config.schedule_delay()
    }

    pub fn status(&self) -> PollStatus {
        PollStatus {
            state: self.state(),
            generation: self.generation(),
            auth_required: self.is_auth_required(),
            schedule_delay_ms: self.schedule_delay().as_millis() as u64,
        }
    }

    /// Back to `Running`. Returns `false` (no-op) if already running.
    pub fn resume(&self) -> bool {
        self.control.resume()
    }

    /// One scheduled cycle with the background credentials.
    pub async fn run_cycle(&self) -> Result<CycleReport, PollError> {
        if self.state() == PollState::Suspended {
            tracing::debug!(target: "poller", "cycle requested while suspended; skipping");
            return Ok(CycleReport::default());
        }
        counter!("poll_cycles_total").increment(1);
        gauge!("poll_last_cycle_ts").set(Utc::now().timestamp().max(0) as f64);

        let creds = &self.background;
        if creds.is_mismatched() {
            tracing::warn!(target: "poller", "user credentials without consumer credentials; cycle aborted");
            return Ok(CycleReport::aborted());
        }

        let identity = creds.identity();
        let cursor = self.history.cursor_for(&identity);
        let path = self.path.as_ref();
        let _session = open_session(path, creds)?;

        self.poll_path(path, &identity, cursor, &self.config.query, creds)
            .await
    }

    /// Ad-hoc poll and/or update with request-scoped credentials.
    ///
    /// Uses a fresh path from the factory so the background session is never touched.
    pub async fn handle(&self, cmd: Command) -> Result<CommandReport, PollError> {
        let creds = CredentialSet::new(
            cmd.consumer.clone().or_else(|| self.background.consumer.clone()),
            cmd.user.clone().or_else(|| self.background.user.clone()),
        );
        if creds.is_mismatched() {
            tracing::warn!(
                target: "poller",
                "command carries user credentials but no consumer credentials were found on it or in config; ignoring"
            );
            return Ok(CommandReport {
                aborted: true,
                ..Default::default()
            });
        }

        let identity = creds.identity();
        let path = self.factory.create()?;
        let _session = open_session(path.as_ref(), &creds)?;

        let mut report = CommandReport::default();
        if cmd.poll.unwrap_or(false) {
            let cursor = cmd
                .cursor
                .clone()
                .or_else(|| self.history.cursor_for(&identity));
            let params = cmd.params.as_ref().unwrap_or(&self.config.query);
            let polled = self
                .poll_path(path.as_ref(), &identity, cursor, params, &creds)
                .await?;
            report.poll = Some(polled);
        }

        if cmd.update.unwrap_or(cmd.payload.is_some()) {
            let updated = self
                .update_path(path.as_ref(), &identity, cmd.payload.as_ref(), &cmd.headers, &creds)
                .await?;
            report.updated = Some(updated);
        }

        Ok(report)
    }

    async fn poll_path(
        &self,
        path: &dyn DataSourcePath,
        identity: &Identity,
        cursor: Option<String>,
        params: &Params,
        creds: &CredentialSet,
    ) -> Result<CycleReport, PollError> {
        let mut report = CycleReport::default();

        let items = match path.read_data(cursor.as_deref(), params).await {
            Ok(items) => items,
            Err(ReadError::RateLimited(signal)) => {
                counter!("poll_rate_limited_total").increment(1);
                let wait = self.control.suspend(&signal, self.config.auto_delay);
                tracing::info!(
                    target: "poller",
                    path = path.name(),
                    provider_wait_ms = signal.wait.as_millis() as u64,
                    wait_ms = wait.as_millis() as u64,
                    "rate limited; suspending"
                );
                report.suspended_for = Some(wait);
                return Ok(report);
            }
            Err(ReadError::Fetch(e)) => {
                counter!("poll_fetch_errors_total").increment(1);
                return Err(e.into());
            }
        };

        for item in items {
            report.fetched += 1;
            if self.config.skip_duplicates && self.history.seen_recently(identity, &item.id) {
                report.skipped += 1;
                continue;
            }
            self.dispatch_and_record(identity, item, creds).await?;
            report.dispatched += 1;
        }

        counter!("poll_items_fetched_total").increment(report.fetched as u64);
        counter!("poll_items_dispatched_total").increment(report.dispatched as u64);
        counter!("poll_items_skipped_total").increment(report.skipped as u64);
        tracing::info!(
            target: "poller",
            path = path.name(),
            cursor = cursor.as_deref().unwrap_or("-"),
            fetched = report.fetched,
            dispatched = report.dispatched,
            skipped = report.skipped,
            "poll finished"
        );
        Ok(report)
    }

    async fn update_path(
        &self,
        path: &dyn DataSourcePath,
        identity: &Identity,
        payload: Option<&Payload>,
        headers: &Headers,
        creds: &CredentialSet,
    ) -> Result<bool, PollError> {
        let Some(payload) = payload else {
            tracing::warn!(target: "poller", "update requested without a payload; skipped");
            return Ok(false);
        };
        counter!("poll_updates_total").increment(1);

        match path.update_data(payload, headers).await {
            Ok(Some(item)) => {
                self.dispatch_and_record(identity, item, creds).await?;
                Ok(true)
            }
            Ok(None) => {
                tracing::info!(target: "poller", path = path.name(), "update rejected by remote");
                Ok(false)
            }
            Err(e) => {
                counter!("poll_update_errors_total").increment(1);
                tracing::warn!(target: "poller", error = %e, path = path.name(), "could not process update");
                Ok(false)
            }
        }
    }

    /// Hands `item` to the dispatcher, then records its id.
    ///
    /// The history check in the caller and this record are separate critical
    /// sections with the dispatch awaited between them, so dedup is best-effort
    /// across concurrent readers of the same identity: an ad-hoc poll racing a
    /// scheduled cycle may both dispatch the same new id.
    async fn dispatch_and_record(
        &self,
        identity: &Identity,
        item: Item,
        creds: &CredentialSet,
    ) -> Result<(), PollError> {
        let id = item.id.clone();
        self.dispatcher
            .dispatch(DispatchedItem::from_item(item, creds))
            .await
            .map_err(|e| PollError::Dispatch(e.into()))?;
        self.history.record(identity, &id);
        Ok(())
    }
}

impl Drop for PollOrchestrator {
    fn drop(&mut self) {
        self.control.cancel_timer();
    }
}

fn open_session<'a>(
    path: &'a dyn DataSourcePath,
    creds: &CredentialSet,
) -> Result<Option<SessionGuard<'a>>, PollError> {
    match creds.session_pair() {
        Some((consumer, user)) => Ok(Some(SessionCapability::of(path).open(consumer, user)?)),
        None => Ok(None),
    }
}
