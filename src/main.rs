//! Social poller — binary entrypoint.
//! Loads config, builds the orchestrator over the configured status feed,
//! starts the background scheduler and serves the control API.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use social_poller::api::{create_router, AppState};
use social_poller::config::load_config_default;
use social_poller::ingest::dispatch::ChannelDispatcher;
use social_poller::ingest::providers::StatusFeedFactory;
use social_poller::ingest::scheduler::spawn_poll_scheduler;
use social_poller::ingest::PollOrchestrator;
use social_poller::metrics::Metrics;

const ENV_LOG_JSON: &str = "POLLER_LOG_JSON";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("poller=info,social_poller=info,warn"));
    let json = std::env::var(ENV_LOG_JSON).ok().is_some_and(|v| v == "1");

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = load_config_default()?;
    let poll_cfg = cfg.poll_config().context("invalid [poll] section")?;
    let background = cfg.credentials.resolve()?;
    let metrics = Metrics::init()?;

    let factory = Arc::new(StatusFeedFactory::from_source(&cfg.source)?);
    let (dispatcher, mut rx) = ChannelDispatcher::channel(256);
    tokio::spawn(async move {
        while let Some(item) = rx.recv().await {
            tracing::info!(
                target: "poller",
                id = %item.id,
                user = item.user.as_ref().map(|u| u.token.as_str()).unwrap_or("-"),
                payload = %item.payload,
                "item dispatched"
            );
        }
    });

    let orchestrator = Arc::new(PollOrchestrator::new(
        poll_cfg,
        background,
        factory,
        Arc::new(dispatcher),
    )?);

    if orchestrator.should_schedule() {
        spawn_poll_scheduler(orchestrator.clone());
    } else {
        tracing::warn!(
            target: "poller",
            path = %cfg.source.path,
            "background polling disabled (turned off, or path needs user credentials)"
        );
    }

    let app = create_router(AppState { orchestrator }).merge(metrics.router());
    let listener = tokio::net::TcpListener::bind(&cfg.server.bind)
        .await
        .with_context(|| format!("binding {}", cfg.server.bind))?;
    tracing::info!(target: "poller", bind = %cfg.server.bind, "control api listening");
    axum::serve(listener, app).await.context("serving control api")?;
    Ok(())
}
