use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;

use crate::error::PollError;
use crate::ingest::orchestrator::{Command, CommandReport, PollOrchestrator, PollStatus};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PollOrchestrator>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .route("/command", post(command))
        .route("/resume", post(resume))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
struct StatusOut {
    #[serde(flatten)]
    status: PollStatus,
    should_schedule: bool,
}

async fn status(State(state): State<AppState>) -> Json<StatusOut> {
    let o = &state.orchestrator;
    Json(StatusOut {
        status: o.status(),
        should_schedule: o.should_schedule(),
    })
}

async fn command(
    State(state): State<AppState>,
    Json(cmd): Json<Command>,
) -> Result<Json<CommandReport>, (StatusCode, String)> {
    state
        .orchestrator
        .handle(cmd)
        .await
        .map(Json)
        .map_err(|e| {
            tracing::warn!(target: "poller", error = %e, "command failed");
            (error_status(&e), e.to_string())
        })
}

#[derive(serde::Serialize)]
struct ResumeOut {
    resumed: bool,
}

async fn resume(State(state): State<AppState>) -> Json<ResumeOut> {
    Json(ResumeOut {
        resumed: state.orchestrator.resume(),
    })
}

fn error_status(e: &PollError) -> StatusCode {
    match e {
        PollError::Session(_) => StatusCode::UNAUTHORIZED,
        PollError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        PollError::Fetch(_) | PollError::Dispatch(_) => StatusCode::BAD_GATEWAY,
    }
}
