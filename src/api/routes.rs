//! API route definitions.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde_json::{json, Value};

use super::state::AppState;
use crate::runner::{run_and_record, RunResult};
use crate::storage::history::{RunRecord, RunSource};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/trigger", get(trigger))
        .route("/logs", get(logs))
        .route("/status", get(status))
        .route("/health", get(health))
}

async fn trigger(State(state): State<AppState>) -> Json<RunResult> {
    let result = run_and_record(&state.runner, state.history.as_ref(), RunSource::Manual).await;
    Json(result)
}

async fn logs(State(state): State<AppState>) -> Json<Vec<RunRecord>> {
    match state.history {
        Some(history) => Json(history.list_blocking().await),
        None => Json(Vec::new()),
    }
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let next_run = state
        .schedule
        .as_ref()
        .and_then(|s| s.next_after(Utc::now()))
        .map(|t| t.to_rfc3339());

    let last_run = match &state.history {
        Some(history) => history.clone().last_run_blocking().await,
        None => None,
    };

    Json(json!({
        "token_configured": state.runner.has_credential(),
        "history_configured": state.history.is_some(),
        "app_url": state.runner.app_url(),
        "schedule": state.schedule.as_ref().map(|s| s.expr()),
        "next_run": next_run,
        "last_run": last_run,
        "capacity": state.history.as_ref().map(|h| h.capacity()),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
