//! Server-rendered dashboard page.

use askama::Template;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};

use super::state::AppState;

#[derive(Template)]
#[template(path = "dashboard.html")]
pub struct DashboardTemplate {
    pub token_configured: bool,
    pub history_configured: bool,
    pub app_url: Option<String>,
    pub schedule: Option<String>,
    pub capacity: usize,
    pub version: &'static str,
}

impl DashboardTemplate {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            token_configured: state.runner.has_credential(),
            history_configured: state.history.is_some(),
            app_url: state.runner.app_url().map(str::to_string),
            schedule: state.schedule.as_ref().map(|s| s.expr().to_string()),
            capacity: state.history.as_ref().map(|h| h.capacity()).unwrap_or(0),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Fallback handler: every path outside `/api` renders the dashboard.
pub async fn dashboard(State(state): State<AppState>) -> Response {
    match DashboardTemplate::from_state(&state).render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to render dashboard");
            (StatusCode::INTERNAL_SERVER_ERROR, "dashboard unavailable").into_response()
        }
    }
}
