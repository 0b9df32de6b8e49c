//! keepalive -- scheduled keep-alive checks for a cloud platform account.
//!
//! This crate provides the runner that authenticates against the platform
//! API and pings the app, the bounded run history, the cron scheduler, and
//! the HTTP dashboard that ties them together.

pub mod api;
pub mod config;
pub mod error;
pub mod probes;
pub mod runner;
pub mod scheduler;
pub mod storage;

use std::sync::Arc;

use anyhow::Result;

use crate::api::state::AppState;
use crate::config::KeepaliveConfig;
use crate::error::CheckError;
use crate::runner::Runner;
use crate::scheduler::KeepaliveSchedule;
use crate::storage::history::HistoryStore;
use crate::storage::SqliteKv;

/// Open the history store described by `config`.
///
/// Returns `None` when history is disabled or the database cannot be
/// opened; the service keeps running without it.
pub fn open_history(config: &KeepaliveConfig) -> Option<Arc<HistoryStore>> {
    if !config.history.enabled {
        tracing::info!("History disabled, runs will not be recorded");
        return None;
    }

    let path = &config.history.db_path;
    match SqliteKv::open(path) {
        Ok(kv) => {
            tracing::info!(path = %path.display(), capacity = config.history.capacity, "History store ready");
            Some(Arc::new(HistoryStore::new(
                Arc::new(kv),
                config.history.capacity,
            )))
        }
        Err(e) => {
            let err = CheckError::HistoryBackingUnavailable(format!("{e:#}"));
            tracing::warn!(path = %path.display(), error = %err, "Continuing without history");
            None
        }
    }
}

/// Assemble the shared state for the API and scheduler.
pub fn build_state(config: &KeepaliveConfig) -> Result<AppState> {
    let runner = Arc::new(Runner::new(config.runner_settings())?);
    let history = open_history(config);
    let schedule = if config.schedule.enabled {
        Some(KeepaliveSchedule::parse(&config.schedule.cron)?)
    } else {
        None
    };

    Ok(AppState {
        runner,
        history,
        schedule,
    })
}

/// Start the keepalive daemon: API server, dashboard, and scheduler.
pub async fn serve(config: KeepaliveConfig) -> Result<()> {
    // 1. Runner, history, schedule
    let state = build_state(&config)?;
    if !state.runner.has_credential() {
        tracing::warn!("No platform API token configured, every run will fail until one is set");
    }

    // 2. Start Scheduler Engine (background task)
    if let Some(schedule) = state.schedule.clone() {
        let runner = state.runner.clone();
        let history = state.history.clone();
        tokio::spawn(async move {
            scheduler::run_scheduler_loop(schedule, runner, history).await;
        });
    } else {
        tracing::info!("Scheduled runs disabled");
    }

    // 3. Start API Server
    let addr: std::net::SocketAddr = config.server.bind.parse()?;
    let app = api::router(state);

    tracing::info!(%addr, "keepalive listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("keepalive stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}
