use super::KeepaliveSchedule;
use crate::runner::{run_and_record, Runner};
use crate::storage::history::{HistoryStore, RunSource};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

/// Main scheduler execution loop.
/// Sleeps until the next cron fire time, runs, repeats. Runs never overlap
/// within this loop and are never cancelled once started.
pub async fn run_scheduler_loop(
    schedule: KeepaliveSchedule,
    runner: Arc<Runner>,
    history: Option<Arc<HistoryStore>>,
) {
    info!(cron = %schedule.expr(), "Scheduler engine started");

    loop {
        let Some(next) = schedule.next_after(Utc::now()) else {
            error!(cron = %schedule.expr(), "Schedule has no future fire times, stopping");
            return;
        };
        info!(next_run = %next.to_rfc3339(), "Next keep-alive run scheduled");

        let wait = (next - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tokio::time::sleep(wait).await;

        let result = run_and_record(&runner, history.as_ref(), RunSource::Scheduled).await;
        info!(success = result.success, "Scheduled run complete");
    }
}
