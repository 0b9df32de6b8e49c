//! The keep-alive run: one platform check, one optional app ping.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn, Instrument};
use uuid::Uuid;

use crate::error::CheckError;
use crate::probes::http::HttpProbe;
use crate::probes::platform::AccountProbe;
use crate::probes::{self, Probe};
use crate::storage::history::{AppendOutcome, HistoryStore, RunRecord, RunSource};

/// Everything the runner needs to know, resolved from configuration.
#[derive(Clone, Default)]
pub struct RunnerSettings {
    pub api_url: String,
    pub token: Option<String>,
    pub app_url: Option<String>,
    pub request_timeout: Option<Duration>,
}

/// Outcome of one run, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    pub messages: Vec<String>,
}

pub struct Runner {
    api_url: String,
    app_url: Option<String>,
    account: Option<AccountProbe>,
    ping: HttpProbe,
}

impl Runner {
    pub fn new(settings: RunnerSettings) -> Result<Self> {
        let client = probes::build_client(settings.request_timeout)
            .context("Failed to build HTTP client")?;

        let account = settings
            .token
            .filter(|t| !t.trim().is_empty())
            .map(|token| AccountProbe::new(client.clone(), token));

        Ok(Self {
            api_url: settings.api_url,
            app_url: settings.app_url.filter(|u| !u.trim().is_empty()),
            account,
            ping: HttpProbe::new(client),
        })
    }

    pub fn has_credential(&self) -> bool {
        self.account.is_some()
    }

    pub fn app_url(&self) -> Option<&str> {
        self.app_url.as_deref()
    }

    /// Perform one keep-alive run. Never fails: every problem ends up as a
    /// message, and only a failed platform check clears `success`.
    pub async fn run(&self, source: RunSource) -> RunResult {
        let span = tracing::info_span!("keepalive_run", run_id = %Uuid::new_v4(), %source);
        self.run_inner(source).instrument(span).await
    }

    async fn run_inner(&self, source: RunSource) -> RunResult {
        let Some(account) = &self.account else {
            let err =
                CheckError::ConfigurationMissing("platform API token (set KEEPALIVE_TOKEN)".into());
            warn!(error = %err, "skipping run");
            return RunResult {
                success: false,
                messages: vec![err.to_string()],
            };
        };

        let mut messages = vec![format!("Keep-alive run started ({source})")];
        let mut success = true;

        match self.check_platform(account).await {
            Ok(line) => {
                info!("{}", line);
                messages.push(line);
            }
            Err(err) => {
                warn!(error = %err, "platform check failed");
                if err.is_fatal_to_run() {
                    success = false;
                }
                messages.push(err.to_string());
            }
        }

        if let Some(url) = &self.app_url {
            match self.ping_app(url).await {
                Ok(line) => {
                    info!("{}", line);
                    messages.push(line);
                }
                Err(err) => {
                    warn!(error = %err, "app ping failed");
                    messages.push(format!("{err} (advisory)"));
                }
            }
        }

        let status = if success { "success" } else { "error" };
        info!(%status, "keep-alive run finished");
        messages.push(format!("Keep-alive run finished: {status}"));

        RunResult { success, messages }
    }

    async fn check_platform(&self, account: &AccountProbe) -> Result<String, CheckError> {
        let outcome = account
            .run(&self.api_url)
            .await
            .map_err(|e| CheckError::PrimaryCheckFailed(format!("{e:#}")))?;
        debug!(kind = %outcome.kind, status = outcome.status, latency_ms = outcome.latency_ms, "probe finished");

        if !outcome.success {
            return Err(CheckError::PrimaryCheckFailed(format!(
                "HTTP {} from {}",
                outcome.status, outcome.target
            )));
        }

        Ok(format!(
            "Platform API OK: HTTP {} in {:.0} ms, account {}",
            outcome.status,
            outcome.latency_ms,
            outcome.detail.as_deref().unwrap_or("(unidentified)")
        ))
    }

    async fn ping_app(&self, url: &str) -> Result<String, CheckError> {
        let outcome = self
            .ping
            .run(url)
            .await
            .map_err(|e| CheckError::SecondaryCheckFailed(format!("{url}: {e:#}")))?;
        debug!(kind = %outcome.kind, status = outcome.status, latency_ms = outcome.latency_ms, "probe finished");

        if !outcome.success {
            return Err(CheckError::SecondaryCheckFailed(format!(
                "{} returned HTTP {} in {:.0} ms",
                outcome.target, outcome.status, outcome.latency_ms
            )));
        }

        Ok(format!(
            "App ping OK: {} returned HTTP {} in {:.0} ms",
            outcome.target, outcome.status, outcome.latency_ms
        ))
    }
}

/// Run once and, when a history store is configured, record the result.
///
/// The append runs on the blocking pool; a failed append leaves the returned
/// result untouched.
pub async fn run_and_record(
    runner: &Runner,
    history: Option<&Arc<HistoryStore>>,
    source: RunSource,
) -> RunResult {
    let result = runner.run(source).await;

    if let Some(history) = history {
        let record = RunRecord::now(result.success, source, result.messages.clone());
        match history.clone().append_blocking(record).await {
            AppendOutcome::Persisted { len } => debug!(len, %source, "run recorded"),
            AppendOutcome::Degraded(err) => {
                warn!(error = %err, %source, "run finished but history is unavailable")
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::history::RunStatus;
    use crate::storage::{KvStore, MemoryKv, StorageError};
    use std::time::Instant;

    /// Store whose writes always fail.
    struct OfflineKv;

    impl KvStore for OfflineKv {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }

        fn put(&self, _key: &str, _value: &str) -> Result<(), StorageError> {
            Err(StorageError::Unavailable("offline".into()))
        }
    }

    /// Store that blocks its calling thread on every write.
    #[derive(Default)]
    struct SlowKv {
        inner: MemoryKv,
    }

    impl KvStore for SlowKv {
        fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: &str) -> Result<(), StorageError> {
            std::thread::sleep(Duration::from_millis(300));
            self.inner.put(key, value)
        }
    }

    fn settings(token: Option<&str>) -> RunnerSettings {
        RunnerSettings {
            api_url: "http://127.0.0.1:1/v2/user".into(),
            token: token.map(str::to_string),
            app_url: None,
            request_timeout: Some(Duration::from_secs(5)),
        }
    }

    #[test]
    fn test_blank_token_counts_as_missing() {
        let runner = Runner::new(settings(Some("   "))).unwrap();
        assert!(!runner.has_credential());
    }

    #[test]
    fn test_blank_app_url_is_ignored() {
        let mut s = settings(Some("tok"));
        s.app_url = Some(String::new());
        let runner = Runner::new(s).unwrap();
        assert!(runner.has_credential());
        assert_eq!(runner.app_url(), None);
    }

    #[tokio::test]
    async fn test_run_and_record_appends_failed_run() {
        let runner = Runner::new(settings(None)).unwrap();
        let history = Arc::new(HistoryStore::new(Arc::new(MemoryKv::new()), 5));

        let result = run_and_record(&runner, Some(&history), RunSource::Manual).await;

        assert!(!result.success);
        let records = history.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].status, RunStatus::Error);
        assert_eq!(records[0].source, Some(RunSource::Manual));
        assert_eq!(records[0].messages, result.messages);
    }

    #[tokio::test]
    async fn test_offline_history_leaves_result_intact() {
        let runner = Runner::new(settings(None)).unwrap();
        let history = Arc::new(HistoryStore::new(Arc::new(OfflineKv), 5));

        let recorded = run_and_record(&runner, Some(&history), RunSource::Manual).await;
        let plain = runner.run(RunSource::Manual).await;

        assert_eq!(recorded, plain);
        assert!(history.list().is_empty());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_slow_history_does_not_block_runtime() {
        let runner = Runner::new(settings(None)).unwrap();
        let history = Arc::new(HistoryStore::new(Arc::new(SlowKv::default()), 5));
        let start = Instant::now();

        let ticker = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            start.elapsed()
        };
        let (ticked_at, result) = tokio::join!(
            ticker,
            run_and_record(&runner, Some(&history), RunSource::Scheduled)
        );

        assert!(ticked_at < Duration::from_millis(250), "ticker stalled for {ticked_at:?}");
        assert!(!result.success);
        assert_eq!(history.list().len(), 1);
    }

    #[tokio::test]
    async fn test_platform_unreachable_is_failure() {
        let runner = Runner::new(settings(Some("tok"))).unwrap();
        let result = runner.run(RunSource::Scheduled).await;

        assert!(!result.success);
        assert!(result
            .messages
            .iter()
            .any(|m| m.starts_with("Platform API check failed")));
    }
}
