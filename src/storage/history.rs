//! Bounded run history: newest-first, capped, stored under a single key.

use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{KvStore, StorageError};
use crate::error::CheckError;

/// Key holding the JSON array of records.
pub const HISTORY_KEY: &str = "keepalive:history";
/// Key holding the ISO-8601 timestamp of the most recent append.
pub const LAST_RUN_KEY: &str = "keepalive:last_run";
/// Number of records kept when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 20;

/// What started a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunSource {
    Manual,
    Scheduled,
}

impl std::fmt::Display for RunSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunSource::Manual => write!(f, "manual"),
            RunSource::Scheduled => write!(f, "scheduled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

/// One completed run, as stored in the history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub timestamp: String,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<RunSource>,
    pub messages: Vec<String>,
}

impl RunRecord {
    /// Build a record stamped with the current UTC time.
    pub fn now(success: bool, source: RunSource, messages: Vec<String>) -> Self {
        Self {
            timestamp: iso_now(),
            status: if success {
                RunStatus::Success
            } else {
                RunStatus::Error
            },
            source: Some(source),
            messages,
        }
    }
}

/// Result of [`HistoryStore::append`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The record was written; `len` is the history length afterwards.
    Persisted { len: usize },
    /// The backing store failed and nothing was written.
    Degraded(CheckError),
}

impl AppendOutcome {
    pub fn is_persisted(&self) -> bool {
        matches!(self, AppendOutcome::Persisted { .. })
    }
}

/// Capacity-bounded history on top of a [`KvStore`].
///
/// Appends through one store are serialised. Two processes writing the same
/// backing database can still interleave and lose an update.
pub struct HistoryStore {
    kv: Arc<dyn KvStore>,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn new(kv: Arc<dyn KvStore>, capacity: usize) -> Self {
        Self {
            kv,
            capacity: capacity.max(1),
            write_lock: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Prepend `record`, drop anything past capacity, and stamp the last-run marker.
    /// A failed marker write is logged; the append still counts as persisted.
    pub fn append(&self, record: RunRecord) -> AppendOutcome {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match self.try_append(record) {
            Ok(len) => {
                debug!(len, "history appended");
                AppendOutcome::Persisted { len }
            }
            Err(e) => {
                let err = CheckError::HistoryBackingUnavailable(e.to_string());
                warn!(error = %err, "run not recorded");
                AppendOutcome::Degraded(err)
            }
        }
    }

    fn try_append(&self, record: RunRecord) -> Result<usize, StorageError> {
        let mut records = self.read().unwrap_or_else(|e| {
            warn!(error = %e, "existing history unreadable, starting fresh");
            Vec::new()
        });

        records.insert(0, record);
        records.truncate(self.capacity);

        let encoded = serde_json::to_string(&records)?;
        self.kv.put(HISTORY_KEY, &encoded)?;

        // The record is already stored; a missing marker only affects `last_run`.
        if let Err(e) = self.kv.put(LAST_RUN_KEY, &iso_now()) {
            warn!(error = %e, "run recorded but last-run marker not updated");
        }

        Ok(records.len())
    }

    /// All stored records, newest first. Empty when missing or unreadable.
    pub fn list(&self) -> Vec<RunRecord> {
        match self.read() {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "failed to read history");
                Vec::new()
            }
        }
    }

    /// Timestamp of the most recent successful append, if any.
    pub fn last_run(&self) -> Option<String> {
        match self.kv.get(LAST_RUN_KEY) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "failed to read last-run marker");
                None
            }
        }
    }

    /// [`append`](Self::append) on the blocking pool.
    pub async fn append_blocking(self: Arc<Self>, record: RunRecord) -> AppendOutcome {
        match tokio::task::spawn_blocking(move || self.append(record)).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = CheckError::HistoryBackingUnavailable(format!("history task failed: {e}"));
                warn!(error = %err, "run not recorded");
                AppendOutcome::Degraded(err)
            }
        }
    }

    /// [`list`](Self::list) on the blocking pool.
    pub async fn list_blocking(self: Arc<Self>) -> Vec<RunRecord> {
        tokio::task::spawn_blocking(move || self.list())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "history task failed");
                Vec::new()
            })
    }

    /// [`last_run`](Self::last_run) on the blocking pool.
    pub async fn last_run_blocking(self: Arc<Self>) -> Option<String> {
        tokio::task::spawn_blocking(move || self.last_run())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, "history task failed");
                None
            })
    }

    fn read(&self) -> Result<Vec<RunRecord>, StorageError> {
        match self.kv.get(HISTORY_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}

fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
