use std::sync::Arc;

use crate::runner::Runner;
use crate::scheduler::KeepaliveSchedule;
use crate::storage::history::HistoryStore;

#[derive(Clone)]
pub struct AppState {
    pub runner: Arc<Runner>,
    /// `None` when no backing store is configured or it failed to open.
    pub history: Option<Arc<HistoryStore>>,
    /// `None` when scheduled runs are disabled.
    pub schedule: Option<KeepaliveSchedule>,
}
