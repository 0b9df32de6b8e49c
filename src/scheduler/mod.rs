//! Cron-driven scheduled runs.

pub mod cron;
pub mod engine;

// Re-export common types
pub use self::cron::{KeepaliveSchedule, DEFAULT_CRON};
pub use self::engine::run_scheduler_loop;
