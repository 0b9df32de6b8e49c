//! Failure taxonomy for keep-alive runs.
//!
//! None of these are fatal to the process. Each one is converted into a
//! logged message and a flag (or an [`AppendOutcome`](crate::storage::history::AppendOutcome)
//! variant) at the point where it happens.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckError {
    /// A required setting is absent. Fatal to the primary check only.
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// The authenticated platform request failed. Flips the run to error.
    #[error("Platform API check failed: {0}")]
    PrimaryCheckFailed(String),

    /// The app ping failed. Advisory only.
    #[error("App ping failed: {0}")]
    SecondaryCheckFailed(String),

    /// The history backing store could not be read or written.
    #[error("History backing store unavailable: {0}")]
    HistoryBackingUnavailable(String),
}

impl CheckError {
    /// Whether this failure should mark the whole run as failed.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(
            self,
            CheckError::ConfigurationMissing(_) | CheckError::PrimaryCheckFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_primary_failures_are_fatal() {
        assert!(CheckError::ConfigurationMissing("token".into()).is_fatal_to_run());
        assert!(CheckError::PrimaryCheckFailed("HTTP 500".into()).is_fatal_to_run());
        assert!(!CheckError::SecondaryCheckFailed("refused".into()).is_fatal_to_run());
        assert!(!CheckError::HistoryBackingUnavailable("locked".into()).is_fatal_to_run());
    }

    #[test]
    fn test_display_includes_reason() {
        let err = CheckError::PrimaryCheckFailed("HTTP 401".into());
        assert_eq!(err.to_string(), "Platform API check failed: HTTP 401");
    }
}
