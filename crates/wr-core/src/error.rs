//! # AppError
//!
//! Centralized error handling for the Word Registry ecosystem.
//! Maps domain-specific failures to actionable error types.

use chrono::Duration;
use thiserror::Error;

/// The primary error type for all wr-core operations.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (e.g., Word, Transaction)
    #[error("{0} not found: {1}")]
    NotFound(String, String),

    /// Resource already exists (e.g., word text already registered)
    #[error("conflict: {0}")]
    Conflict(String),

    /// Claim attempted on a word whose lockout has not elapsed
    #[error("word is currently locked. Time remaining: {hours}h {minutes}m")]
    Locked { hours: i64, minutes: i64 },

    /// Content Gate rejection (e.g., message contains a URL)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Unrecognized moderation action string
    #[error("invalid moderation action: {0}")]
    InvalidAction(String),

    /// Security/Auth failure (e.g., invalid admin token)
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Infrastructure failure (e.g., DB down, constraint violation)
    #[error("internal service error: {0}")]
    Internal(String),
}

impl AppError {
    /// Builds a `Locked` error from the time left on a lockout.
    pub fn locked(remaining: Duration) -> Self {
        let total_secs = remaining.num_seconds().max(0);
        AppError::Locked {
            hours: total_secs / 3600,
            minutes: (total_secs % 3600) / 60,
        }
    }
}

/// A specialized Result type for Word Registry logic.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locked_error_reports_remaining_time() {
        let err = AppError::locked(Duration::seconds(3 * 3600 + 24 * 60 + 59));
        match err {
            AppError::Locked { hours, minutes } => {
                assert_eq!(hours, 3);
                assert_eq!(minutes, 24);
            }
            other => panic!("expected Locked, got {other:?}"),
        }
    }

    #[test]
    fn locked_error_clamps_negative_durations() {
        let err = AppError::locked(Duration::seconds(-10));
        match err {
            AppError::Locked { hours, minutes } => {
                assert_eq!((hours, minutes), (0, 0));
            }
            other => panic!("expected Locked, got {other:?}"),
        }
    }
}
