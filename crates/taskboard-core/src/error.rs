//! Validation errors for task input.

use thiserror::Error;

/// A task body was rejected.
///
/// The `Display` text is what API clients see in `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("title required")]
    MissingTitle,

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid priority: {0}")]
    InvalidPriority(String),

    #[error("invalid date: {0}")]
    InvalidDate(String),

    #[error("grade must be between 0 and 100, got {0}")]
    InvalidGrade(String),

    #[error("invalid task id: {0}")]
    InvalidId(String),
}
