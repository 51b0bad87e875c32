//! # AppError
//!
//! Centralized error handling for the wall.
//! Every structural mutation runs inside one transaction, so any of these
//! errors means the interval encoding was left untouched.

use thiserror::Error;

/// The primary error type for all wall-core operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// Referenced message or parent is absent (e.g., deleted meanwhile)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// Permission check failed on edit, hide or delete
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The per-tree write lock could not be taken in time; safe to retry
    #[error("busy: {0}")]
    Busy(String),

    /// Underlying persistence failure; the transaction was aborted
    #[error("storage error: {0}")]
    Storage(String),

    /// Validation failure (e.g., empty message content)
    #[error("validation error: {0}")]
    ValidationError(String),

    /// The viewer must be signed in for this action
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl AppError {
    pub fn message_not_found(id: impl ToString) -> Self {
        AppError::NotFound("Message".to_string(), id.to_string())
    }

    /// Only lock contention is worth retrying as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Busy(_))
    }
}

/// A specialized Result type for wall logic.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_busy_is_retryable() {
        assert!(AppError::Busy("tree lock".into()).is_retryable());
        assert!(!AppError::Storage("disk full".into()).is_retryable());
        assert!(!AppError::message_not_found(7).is_retryable());
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(
            AppError::message_not_found("abc").to_string(),
            "Message not found with ID abc"
        );
    }
}
