//! Error types for the store adapter.

use pscheduler_core::{ProcessLogId, TaskId};
use std::fmt;

/// Errors from store operations.
#[derive(Debug)]
pub enum StoreError {
    /// The task was not found.
    TaskNotFound { id: TaskId },
    /// The process log was not found.
    ProcessLogNotFound { id: ProcessLogId },
    /// `trigger_type`/`trigger_args` failed variant validation.
    InvalidTrigger(pscheduler_trigger::TriggerError),
    /// A non-empty field (`title`, `command`) was empty.
    EmptyField { field: &'static str },
    /// The underlying database operation failed.
    Database(sqlx::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskNotFound { id } => write!(f, "task not found: {id}"),
            Self::ProcessLogNotFound { id } => write!(f, "process log not found: {id}"),
            Self::InvalidTrigger(e) => write!(f, "invalid trigger: {e}"),
            Self::EmptyField { field } => write!(f, "'{field}' must not be empty"),
            Self::Database(e) => write!(f, "store database error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Database(e) => Some(e),
            Self::InvalidTrigger(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e)
    }
}

impl From<pscheduler_trigger::TriggerError> for StoreError {
    fn from(e: pscheduler_trigger::TriggerError) -> Self {
        Self::InvalidTrigger(e)
    }
}

impl StoreError {
    /// Whether this error represents a client-caused validation failure
    /// (maps to HTTP 400 at the API layer) as opposed to an infrastructure
    /// failure or a not-found condition.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::InvalidTrigger(_) | Self::EmptyField { .. })
    }

    /// Whether this error represents a missing resource (maps to HTTP 404).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound { .. } | Self::ProcessLogNotFound { .. })
    }
}
