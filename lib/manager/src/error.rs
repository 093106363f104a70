//! Error types for the task registry and its reconciliation loop.

use pscheduler_core::TaskId;
use pscheduler_store::StoreError;
use std::fmt;

/// Errors surfaced by [`crate::manager::Manager`].
#[derive(Debug)]
pub enum ManagerError {
    /// `run_task`/`stop_task` referenced a `task_id` absent from the registry.
    TaskNotFound { task_id: TaskId },
    /// `sync()` failed to read the persistent task set.
    Store(StoreError),
}

impl fmt::Display for ManagerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaskNotFound { task_id } => write!(f, "executor not found for task {task_id}"),
            Self::Store(e) => write!(f, "manager store error: {e}"),
        }
    }
}

impl std::error::Error for ManagerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::TaskNotFound { .. } => None,
            Self::Store(e) => Some(e),
        }
    }
}

impl From<StoreError> for ManagerError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
