//! Error types for the execution monitor.

use std::fmt;

/// The return code recorded when the OS itself refuses to launch the
/// command (an implementation-chosen non-zero sentinel).
pub const SPAWN_FAILURE_SENTINEL: i32 = 127;

/// Errors surfaced by [`crate::monitor::ExecutionMonitor`].
///
/// These are always caught internally and converted into a `failed`
/// `ProcessLog` where possible; they exist as a type mainly so
/// callers that do want to observe the failure (tests, logging) can match
/// on it.
#[derive(Debug)]
pub enum MonitorError {
    /// The store rejected a read or write.
    Store(pscheduler_store::StoreError),
    /// The OS refused to spawn the child process.
    SpawnFailed { reason: String },
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Store(e) => write!(f, "execution monitor store error: {e}"),
            Self::SpawnFailed { reason } => write!(f, "failed to spawn process: {reason}"),
        }
    }
}

impl std::error::Error for MonitorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            Self::SpawnFailed { .. } => None,
        }
    }
}

impl From<pscheduler_store::StoreError> for MonitorError {
    fn from(e: pscheduler_store::StoreError) -> Self {
        Self::Store(e)
    }
}
