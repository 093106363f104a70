//! The per-task executor state machine and the process-wide manager that
//! reconciles it against the persistent task set.

pub mod error;
pub mod executor;
pub mod manager;

pub use error::ManagerError;
pub use executor::{Executor, ExecutorStatus};
pub use manager::{ExecutorSnapshot, Manager};
