//! Persistent store adapter for pscheduler.
//!
//! Exposes typed read/write operations for tasks, process logs, and output
//! logs over a PostgreSQL pool, with transactional commit semantics and
//! rollback on failure.

pub mod error;
pub mod models;
pub mod store;

pub use error::StoreError;
pub use models::{OutputLog, OutputStreamKind, ProcessLog, ProcessLogStatus, Task};
pub use store::{PendingOutputLog, Store, TaskDraft};
