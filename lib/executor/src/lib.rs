//! Execution monitor and output log buffer.
//!
//! Together these own the lifetime of one scheduled run: spawning the
//! child process, multiplexing its output into durable records, and
//! flushing those records on a fixed cadence.

pub mod buffer;
pub mod error;
pub mod monitor;

pub use buffer::{spawn_periodic_flush, OutputLogBuffer};
pub use error::{MonitorError, SPAWN_FAILURE_SENTINEL};
pub use monitor::{ExecutionMonitor, StatusCallback};
