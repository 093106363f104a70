//! Trigger types and run-date iterators for pscheduler.
//!
//! This crate provides:
//!
//! - **TriggerConfig**: the cron/interval/date trigger payload
//! - **RunDateIter**: the lazy, restartable run-date iterator

pub mod config;
pub mod error;
pub mod iter;

pub use config::{IntervalArgs, TriggerConfig, TriggerType};
pub use error::TriggerError;
pub use iter::RunDateIter;
