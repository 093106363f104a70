//! Core domain types and utilities for the pscheduler workspace.
//!
//! This crate provides the foundational ID types, error handling, and shared
//! utilities used throughout the scheduler, store, executor, and manager crates.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{OutputLogId, ParseIdError, ProcessLogId, TaskId};
