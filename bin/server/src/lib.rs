//! pscheduler HTTP control plane.
//!
//! Wires the persistent store, the execution manager, and the output log
//! buffer behind an axum router.

pub mod config;
pub mod error;
pub mod routes;

pub use config::ServerConfig;
pub use routes::{router, AppState};
