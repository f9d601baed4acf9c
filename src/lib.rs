//! Residential microgrid dispatch: resource agents and a central coordinator.

/// Single-owner agent runtime and the coordinator-facing port.
pub mod agent;
/// HTTP/JSON routers and client binding.
#[cfg(feature = "api")]
pub mod api;
pub mod config;
pub mod devices;
/// Status aggregation, telemetry push, planning, and execution.
pub mod dispatch;
pub mod error;

pub use error::{ErrorKind, GridError, Result};
