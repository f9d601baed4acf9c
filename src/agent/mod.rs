//! Resource agents: owned device state plus the ports used to reach them.

pub mod port;
pub mod service;

pub use port::{AgentPort, LocalAgent};
pub use service::{AgentService, HealthStatus, verify_api_key};
