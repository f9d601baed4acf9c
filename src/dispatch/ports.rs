//! The set of agent ports a coordinator talks to, with bounded call times.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::agent::{AgentPort, AgentService, LocalAgent};
use crate::devices::{Battery, LoadProfile, ResourceKind, Solar, Vehicle};
use crate::error::{GridError, Result};

/// Default per-call timeout, matching the agents' HTTP client default.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Ports to the four agents of the microgrid.
///
/// Each port may use a different binding; the coordinator never knows.
#[derive(Clone)]
pub struct AgentPorts {
    pub solar: Arc<dyn AgentPort<Solar>>,
    pub battery: Arc<dyn AgentPort<Battery>>,
    pub vehicle: Arc<dyn AgentPort<Vehicle>>,
    pub load: Arc<dyn AgentPort<LoadProfile>>,
    /// Upper bound applied to every single call.
    pub timeout: Duration,
}

/// Agents hosted in the current process.
#[derive(Clone)]
pub struct LocalAgents {
    pub solar: Arc<AgentService<Solar>>,
    pub battery: Arc<AgentService<Battery>>,
    pub vehicle: Arc<AgentService<Vehicle>>,
    pub load: Arc<AgentService<LoadProfile>>,
}

impl LocalAgents {
    /// Starts the four agents with the given initial state and credential.
    pub fn new(
        solar: Solar,
        battery: Battery,
        vehicle: Vehicle,
        load: LoadProfile,
        api_key: &str,
    ) -> Self {
        Self {
            solar: Arc::new(AgentService::new(solar, api_key)),
            battery: Arc::new(AgentService::new(battery, api_key)),
            vehicle: Arc::new(AgentService::new(vehicle, api_key)),
            load: Arc::new(AgentService::new(load, api_key)),
        }
    }

    /// Builds in-process ports to these agents, presenting `api_key`.
    pub fn ports(&self, api_key: &str, timeout: Duration) -> AgentPorts {
        AgentPorts {
            solar: Arc::new(LocalAgent::new(Arc::clone(&self.solar), api_key)),
            battery: Arc::new(LocalAgent::new(Arc::clone(&self.battery), api_key)),
            vehicle: Arc::new(LocalAgent::new(Arc::clone(&self.vehicle), api_key)),
            load: Arc::new(LocalAgent::new(Arc::clone(&self.load), api_key)),
            timeout,
        }
    }
}

impl AgentPorts {
    /// Runs one agent call under the per-call timeout.
    ///
    /// An elapsed timeout is reported as [`GridError::Unavailable`]; there is
    /// no retry.
    pub async fn guarded<T, F>(&self, agent: ResourceKind, operation: &str, call: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result.inspect_err(|e| {
                warn!(%agent, operation, error = %e, "agent call failed");
            }),
            Err(_) => {
                warn!(%agent, operation, timeout_ms = self.timeout.as_millis() as u64, "agent call timed out");
                Err(GridError::Unavailable(format!(
                    "{agent} {operation} timed out after {} ms",
                    self.timeout.as_millis()
                )))
            }
        }
    }
}
