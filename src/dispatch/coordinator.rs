//! Coordination cycle: push telemetry, aggregate, plan, execute.

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::executor::ActionExecutor;
use super::planner::DispatchPlan;
use super::ports::AgentPorts;
use super::snapshot::{SystemSnapshot, aggregate_status};
use super::telemetry::{TelemetryPayload, push_measurements};
use crate::agent::{HealthStatus, verify_api_key};
use crate::error::Result;

/// Everything a coordination cycle returns to its caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationReport {
    #[serde(flatten)]
    pub plan: DispatchPlan,
    /// System status after the last confirmed command.
    pub status: SystemSnapshot,
}

/// Central coordinator over the four agents.
///
/// Holds no device state of its own. Whole cycles are serialized so two
/// concurrent requests never interleave commands against the same device;
/// read-only status queries bypass that lock.
pub struct CoordinatorService {
    ports: AgentPorts,
    api_key: String,
    cycle_lock: Mutex<()>,
}

impl CoordinatorService {
    pub fn new(ports: AgentPorts, api_key: impl Into<String>) -> Self {
        Self {
            ports,
            api_key: api_key.into(),
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus::ok()
    }

    /// Checks the credential presented to the coordinator's own API.
    pub fn authenticate(&self, provided: Option<&str>) -> Result<()> {
        verify_api_key(&self.api_key, provided)
    }

    /// Aggregated status of all agents.
    pub async fn status(&self) -> Result<SystemSnapshot> {
        aggregate_status(&self.ports).await
    }

    /// Runs one coordination cycle.
    ///
    /// Telemetry push and status aggregation fail fast with no partial
    /// result. A failure while executing commands aborts the rest of the
    /// cycle without rolling back what was already applied.
    pub async fn coordinate(&self, telemetry: Option<TelemetryPayload>) -> Result<CoordinationReport> {
        let _cycle = self.cycle_lock.lock().await;

        if let Some(payload) = telemetry.filter(|p| !p.is_empty()) {
            push_measurements(&self.ports, &payload).await?;
        }

        let snapshot = aggregate_status(&self.ports).await?;
        let (plan, status) = ActionExecutor::new(&self.ports).run(snapshot).await?;

        info!(
            initial_net_power_kw = plan.initial_net_power_kw,
            net_power_kw = plan.net_power_kw,
            steps = plan.steps.len(),
            "coordination cycle complete"
        );
        if plan.curtailed_kw() > 0.0 {
            warn!(curtailed_kw = plan.curtailed_kw(), "surplus left without a sink");
        }
        if plan.unserved_kw() > 0.0 {
            warn!(unserved_kw = plan.unserved_kw(), "deficit left without a source");
        }

        Ok(CoordinationReport { plan, status })
    }
}
