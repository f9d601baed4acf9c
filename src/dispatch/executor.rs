//! Sequential execution of planned commands with confirmed feedback.

use tracing::{debug, info};

use super::planner::{DispatchPlan, DispatchPlanner, PlannedCommand};
use super::ports::AgentPorts;
use super::snapshot::SystemSnapshot;
use crate::devices::{Battery, LoadProfile, Resource, Vehicle};
use crate::error::Result;

/// Issues planned commands one at a time, in priority order.
///
/// Each command is awaited before the next is planned, because the next
/// request depends on the power the previous device actually applied.
/// On the first failure the cycle stops; commands already applied remain
/// applied and the error names the failing step.
pub struct ActionExecutor<'a> {
    ports: &'a AgentPorts,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(ports: &'a AgentPorts) -> Self {
        Self { ports }
    }

    /// Runs the full dispatch sequence for `snapshot`.
    ///
    /// # Returns
    ///
    /// The executed plan and the snapshot updated with every confirmed status.
    pub async fn run(&self, snapshot: SystemSnapshot) -> Result<(DispatchPlan, SystemSnapshot)> {
        let ports = self.ports;
        let mut planner = DispatchPlanner::new(snapshot);
        info!(net_power_kw = planner.net_power_kw(), "dispatch started");

        for &step in planner.steps() {
            let Some(command) = planner.plan_step(step) else {
                debug!(%step, "step skipped");
                continue;
            };
            debug!(%step, ?command, "issuing command");

            match command {
                PlannedCommand::Battery(cmd) => {
                    let status = ports
                        .guarded(Battery::KIND, "control", ports.battery.control(cmd))
                        .await
                        .map_err(|e| e.at_step(step))?;
                    planner.confirm_battery(step, cmd.power_kw, status);
                }
                PlannedCommand::Vehicle(cmd) => {
                    let status = ports
                        .guarded(Vehicle::KIND, "control", ports.vehicle.control(cmd))
                        .await
                        .map_err(|e| e.at_step(step))?;
                    planner.confirm_vehicle(step, cmd.power_kw, status);
                }
                PlannedCommand::Load(request) => {
                    let status = ports
                        .guarded(LoadProfile::KIND, "shed", ports.load.control(request))
                        .await
                        .map_err(|e| e.at_step(step))?;
                    planner.confirm_load(step, request.shed_kw, status);
                }
            }
            debug!(%step, net_power_kw = planner.net_power_kw(), "command confirmed");
        }

        Ok(planner.finish())
    }
}
