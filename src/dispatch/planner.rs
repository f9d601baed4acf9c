//! Feedback-driven dispatch planning over a system snapshot.
//!
//! The planner is pure: it never talks to agents. For each step it proposes
//! at most one command, and it advances only when told what the device
//! actually applied. The executor drives it one step at a time.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::snapshot::SystemSnapshot;
use crate::devices::{Battery, LoadProfile, ShedRequest, StorageCommand, StorageMode, Vehicle};

/// Imbalances smaller than this are treated as zero.
pub const BALANCE_EPSILON_KW: f64 = 1e-9;

/// One position in the fixed dispatch priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchStep {
    ChargeBattery,
    ChargeVehicle,
    DischargeBattery,
    DischargeVehicle,
    ShedLoad,
}

impl fmt::Display for DispatchStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatchStep::ChargeBattery => "charge_battery",
            DispatchStep::ChargeVehicle => "charge_vehicle",
            DispatchStep::DischargeBattery => "discharge_battery",
            DispatchStep::DischargeVehicle => "discharge_vehicle",
            DispatchStep::ShedLoad => "shed_load",
        };
        f.write_str(name)
    }
}

/// Sinks for surplus, in priority order.
const SURPLUS_ORDER: &[DispatchStep] = &[DispatchStep::ChargeBattery, DispatchStep::ChargeVehicle];

/// Sources for deficit, in priority order; shedding is the last resort.
const DEFICIT_ORDER: &[DispatchStep] = &[
    DispatchStep::DischargeBattery,
    DispatchStep::DischargeVehicle,
    DispatchStep::ShedLoad,
];

/// A command the planner wants issued to one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlannedCommand {
    Battery(StorageCommand),
    Vehicle(StorageCommand),
    Load(ShedRequest),
}

/// What was asked of a storage device and what it actually did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageAction {
    pub mode: StorageMode,
    pub requested_power_kw: f64,
    pub applied_power_kw: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadAction {
    pub shed_target_kw: f64,
}

/// Final per-device outcome of a cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchActions {
    pub battery: StorageAction,
    pub vehicle: StorageAction,
    pub load: LoadAction,
}

/// One executed step: requested vs. applied power and the running net after it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub step: DispatchStep,
    pub requested_kw: f64,
    pub applied_kw: f64,
    /// Net power (production minus effective demand) after this step.
    pub net_power_kw: f64,
}

impl fmt::Display for StepRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<18} requested={:>7.3} kW  applied={:>7.3} kW  net={:>7.3} kW",
            self.step.to_string(),
            self.requested_kw,
            self.applied_kw,
            self.net_power_kw,
        )
    }
}

/// Result of one planning/execution pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchPlan {
    /// Net power before any command (kW; positive = surplus).
    pub initial_net_power_kw: f64,
    /// Residual net power after the last step.
    pub net_power_kw: f64,
    pub actions: DispatchActions,
    pub steps: Vec<StepRecord>,
}

impl DispatchPlan {
    /// Surplus left without a sink.
    pub fn curtailed_kw(&self) -> f64 {
        self.net_power_kw.max(0.0)
    }

    /// Deficit left without a source.
    pub fn unserved_kw(&self) -> f64 {
        (-self.net_power_kw).max(0.0)
    }

    pub fn is_balanced(&self) -> bool {
        self.net_power_kw.abs() < BALANCE_EPSILON_KW
    }
}

/// Running planner state for one coordination cycle.
///
/// Holds its own copy of the snapshot and replaces each device entry with
/// the status the device returned, so later steps see confirmed values.
#[derive(Debug, Clone)]
pub struct DispatchPlanner {
    snapshot: SystemSnapshot,
    net_kw: f64,
    plan: DispatchPlan,
}

impl DispatchPlanner {
    pub fn new(snapshot: SystemSnapshot) -> Self {
        let net_kw = snapshot.net_power_kw();
        let plan = DispatchPlan {
            initial_net_power_kw: net_kw,
            net_power_kw: net_kw,
            actions: DispatchActions {
                load: LoadAction {
                    shed_target_kw: snapshot.load.shed_kw,
                },
                ..DispatchActions::default()
            },
            steps: Vec::new(),
        };
        Self {
            snapshot,
            net_kw,
            plan,
        }
    }

    /// The ordered steps to walk for this cycle's initial imbalance.
    pub fn steps(&self) -> &'static [DispatchStep] {
        if self.net_kw > BALANCE_EPSILON_KW {
            SURPLUS_ORDER
        } else if self.net_kw < -BALANCE_EPSILON_KW {
            DEFICIT_ORDER
        } else {
            &[]
        }
    }

    /// Current running net power (kW).
    pub fn net_power_kw(&self) -> f64 {
        self.net_kw
    }

    pub fn snapshot(&self) -> &SystemSnapshot {
        &self.snapshot
    }

    fn surplus_kw(&self) -> f64 {
        if self.net_kw > BALANCE_EPSILON_KW {
            self.net_kw
        } else {
            0.0
        }
    }

    fn deficit_kw(&self) -> f64 {
        if self.net_kw < -BALANCE_EPSILON_KW {
            -self.net_kw
        } else {
            0.0
        }
    }

    /// Proposes the command for `step`, or `None` if the step has nothing to do.
    pub fn plan_step(&self, step: DispatchStep) -> Option<PlannedCommand> {
        let battery = &self.snapshot.battery;
        let vehicle = &self.snapshot.vehicle;
        let load = &self.snapshot.load;

        match step {
            DispatchStep::ChargeBattery => {
                let room = battery.headroom_kwh();
                let request = self
                    .surplus_kw()
                    .min(battery.storage.max_charge_rate_kw)
                    .min(room);
                (request > 0.0).then(|| PlannedCommand::Battery(StorageCommand::charge(request)))
            }
            DispatchStep::ChargeVehicle => {
                if !vehicle.connected {
                    return None;
                }
                let request = self
                    .surplus_kw()
                    .min(vehicle.storage.max_charge_rate_kw)
                    .min(vehicle.headroom_kwh());
                (request > 0.0).then(|| PlannedCommand::Vehicle(StorageCommand::charge(request)))
            }
            DispatchStep::DischargeBattery => {
                let request = self
                    .deficit_kw()
                    .min(battery.storage.max_discharge_rate_kw)
                    .min(battery.available_kwh());
                (request > 0.0)
                    .then(|| PlannedCommand::Battery(StorageCommand::discharge(request)))
            }
            DispatchStep::DischargeVehicle => {
                if !vehicle.connected {
                    return None;
                }
                let request = self
                    .deficit_kw()
                    .min(vehicle.storage.max_discharge_rate_kw)
                    .min(vehicle.available_kwh());
                (request > 0.0)
                    .then(|| PlannedCommand::Vehicle(StorageCommand::discharge(request)))
            }
            DispatchStep::ShedLoad => {
                let deficit = self.deficit_kw();
                // `shed + (flexible - shed)` can round past flexible; target it directly.
                let target = if deficit >= load.sheddable_kw() {
                    load.flexible_load_kw
                } else {
                    (load.shed_kw + deficit).min(load.flexible_load_kw)
                };
                // Skip no-op shed requests.
                (target != load.shed_kw)
                    .then_some(PlannedCommand::Load(ShedRequest { shed_kw: target }))
            }
        }
    }

    /// Moves the running net toward zero by a confirmed amount.
    fn absorb(&mut self, step: DispatchStep, applied_kw: f64) {
        self.net_kw = match step {
            DispatchStep::ChargeBattery | DispatchStep::ChargeVehicle => {
                (self.net_kw - applied_kw).max(0.0)
            }
            DispatchStep::DischargeBattery
            | DispatchStep::DischargeVehicle
            | DispatchStep::ShedLoad => (self.net_kw + applied_kw).min(0.0),
        };
        self.plan.net_power_kw = self.net_kw;
    }

    fn record(&mut self, step: DispatchStep, requested_kw: f64, applied_kw: f64) {
        self.absorb(step, applied_kw);
        self.plan.steps.push(StepRecord {
            step,
            requested_kw,
            applied_kw,
            net_power_kw: self.net_kw,
        });
    }

    /// Feeds back the battery status returned for `step`.
    pub fn confirm_battery(&mut self, step: DispatchStep, requested_kw: f64, status: Battery) {
        let applied = status.storage.power_kw;
        self.plan.actions.battery = StorageAction {
            mode: status.storage.mode,
            requested_power_kw: requested_kw,
            applied_power_kw: applied,
        };
        self.snapshot.battery = status;
        self.record(step, requested_kw, applied);
    }

    /// Feeds back the vehicle status returned for `step`.
    pub fn confirm_vehicle(&mut self, step: DispatchStep, requested_kw: f64, status: Vehicle) {
        let applied = status.storage.power_kw;
        self.plan.actions.vehicle = StorageAction {
            mode: status.storage.mode,
            requested_power_kw: requested_kw,
            applied_power_kw: applied,
        };
        self.snapshot.vehicle = status;
        self.record(step, requested_kw, applied);
    }

    /// Feeds back the load status returned for a shed request.
    ///
    /// The confirmed relief is the increase in `shed_kw` the agent reports.
    pub fn confirm_load(&mut self, step: DispatchStep, target_kw: f64, status: LoadProfile) {
        let relief = (status.shed_kw - self.snapshot.load.shed_kw).max(0.0);
        self.plan.actions.load = LoadAction {
            shed_target_kw: target_kw,
        };
        self.snapshot.load = status;
        self.record(step, target_kw, relief);
    }

    /// Consumes the planner, returning the plan and the updated snapshot.
    pub fn finish(self) -> (DispatchPlan, SystemSnapshot) {
        (self.plan, self.snapshot)
    }
}
