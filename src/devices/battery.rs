use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::devices::storage::StorageCore;
use crate::devices::types::{Resource, ResourceKind, StorageCommand};
use crate::error::Result;

/// Measurement overwrite for a battery.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatteryMeasurement {
    /// Measured stored energy (kWh, required).
    pub state_of_charge_kwh: f64,
    /// Replacement capacity (kWh), left unchanged when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_kwh: Option<f64>,
}

/// A stationary battery with a reserve floor.
///
/// The battery is the first-priority sink and source in every dispatch
/// cycle. Its SOC never drops below `min_state_of_charge_kwh`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Battery {
    #[serde(flatten)]
    pub storage: StorageCore,

    /// Reserve floor in kWh that discharging never crosses.
    pub min_state_of_charge_kwh: f64,
}

impl Battery {
    /// Creates an idle battery.
    ///
    /// # Arguments
    ///
    /// * `capacity_kwh` - Usable capacity in kWh (must be > 0)
    /// * `state_of_charge_kwh` - Initial stored energy in kWh
    /// * `min_state_of_charge_kwh` - Reserve floor in kWh
    /// * `max_charge_rate_kw` - Maximum charging power in kW
    /// * `max_discharge_rate_kw` - Maximum discharging power in kW
    ///
    /// # Panics
    ///
    /// Panics if the parameters violate the storage invariants.
    pub fn new(
        capacity_kwh: f64,
        state_of_charge_kwh: f64,
        min_state_of_charge_kwh: f64,
        max_charge_rate_kw: f64,
        max_discharge_rate_kw: f64,
    ) -> Self {
        Self {
            storage: StorageCore::new(
                capacity_kwh,
                state_of_charge_kwh,
                min_state_of_charge_kwh,
                max_charge_rate_kw,
                max_discharge_rate_kw,
            ),
            min_state_of_charge_kwh,
        }
    }

    /// Energy available for discharge above the reserve floor.
    pub fn available_kwh(&self) -> f64 {
        self.storage.available_kwh(self.min_state_of_charge_kwh)
    }

    /// Remaining charge room below capacity.
    pub fn headroom_kwh(&self) -> f64 {
        self.storage.headroom_kwh()
    }
}

impl Default for Battery {
    fn default() -> Self {
        Self::new(10.0, 5.0, 1.0, 3.0, 3.0)
    }
}

impl Resource for Battery {
    type Update = BatteryMeasurement;
    type Control = StorageCommand;

    const KIND: ResourceKind = ResourceKind::Battery;
    const UPDATE_ROUTE: &'static str = "update";
    const CONTROL_ROUTE: Option<&'static str> = Some("control");

    fn apply_update(&mut self, update: BatteryMeasurement, now: DateTime<Utc>) -> Result<()> {
        self.storage.measure(
            update.state_of_charge_kwh,
            update.capacity_kwh,
            self.min_state_of_charge_kwh,
            now,
        )
    }

    fn apply_control(&mut self, control: StorageCommand, now: DateTime<Utc>) -> Result<()> {
        self.storage
            .command(control, self.min_state_of_charge_kwh, now)
            .map(|_| ())
    }
}
