//! Incoming telemetry and the fail-fast measurement push.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ports::AgentPorts;
use crate::devices::{
    Battery, BatteryMeasurement, LoadProfile, LoadUpdate, ProductionUpdate, Resource, Solar,
    Vehicle, VehicleMeasurement,
};
use crate::error::{Result, ensure_non_negative, ensure_positive};

/// External readings supplied with a coordination request.
///
/// Every section is optional and independent of the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solar: Option<ProductionUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load: Option<LoadUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery: Option<BatteryMeasurement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vehicle: Option<VehicleMeasurement>,
}

impl TelemetryPayload {
    pub fn is_empty(&self) -> bool {
        self.solar.is_none() && self.load.is_none() && self.battery.is_none() && self.vehicle.is_none()
    }

    /// Local sanity checks run before any agent is contacted.
    pub fn validate(&self) -> Result<()> {
        if let Some(solar) = &self.solar {
            ensure_non_negative("solar.production_kw", solar.production_kw)?;
        }
        if let Some(load) = &self.load {
            ensure_non_negative("load.critical_load_kw", load.critical_load_kw)?;
            ensure_non_negative("load.flexible_load_kw", load.flexible_load_kw)?;
        }
        if let Some(battery) = &self.battery {
            ensure_non_negative("battery.state_of_charge_kwh", battery.state_of_charge_kwh)?;
            if let Some(capacity) = battery.capacity_kwh {
                ensure_positive("battery.capacity_kwh", capacity)?;
            }
        }
        if let Some(vehicle) = &self.vehicle {
            ensure_non_negative("vehicle.state_of_charge_kwh", vehicle.state_of_charge_kwh)?;
            if let Some(capacity) = vehicle.capacity_kwh {
                ensure_positive("vehicle.capacity_kwh", capacity)?;
            }
        }
        Ok(())
    }
}

/// Forwards the present telemetry items to their agents concurrently.
///
/// Validation covers the whole payload before any call goes out. Any failed
/// call fails the push; updates that already landed on other agents stay.
pub async fn push_measurements(ports: &AgentPorts, payload: &TelemetryPayload) -> Result<()> {
    payload.validate()?;

    let solar = async {
        match payload.solar {
            Some(update) => ports
                .guarded(Solar::KIND, "update", ports.solar.update(update))
                .await
                .map(|_| ()),
            None => Ok(()),
        }
    };
    let load = async {
        match payload.load {
            Some(update) => ports
                .guarded(LoadProfile::KIND, "update", ports.load.update(update))
                .await
                .map(|_| ()),
            None => Ok(()),
        }
    };
    let battery = async {
        match payload.battery {
            Some(update) => ports
                .guarded(Battery::KIND, "update", ports.battery.update(update))
                .await
                .map(|_| ()),
            None => Ok(()),
        }
    };
    let vehicle = async {
        match payload.vehicle {
            Some(update) => ports
                .guarded(Vehicle::KIND, "update", ports.vehicle.update(update))
                .await
                .map(|_| ()),
            None => Ok(()),
        }
    };

    tokio::try_join!(solar, load, battery, vehicle)?;
    debug!(?payload, "telemetry pushed");
    Ok(())
}
