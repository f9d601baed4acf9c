use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::devices::storage::StorageCore;
use crate::devices::types::{Resource, ResourceKind, StorageCommand, StorageMode};
use crate::error::{GridError, Result};

/// Measurement overwrite for an electric vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleMeasurement {
    /// Measured stored energy (kWh, required).
    pub state_of_charge_kwh: f64,
    /// Replacement capacity (kWh), left unchanged when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_kwh: Option<f64>,
    /// Plug state, left unchanged when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connected: Option<bool>,
}

/// An electric vehicle acting as bidirectional storage while plugged in.
///
/// Unlike the battery there is no reserve floor (the floor is 0 kWh), and
/// any non-idle command is refused while the vehicle is disconnected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    /// Whether the vehicle is plugged in.
    pub connected: bool,

    #[serde(flatten)]
    pub storage: StorageCore,
}

impl Vehicle {
    const FLOOR_KWH: f64 = 0.0;

    /// Creates an idle vehicle.
    ///
    /// # Panics
    ///
    /// Panics if the parameters violate the storage invariants.
    pub fn new(
        capacity_kwh: f64,
        state_of_charge_kwh: f64,
        max_charge_rate_kw: f64,
        max_discharge_rate_kw: f64,
        connected: bool,
    ) -> Self {
        Self {
            connected,
            storage: StorageCore::new(
                capacity_kwh,
                state_of_charge_kwh,
                Self::FLOOR_KWH,
                max_charge_rate_kw,
                max_discharge_rate_kw,
            ),
        }
    }

    /// Energy available for discharge.
    pub fn available_kwh(&self) -> f64 {
        self.storage.available_kwh(Self::FLOOR_KWH)
    }

    /// Remaining charge room below capacity.
    pub fn headroom_kwh(&self) -> f64 {
        self.storage.headroom_kwh()
    }
}

impl Default for Vehicle {
    fn default() -> Self {
        Self::new(60.0, 30.0, 7.0, 7.0, true)
    }
}

impl Resource for Vehicle {
    type Update = VehicleMeasurement;
    type Control = StorageCommand;

    const KIND: ResourceKind = ResourceKind::Vehicle;
    const UPDATE_ROUTE: &'static str = "update";
    const CONTROL_ROUTE: Option<&'static str> = Some("control");

    fn apply_update(&mut self, update: VehicleMeasurement, now: DateTime<Utc>) -> Result<()> {
        self.storage.measure(
            update.state_of_charge_kwh,
            update.capacity_kwh,
            Self::FLOOR_KWH,
            now,
        )?;
        if let Some(connected) = update.connected {
            self.connected = connected;
        }
        Ok(())
    }

    fn apply_control(&mut self, control: StorageCommand, now: DateTime<Utc>) -> Result<()> {
        crate::error::ensure_non_negative("power_kw", control.power_kw)?;
        if !self.connected && control.mode != StorageMode::Idle {
            return Err(GridError::Precondition("vehicle not connected".into()));
        }
        self.storage
            .command(control, Self::FLOOR_KWH, now)
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_disconnected_vehicle_rejects_charge() {
        let mut ev = Vehicle::new(60.0, 30.0, 7.0, 7.0, false);
        let err = ev
            .apply_control(StorageCommand::charge(3.0), Utc::now())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Precondition);
        assert_eq!(ev.storage.state_of_charge_kwh, 30.0);
    }

    #[test]
    fn test_disconnected_vehicle_accepts_idle() {
        let mut ev = Vehicle::new(60.0, 30.0, 7.0, 7.0, false);
        ev.apply_control(StorageCommand::idle(), Utc::now()).unwrap();
        assert_eq!(ev.storage.mode, StorageMode::Idle);
    }

    #[test]
    fn test_discharge_can_empty_vehicle() {
        let mut ev = Vehicle::new(60.0, 2.0, 7.0, 7.0, true);
        ev.apply_control(StorageCommand::discharge(5.0), Utc::now())
            .unwrap();
        assert_eq!(ev.storage.power_kw, 2.0);
        assert_eq!(ev.storage.state_of_charge_kwh, 0.0);
    }

    #[test]
    fn test_measurement_updates_connection_only_when_given() {
        let mut ev = Vehicle::default();
        ev.apply_update(
            VehicleMeasurement {
                state_of_charge_kwh: 40.0,
                capacity_kwh: None,
                connected: None,
            },
            Utc::now(),
        )
        .unwrap();
        assert!(ev.connected);

        ev.apply_update(
            VehicleMeasurement {
                state_of_charge_kwh: 40.0,
                capacity_kwh: Some(75.0),
                connected: Some(false),
            },
            Utc::now(),
        )
        .unwrap();
        assert!(!ev.connected);
        assert_eq!(ev.storage.capacity_kwh, 75.0);
    }

    #[test]
    fn test_invalid_capacity_measurement_fails() {
        let mut ev = Vehicle::default();
        let err = ev
            .apply_update(
                VehicleMeasurement {
                    state_of_charge_kwh: 10.0,
                    capacity_kwh: Some(0.0),
                    connected: Some(false),
                },
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(ev.connected);
    }
}
