use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::devices::types::{StorageCommand, StorageMode};
use crate::error::{GridError, Result, ensure_non_negative, ensure_positive};

/// Shared state machine for energy storage (battery and vehicle).
///
/// Holds the stored energy and the rate limits, and enforces the clamping
/// rules common to both devices. The only difference between the two is the
/// SOC floor, which callers pass in.
///
/// One coordination cycle is treated as one hour, so applying `p` kW moves
/// the state of charge by `p` kWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageCore {
    /// Usable energy capacity in kilowatt-hours (> 0).
    pub capacity_kwh: f64,

    /// Stored energy in kilowatt-hours, always within `[floor, capacity]`.
    pub state_of_charge_kwh: f64,

    /// Maximum charging power in kilowatts (> 0).
    pub max_charge_rate_kw: f64,

    /// Maximum discharging power in kilowatts (> 0).
    pub max_discharge_rate_kw: f64,

    /// Current operating mode.
    pub mode: StorageMode,

    /// Power actually applied by the last command (0 when idle).
    pub power_kw: f64,

    /// Time of the last mutation.
    pub last_updated: DateTime<Utc>,
}

impl StorageCore {
    /// Creates an idle storage core.
    ///
    /// # Panics
    ///
    /// Panics if capacity or rates are not positive, or SOC is outside `[floor, capacity]`.
    pub fn new(
        capacity_kwh: f64,
        state_of_charge_kwh: f64,
        floor_kwh: f64,
        max_charge_rate_kw: f64,
        max_discharge_rate_kw: f64,
    ) -> Self {
        assert!(capacity_kwh > 0.0);
        assert!(floor_kwh >= 0.0 && floor_kwh <= capacity_kwh);
        assert!((floor_kwh..=capacity_kwh).contains(&state_of_charge_kwh));
        assert!(max_charge_rate_kw > 0.0 && max_discharge_rate_kw > 0.0);

        Self {
            capacity_kwh,
            state_of_charge_kwh,
            max_charge_rate_kw,
            max_discharge_rate_kw,
            mode: StorageMode::Idle,
            power_kw: 0.0,
            last_updated: Utc::now(),
        }
    }

    /// Remaining charge capacity before hitting the ceiling.
    pub fn headroom_kwh(&self) -> f64 {
        (self.capacity_kwh - self.state_of_charge_kwh).max(0.0)
    }

    /// Energy that can be drawn before hitting `floor_kwh`.
    pub fn available_kwh(&self, floor_kwh: f64) -> f64 {
        (self.state_of_charge_kwh - floor_kwh).max(0.0)
    }

    fn clamp_soc(&mut self, floor_kwh: f64) {
        self.state_of_charge_kwh = self
            .state_of_charge_kwh
            .min(self.capacity_kwh)
            .max(floor_kwh);
    }

    /// Overwrites the SOC (and optionally the capacity) from a measurement.
    ///
    /// Leaves `mode` and `power_kw` untouched.
    pub fn measure(
        &mut self,
        state_of_charge_kwh: f64,
        capacity_kwh: Option<f64>,
        floor_kwh: f64,
        now: DateTime<Utc>,
    ) -> Result<()> {
        ensure_non_negative("state_of_charge_kwh", state_of_charge_kwh)?;
        if let Some(capacity) = capacity_kwh {
            ensure_positive("capacity_kwh", capacity)?;
            if capacity < floor_kwh {
                return Err(GridError::Validation(format!(
                    "capacity_kwh {capacity} is below the reserve floor of {floor_kwh} kWh"
                )));
            }
            self.capacity_kwh = capacity;
        }
        self.state_of_charge_kwh = state_of_charge_kwh;
        self.clamp_soc(floor_kwh);
        self.last_updated = now;
        Ok(())
    }

    /// Applies a charge/discharge/idle command and returns the effective power.
    ///
    /// Effective power is `min(requested, rate limit, headroom)`; the caller
    /// must use it rather than the requested value.
    pub fn command(
        &mut self,
        command: StorageCommand,
        floor_kwh: f64,
        now: DateTime<Utc>,
    ) -> Result<f64> {
        ensure_non_negative("power_kw", command.power_kw)?;

        let effective_kw = match command.mode {
            StorageMode::Charging => {
                let effective = command
                    .power_kw
                    .min(self.max_charge_rate_kw)
                    .min(self.headroom_kwh());
                self.state_of_charge_kwh += effective;
                effective
            }
            StorageMode::Discharging => {
                let effective = command
                    .power_kw
                    .min(self.max_discharge_rate_kw)
                    .min(self.available_kwh(floor_kwh));
                self.state_of_charge_kwh -= effective;
                effective
            }
            StorageMode::Idle => 0.0,
        };

        self.mode = command.mode;
        self.power_kw = effective_kw;
        self.clamp_soc(floor_kwh);
        self.last_updated = now;
        Ok(effective_kw)
    }
}
