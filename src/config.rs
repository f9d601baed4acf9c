//! TOML-based microgrid configuration with environment overrides.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::devices::{Battery, LoadProfile, Solar, Vehicle};

/// Top-level configuration parsed from TOML.
///
/// All fields have defaults matching the reference deployment. Load from
/// TOML with [`MicrogridConfig::from_toml_file`], then apply
/// [`MicrogridConfig::apply_env`] and check [`MicrogridConfig::validate`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MicrogridConfig {
    /// Shared-secret credential.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Coordinator API and outbound call settings.
    #[serde(default)]
    pub coordinator: CoordinatorConfig,
    /// Agent addresses (client URLs and server bind addresses).
    #[serde(default)]
    pub agents: AgentsConfig,
    /// Initial battery state.
    #[serde(default)]
    pub battery: BatteryConfig,
    /// Initial vehicle state.
    #[serde(default)]
    pub vehicle: VehicleConfig,
    /// Initial solar production.
    #[serde(default)]
    pub solar: SolarConfig,
    /// Initial load levels.
    #[serde(default)]
    pub load: LoadConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Value expected in the `X-API-Key` header (must be non-empty).
    pub api_key: String,
}

/// Coordinator settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Address the coordinator API binds to.
    pub bind_addr: String,
    /// Timeout for every agent call in milliseconds (must be > 0).
    pub request_timeout_ms: u64,
    /// Agent binding: `"local"` (in-process) or `"http"`.
    pub binding: String,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_string(),
            request_timeout_ms: 5000,
            binding: "local".to_string(),
        }
    }
}

impl CoordinatorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Where agents listen and where the coordinator reaches them.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentsConfig {
    pub solar_url: String,
    pub battery_url: String,
    pub vehicle_url: String,
    pub load_url: String,
    pub solar_bind: String,
    pub battery_bind: String,
    pub vehicle_bind: String,
    pub load_bind: String,
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            solar_url: "http://127.0.0.1:8001".to_string(),
            battery_url: "http://127.0.0.1:8002".to_string(),
            vehicle_url: "http://127.0.0.1:8003".to_string(),
            load_url: "http://127.0.0.1:8004".to_string(),
            solar_bind: "0.0.0.0:8001".to_string(),
            battery_bind: "0.0.0.0:8002".to_string(),
            vehicle_bind: "0.0.0.0:8003".to_string(),
            load_bind: "0.0.0.0:8004".to_string(),
        }
    }
}

/// Initial battery parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BatteryConfig {
    /// Capacity (kWh).
    pub capacity_kwh: f64,
    /// Initial stored energy (kWh).
    pub state_of_charge_kwh: f64,
    /// Reserve floor (kWh).
    pub min_state_of_charge_kwh: f64,
    /// Maximum charging power (kW).
    pub max_charge_rate_kw: f64,
    /// Maximum discharging power (kW).
    pub max_discharge_rate_kw: f64,
}

impl Default for BatteryConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 10.0,
            state_of_charge_kwh: 5.0,
            min_state_of_charge_kwh: 1.0,
            max_charge_rate_kw: 3.0,
            max_discharge_rate_kw: 3.0,
        }
    }
}

/// Initial vehicle parameters.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VehicleConfig {
    pub capacity_kwh: f64,
    pub state_of_charge_kwh: f64,
    pub max_charge_rate_kw: f64,
    pub max_discharge_rate_kw: f64,
    pub connected: bool,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            capacity_kwh: 60.0,
            state_of_charge_kwh: 30.0,
            max_charge_rate_kw: 7.0,
            max_discharge_rate_kw: 7.0,
            connected: true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SolarConfig {
    /// Initial production (kW).
    pub production_kw: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadConfig {
    pub critical_load_kw: f64,
    pub flexible_load_kw: f64,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            critical_load_kw: 3.0,
            flexible_load_kw: 2.0,
        }
    }
}

/// Configuration error with field path and constraint description.
#[derive(Debug)]
pub struct ConfigError {
    /// Dotted field path (e.g., `"battery.capacity_kwh"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "config error: {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

impl MicrogridConfig {
    /// Parses a configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "config".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })
    }

    /// Applies environment overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `HTTP_CLIENT_TIMEOUT` is not a positive number.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Applies overrides from an arbitrary variable lookup.
    ///
    /// Recognized names: `SERVICE_API_KEY`, `HTTP_CLIENT_TIMEOUT` (seconds),
    /// `SOLAR_AGENT_URL`, `BATTERY_AGENT_URL`, `VEHICLE_AGENT_URL`, `LOAD_AGENT_URL`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("SERVICE_API_KEY") {
            self.auth.api_key = key;
        }
        if let Some(raw) = lookup("HTTP_CLIENT_TIMEOUT") {
            let secs: f64 = raw.trim().parse().map_err(|_| ConfigError {
                field: "HTTP_CLIENT_TIMEOUT".to_string(),
                message: format!("\"{raw}\" is not a number of seconds"),
            })?;
            if !secs.is_finite() || secs <= 0.0 {
                return Err(ConfigError {
                    field: "HTTP_CLIENT_TIMEOUT".to_string(),
                    message: "must be > 0".to_string(),
                });
            }
            self.coordinator.request_timeout_ms = (secs * 1000.0).round() as u64;
        }
        let urls = [
            ("SOLAR_AGENT_URL", &mut self.agents.solar_url),
            ("BATTERY_AGENT_URL", &mut self.agents.battery_url),
            ("VEHICLE_AGENT_URL", &mut self.agents.vehicle_url),
            ("LOAD_AGENT_URL", &mut self.agents.load_url),
        ];
        for (name, slot) in urls {
            if let Some(url) = lookup(name) {
                *slot = url;
            }
        }
        Ok(())
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: &str| {
            errors.push(ConfigError {
                field: field.into(),
                message: message.into(),
            });
        };

        if self.auth.api_key.is_empty() {
            push("auth.api_key", "must be set (or provide SERVICE_API_KEY)");
        }

        let c = &self.coordinator;
        if c.request_timeout_ms == 0 {
            push("coordinator.request_timeout_ms", "must be > 0");
        }
        if c.binding != "local" && c.binding != "http" {
            push(
                "coordinator.binding",
                &format!("must be \"local\" or \"http\", got \"{}\"", c.binding),
            );
        }

        let b = &self.battery;
        if !is_positive(b.capacity_kwh) {
            push("battery.capacity_kwh", "must be > 0");
        }
        if !is_non_negative(b.min_state_of_charge_kwh) || b.min_state_of_charge_kwh > b.capacity_kwh {
            push("battery.min_state_of_charge_kwh", "must be in [0, capacity_kwh]");
        }
        if !(b.min_state_of_charge_kwh..=b.capacity_kwh).contains(&b.state_of_charge_kwh) {
            push(
                "battery.state_of_charge_kwh",
                "must be in [min_state_of_charge_kwh, capacity_kwh]",
            );
        }
        if !is_positive(b.max_charge_rate_kw) {
            push("battery.max_charge_rate_kw", "must be > 0");
        }
        if !is_positive(b.max_discharge_rate_kw) {
            push("battery.max_discharge_rate_kw", "must be > 0");
        }

        let v = &self.vehicle;
        if !is_positive(v.capacity_kwh) {
            push("vehicle.capacity_kwh", "must be > 0");
        }
        if !(0.0..=v.capacity_kwh).contains(&v.state_of_charge_kwh) {
            push("vehicle.state_of_charge_kwh", "must be in [0, capacity_kwh]");
        }
        if !is_positive(v.max_charge_rate_kw) {
            push("vehicle.max_charge_rate_kw", "must be > 0");
        }
        if !is_positive(v.max_discharge_rate_kw) {
            push("vehicle.max_discharge_rate_kw", "must be > 0");
        }

        if !is_non_negative(self.solar.production_kw) {
            push("solar.production_kw", "must be >= 0");
        }
        if !is_non_negative(self.load.critical_load_kw) {
            push("load.critical_load_kw", "must be >= 0");
        }
        if !is_non_negative(self.load.flexible_load_kw) {
            push("load.flexible_load_kw", "must be >= 0");
        }

        errors
    }

    /// Initial battery state. Call only on a validated configuration.
    pub fn initial_battery(&self) -> Battery {
        let b = &self.battery;
        Battery::new(
            b.capacity_kwh,
            b.state_of_charge_kwh,
            b.min_state_of_charge_kwh,
            b.max_charge_rate_kw,
            b.max_discharge_rate_kw,
        )
    }

    /// Initial vehicle state. Call only on a validated configuration.
    pub fn initial_vehicle(&self) -> Vehicle {
        let v = &self.vehicle;
        Vehicle::new(
            v.capacity_kwh,
            v.state_of_charge_kwh,
            v.max_charge_rate_kw,
            v.max_discharge_rate_kw,
            v.connected,
        )
    }

    pub fn initial_solar(&self) -> Solar {
        Solar::new(self.solar.production_kw)
    }

    pub fn initial_load(&self) -> LoadProfile {
        LoadProfile::new(self.load.critical_load_kw, self.load.flexible_load_kw)
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn is_non_negative(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}
