//! Common types and the resource trait shared by every device agent.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Operating mode of a storage device.
///
/// Wire names are `idle`, `charging`, `discharging`; the shorter
/// `charge` / `discharge` spellings are accepted on input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    #[default]
    Idle,
    #[serde(alias = "charge")]
    Charging,
    #[serde(alias = "discharge")]
    Discharging,
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StorageMode::Idle => "idle",
            StorageMode::Charging => "charging",
            StorageMode::Discharging => "discharging",
        };
        f.write_str(name)
    }
}

/// Control command for a battery or vehicle.
///
/// `power_kw` is a request; the device answers with the power it actually
/// applied after clamping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StorageCommand {
    pub mode: StorageMode,
    pub power_kw: f64,
}

impl StorageCommand {
    pub fn charge(power_kw: f64) -> Self {
        Self {
            mode: StorageMode::Charging,
            power_kw,
        }
    }

    pub fn discharge(power_kw: f64) -> Self {
        Self {
            mode: StorageMode::Discharging,
            power_kw,
        }
    }

    pub fn idle() -> Self {
        Self {
            mode: StorageMode::Idle,
            power_kw: 0.0,
        }
    }
}

/// Identifies which agent a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Solar,
    Battery,
    Vehicle,
    Load,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::Solar => "solar",
            ResourceKind::Battery => "battery",
            ResourceKind::Vehicle => "vehicle",
            ResourceKind::Load => "load",
        };
        f.write_str(name)
    }
}

/// Placeholder control type for resources without a control operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoControl;

/// Trait implemented by every physical resource owned by an agent.
///
/// The resource value doubles as its own status report: agents hand out
/// clones of it, never references into their owned state. All validation
/// and clamping lives here so every binding shares one implementation.
pub trait Resource:
    Clone + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Measurement overwrite accepted by the agent.
    type Update: fmt::Debug + Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    /// Control request accepted by the agent.
    type Control: fmt::Debug + Clone + Send + Sync + Serialize + DeserializeOwned + 'static;

    const KIND: ResourceKind;

    /// HTTP route of the update operation (without leading slash).
    const UPDATE_ROUTE: &'static str;

    /// HTTP route of the control operation, if the resource has one.
    const CONTROL_ROUTE: Option<&'static str>;

    /// Overwrites readings from an external measurement.
    fn apply_update(&mut self, update: Self::Update, now: DateTime<Utc>) -> Result<()>;

    /// Applies a control request, clamping it to the device's physical limits.
    fn apply_control(&mut self, control: Self::Control, now: DateTime<Utc>) -> Result<()>;
}
