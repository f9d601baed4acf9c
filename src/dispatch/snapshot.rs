//! System snapshot and the concurrent status aggregation that builds it.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::ports::AgentPorts;
use crate::devices::{Battery, LoadProfile, Resource, Solar, Vehicle};
use crate::error::Result;

/// The four device states, fetched independently and composed.
///
/// Not a transactional read: each element may come from a slightly
/// different instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub solar: Solar,
    pub battery: Battery,
    pub vehicle: Vehicle,
    pub load: LoadProfile,
}

impl SystemSnapshot {
    /// Production minus consumption (kW); positive is surplus.
    pub fn net_power_kw(&self) -> f64 {
        self.solar.production_kw - self.load.total_consumption_kw
    }
}

/// Reads all four agents concurrently.
///
/// Completes only when every read has succeeded; the first failure fails
/// the whole aggregation and the sibling results are discarded.
pub async fn aggregate_status(ports: &AgentPorts) -> Result<SystemSnapshot> {
    let (solar, battery, vehicle, load) = tokio::try_join!(
        ports.guarded(Solar::KIND, "status", ports.solar.status()),
        ports.guarded(Battery::KIND, "status", ports.battery.status()),
        ports.guarded(Vehicle::KIND, "status", ports.vehicle.status()),
        ports.guarded(LoadProfile::KIND, "status", ports.load.status()),
    )?;

    let snapshot = SystemSnapshot {
        solar,
        battery,
        vehicle,
        load,
    };
    debug!(net_power_kw = snapshot.net_power_kw(), "status aggregated");
    Ok(snapshot)
}
