//! Device state machines owned by the resource agents.

/// Stationary battery with a reserve floor.
pub mod battery;
/// Critical/flexible household load with shedding.
pub mod load;
/// Solar production source.
pub mod solar;
/// Charge/discharge clamping shared by battery and vehicle.
pub mod storage;
pub mod types;
/// Electric vehicle storage.
pub mod vehicle;

pub use battery::{Battery, BatteryMeasurement};
pub use load::{LoadProfile, LoadUpdate, ShedRequest};
pub use solar::{ProductionUpdate, Solar};
pub use storage::StorageCore;
pub use types::{NoControl, Resource, ResourceKind, StorageCommand, StorageMode};
pub use vehicle::{Vehicle, VehicleMeasurement};
