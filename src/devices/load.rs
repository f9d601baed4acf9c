use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::devices::types::{Resource, ResourceKind};
use crate::error::{GridError, Result, ensure_non_negative};

/// Load levels pushed to the load agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadUpdate {
    pub critical_load_kw: f64,
    pub flexible_load_kw: f64,
}

/// Shedding request: the absolute amount of flexible load to leave unserved.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShedRequest {
    pub shed_kw: f64,
}

/// Household demand split into critical and sheddable parts.
///
/// # Examples
///
/// ```
/// use microgrid_dispatch::devices::LoadProfile;
///
/// let load = LoadProfile::new(3.0, 2.0);
/// assert_eq!(load.total_nominal_load_kw, 5.0);
/// assert_eq!(load.total_consumption_kw, 5.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadProfile {
    /// Demand that is never shed (kW).
    pub critical_load_kw: f64,
    /// Demand eligible for shedding (kW).
    pub flexible_load_kw: f64,
    /// Flexible demand currently not served, within `[0, flexible_load_kw]`.
    pub shed_kw: f64,
    /// `critical + flexible`.
    pub total_nominal_load_kw: f64,
    /// `critical + max(flexible - shed, 0)`.
    pub total_consumption_kw: f64,
    /// Time of the last mutation.
    pub last_updated: DateTime<Utc>,
}

impl LoadProfile {
    /// Creates a load profile with nothing shed.
    ///
    /// # Panics
    ///
    /// Panics if either load is negative.
    pub fn new(critical_load_kw: f64, flexible_load_kw: f64) -> Self {
        assert!(critical_load_kw >= 0.0 && flexible_load_kw >= 0.0);
        let mut load = Self {
            critical_load_kw,
            flexible_load_kw,
            shed_kw: 0.0,
            total_nominal_load_kw: 0.0,
            total_consumption_kw: 0.0,
            last_updated: Utc::now(),
        };
        load.recompute_totals();
        load
    }

    /// Flexible load that could still be shed.
    pub fn sheddable_kw(&self) -> f64 {
        (self.flexible_load_kw - self.shed_kw).max(0.0)
    }

    fn recompute_totals(&mut self) {
        self.shed_kw = self.shed_kw.clamp(0.0, self.flexible_load_kw);
        self.total_nominal_load_kw = self.critical_load_kw + self.flexible_load_kw;
        self.total_consumption_kw =
            self.critical_load_kw + (self.flexible_load_kw - self.shed_kw).max(0.0);
    }
}

impl Default for LoadProfile {
    fn default() -> Self {
        Self::new(3.0, 2.0)
    }
}

impl Resource for LoadProfile {
    type Update = LoadUpdate;
    type Control = ShedRequest;

    const KIND: ResourceKind = ResourceKind::Load;
    const UPDATE_ROUTE: &'static str = "update";
    const CONTROL_ROUTE: Option<&'static str> = Some("shed");

    fn apply_update(&mut self, update: LoadUpdate, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative("critical_load_kw", update.critical_load_kw)?;
        ensure_non_negative("flexible_load_kw", update.flexible_load_kw)?;
        self.critical_load_kw = update.critical_load_kw;
        self.flexible_load_kw = update.flexible_load_kw;
        self.recompute_totals();
        self.last_updated = now;
        Ok(())
    }

    fn apply_control(&mut self, request: ShedRequest, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative("shed_kw", request.shed_kw)?;
        if request.shed_kw > self.flexible_load_kw {
            return Err(GridError::Validation(format!(
                "cannot shed {} kW; only {} kW flexible load available",
                request.shed_kw, self.flexible_load_kw
            )));
        }
        self.shed_kw = request.shed_kw;
        self.recompute_totals();
        self.last_updated = now;
        Ok(())
    }
}
