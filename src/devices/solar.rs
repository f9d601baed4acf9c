use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::devices::types::{NoControl, Resource, ResourceKind};
use crate::error::{GridError, Result, ensure_non_negative};

/// Production reading pushed to the solar agent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionUpdate {
    pub production_kw: f64,
}

/// A solar array reporting its instantaneous production.
///
/// Solar is not dispatchable: it only accepts measurement overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solar {
    /// Current production in kilowatts (>= 0).
    pub production_kw: f64,
    /// Time of the last reading.
    pub last_updated: DateTime<Utc>,
}

impl Solar {
    /// Creates a solar source with the given production.
    ///
    /// # Panics
    ///
    /// Panics if `production_kw` is negative.
    pub fn new(production_kw: f64) -> Self {
        assert!(production_kw >= 0.0);
        Self {
            production_kw,
            last_updated: Utc::now(),
        }
    }
}

impl Default for Solar {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl Resource for Solar {
    type Update = ProductionUpdate;
    type Control = NoControl;

    const KIND: ResourceKind = ResourceKind::Solar;
    const UPDATE_ROUTE: &'static str = "production";
    const CONTROL_ROUTE: Option<&'static str> = None;

    fn apply_update(&mut self, update: ProductionUpdate, now: DateTime<Utc>) -> Result<()> {
        ensure_non_negative("production_kw", update.production_kw)?;
        self.production_kw = update.production_kw;
        self.last_updated = now;
        Ok(())
    }

    fn apply_control(&mut self, _control: NoControl, _now: DateTime<Utc>) -> Result<()> {
        Err(GridError::Validation(
            "solar agent has no control operation".into(),
        ))
    }
}
