//! Error taxonomy shared by agents, the coordinator, and both bindings.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dispatch::planner::DispatchStep;

/// Result alias for microgrid operations.
pub type Result<T> = std::result::Result<T, GridError>;

/// Coarse error category, stable across bindings.
///
/// This is what travels over the wire next to the message, so a remote
/// failure can be rebuilt into the same [`GridError`] variant on the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Authentication,
    Validation,
    Precondition,
    Unavailable,
}

/// Errors raised by device state machines, agents, and the coordinator.
#[derive(Debug, Error)]
pub enum GridError {
    /// Missing or wrong shared-secret credential.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Negative or non-finite values, unknown modes, missing fields, oversized shed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Command rejected because of device state (e.g. vehicle not connected).
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// Agent unreachable, timed out, or returned an unreadable response.
    #[error("agent unavailable: {0}")]
    Unavailable(String),

    /// A planning step failed; earlier steps of the cycle stay applied.
    #[error("dispatch step `{step}` failed: {source}")]
    Dispatch {
        step: DispatchStep,
        #[source]
        source: Box<GridError>,
    },
}

impl GridError {
    /// Wraps `self` as the failure of a dispatch step.
    pub fn at_step(self, step: DispatchStep) -> Self {
        GridError::Dispatch {
            step,
            source: Box::new(self),
        }
    }

    /// Returns the category of the root cause.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GridError::Authentication(_) => ErrorKind::Authentication,
            GridError::Validation(_) => ErrorKind::Validation,
            GridError::Precondition(_) => ErrorKind::Precondition,
            GridError::Unavailable(_) => ErrorKind::Unavailable,
            GridError::Dispatch { source, .. } => source.kind(),
        }
    }

    /// Returns the message without the category prefix.
    pub fn detail(&self) -> String {
        match self {
            GridError::Authentication(m)
            | GridError::Validation(m)
            | GridError::Precondition(m)
            | GridError::Unavailable(m) => m.clone(),
            GridError::Dispatch { step, source } => {
                format!("step `{step}`: {}", source.detail())
            }
        }
    }

    /// Rebuilds an error from its wire representation.
    pub fn from_kind(kind: ErrorKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        match kind {
            ErrorKind::Authentication => GridError::Authentication(detail),
            ErrorKind::Validation => GridError::Validation(detail),
            ErrorKind::Precondition => GridError::Precondition(detail),
            ErrorKind::Unavailable => GridError::Unavailable(detail),
        }
    }
}

/// Fails with a validation error unless `value` is finite and `>= 0`.
pub fn ensure_non_negative(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(GridError::Validation(format!(
            "{field} must be a non-negative number, got {value}"
        )));
    }
    Ok(())
}

/// Fails with a validation error unless `value` is finite and `> 0`.
pub fn ensure_positive(field: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(GridError::Validation(format!(
            "{field} must be greater than zero, got {value}"
        )));
    }
    Ok(())
}
