//! Single-owner agent runtime around one resource.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::devices::{Resource, ResourceKind};
use crate::error::{GridError, Result};

/// Body of every `Health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Compares a supplied credential against the expected shared secret.
pub fn verify_api_key(expected: &str, provided: Option<&str>) -> Result<()> {
    match provided {
        Some(key) if key == expected => Ok(()),
        _ => Err(GridError::Authentication("invalid API key".into())),
    }
}

/// Owns the authoritative state of one resource for the process lifetime.
///
/// The resource sits behind an async mutex, so commands are applied one at
/// a time and nothing outside the agent can mutate it directly. Callers
/// receive clones of the state, never references into it.
pub struct AgentService<R: Resource> {
    state: Mutex<R>,
    api_key: String,
}

impl<R: Resource> AgentService<R> {
    /// Creates an agent owning `initial` and guarded by `api_key`.
    pub fn new(initial: R, api_key: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(initial),
            api_key: api_key.into(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        R::KIND
    }

    /// Liveness probe; exempt from authentication.
    pub fn health(&self) -> HealthStatus {
        HealthStatus::ok()
    }

    /// Checks the shared-secret credential supplied with a request.
    pub fn authenticate(&self, provided: Option<&str>) -> Result<()> {
        verify_api_key(&self.api_key, provided).inspect_err(|_| {
            warn!(agent = %R::KIND, "rejected request with invalid API key");
        })
    }

    /// Returns a copy of the current state.
    pub async fn status(&self) -> R {
        self.state.lock().await.clone()
    }

    /// Applies a measurement overwrite and returns the new state.
    ///
    /// On error the state is left as it was.
    pub async fn update(&self, update: R::Update) -> Result<R> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.apply_update(update, Utc::now())?;
        *state = next;
        debug!(agent = %R::KIND, status = ?*state, "measurement applied");
        Ok(state.clone())
    }

    /// Applies a control request and returns the new state, including the
    /// power the device actually applied.
    pub async fn control(&self, control: R::Control) -> Result<R> {
        let mut state = self.state.lock().await;
        let mut next = state.clone();
        next.apply_control(control, Utc::now())?;
        *state = next;
        debug!(agent = %R::KIND, status = ?*state, "control applied");
        Ok(state.clone())
    }
}
