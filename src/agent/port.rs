//! Coordinator-facing port to an agent, and the in-process binding.

use std::sync::Arc;

use async_trait::async_trait;

use super::service::{AgentService, HealthStatus};
use crate::devices::Resource;
use crate::error::Result;

/// Operations the coordinator can invoke on an agent.
///
/// Every binding (in-process or remote) implements this with identical
/// semantics: the agent authenticates, validates, and clamps; the binding
/// only moves requests and responses.
#[async_trait]
pub trait AgentPort<R: Resource>: Send + Sync {
    async fn health(&self) -> Result<HealthStatus>;

    async fn status(&self) -> Result<R>;

    async fn update(&self, update: R::Update) -> Result<R>;

    async fn control(&self, control: R::Control) -> Result<R>;
}

/// Typed in-process binding that calls straight into an [`AgentService`].
///
/// The credential is still checked on every privileged call, so a
/// misconfigured key fails the same way it would over the network.
pub struct LocalAgent<R: Resource> {
    service: Arc<AgentService<R>>,
    api_key: String,
}

impl<R: Resource> LocalAgent<R> {
    pub fn new(service: Arc<AgentService<R>>, api_key: impl Into<String>) -> Self {
        Self {
            service,
            api_key: api_key.into(),
        }
    }

    /// Shared handle to the underlying agent.
    pub fn service(&self) -> &Arc<AgentService<R>> {
        &self.service
    }
}

#[async_trait]
impl<R: Resource> AgentPort<R> for LocalAgent<R> {
    async fn health(&self) -> Result<HealthStatus> {
        Ok(self.service.health())
    }

    async fn status(&self) -> Result<R> {
        self.service.authenticate(Some(&self.api_key))?;
        Ok(self.service.status().await)
    }

    async fn update(&self, update: R::Update) -> Result<R> {
        self.service.authenticate(Some(&self.api_key))?;
        self.service.update(update).await
    }

    async fn control(&self, control: R::Control) -> Result<R> {
        self.service.authenticate(Some(&self.api_key))?;
        self.service.control(control).await
    }
}
