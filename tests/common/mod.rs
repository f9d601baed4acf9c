//! Shared test fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use microgrid_dispatch::agent::{AgentPort, HealthStatus};
use microgrid_dispatch::devices::{Battery, LoadProfile, Resource, Solar, Vehicle};
use microgrid_dispatch::dispatch::{AgentPorts, CoordinatorService, LocalAgents};
use microgrid_dispatch::error::{ErrorKind, GridError, Result};

pub const API_KEY: &str = "integration-secret";

/// Per-call timeout used by fixtures; short enough for stalled-port tests.
pub const CALL_TIMEOUT: Duration = Duration::from_millis(200);

/// Reference battery (10 kWh, 5 kWh stored, 1 kWh floor, 3 kW both ways).
pub fn reference_battery() -> Battery {
    Battery::new(10.0, 5.0, 1.0, 3.0, 3.0)
}

/// Plugged-in vehicle (60 kWh, 30 kWh stored, 7 kW both ways).
pub fn connected_vehicle() -> Vehicle {
    Vehicle::new(60.0, 30.0, 7.0, 7.0, true)
}

pub fn disconnected_vehicle() -> Vehicle {
    Vehicle::new(60.0, 30.0, 7.0, 7.0, false)
}

/// Reference household load (3 kW critical, 2 kW flexible).
pub fn reference_load() -> LoadProfile {
    LoadProfile::new(3.0, 2.0)
}

/// In-process agents with the given solar production and reference devices.
pub fn agents_with_solar(production_kw: f64) -> LocalAgents {
    LocalAgents::new(
        Solar::new(production_kw),
        reference_battery(),
        connected_vehicle(),
        reference_load(),
        API_KEY,
    )
}

pub fn coordinator_for(agents: &LocalAgents) -> CoordinatorService {
    CoordinatorService::new(agents.ports(API_KEY, CALL_TIMEOUT), API_KEY)
}

pub fn coordinator_over(ports: AgentPorts) -> CoordinatorService {
    CoordinatorService::new(ports, API_KEY)
}

/// Delegates to an inner port but fails every control call with a fixed error.
pub struct FailingControl<R: Resource> {
    inner: Arc<dyn AgentPort<R>>,
    kind: ErrorKind,
    message: String,
}

impl<R: Resource> FailingControl<R> {
    pub fn new(inner: Arc<dyn AgentPort<R>>, kind: ErrorKind, message: &str) -> Self {
        Self {
            inner,
            kind,
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl<R: Resource> AgentPort<R> for FailingControl<R> {
    async fn health(&self) -> Result<HealthStatus> {
        self.inner.health().await
    }

    async fn status(&self) -> Result<R> {
        self.inner.status().await
    }

    async fn update(&self, update: R::Update) -> Result<R> {
        self.inner.update(update).await
    }

    async fn control(&self, _control: R::Control) -> Result<R> {
        Err(GridError::from_kind(self.kind, self.message.clone()))
    }
}

/// Delegates to an inner port but never answers status reads.
pub struct StalledStatus<R: Resource> {
    inner: Arc<dyn AgentPort<R>>,
}

impl<R: Resource> StalledStatus<R> {
    pub fn new(inner: Arc<dyn AgentPort<R>>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<R: Resource> AgentPort<R> for StalledStatus<R> {
    async fn health(&self) -> Result<HealthStatus> {
        self.inner.health().await
    }

    async fn status(&self) -> Result<R> {
        std::future::pending::<()>().await;
        self.inner.status().await
    }

    async fn update(&self, update: R::Update) -> Result<R> {
        self.inner.update(update).await
    }

    async fn control(&self, control: R::Control) -> Result<R> {
        self.inner.control(control).await
    }
}

/// Delegates to an inner port and counts control calls.
pub struct CountingControl<R: Resource> {
    inner: Arc<dyn AgentPort<R>>,
    calls: Arc<AtomicUsize>,
}

impl<R: Resource> CountingControl<R> {
    /// Returns the port and a handle to its call counter.
    pub fn new(inner: Arc<dyn AgentPort<R>>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                inner,
                calls: Arc::clone(&calls),
            },
            calls,
        )
    }
}

#[async_trait]
impl<R: Resource> AgentPort<R> for CountingControl<R> {
    async fn health(&self) -> Result<HealthStatus> {
        self.inner.health().await
    }

    async fn status(&self) -> Result<R> {
        self.inner.status().await
    }

    async fn update(&self, update: R::Update) -> Result<R> {
        self.inner.update(update).await
    }

    async fn control(&self, control: R::Control) -> Result<R> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.control(control).await
    }
}
