//! Remote agent port over HTTP/JSON.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{API_KEY_HEADER, ErrorResponse};
use crate::agent::{AgentPort, HealthStatus};
use crate::config::AgentsConfig;
use crate::devices::Resource;
use crate::dispatch::AgentPorts;
use crate::error::{GridError, Result};

/// [`AgentPort`] implementation that talks to an agent's HTTP API.
///
/// Transport failures and unreadable responses become
/// [`GridError::Unavailable`]; error bodies from the agent are rebuilt into
/// the variant the agent raised.
pub struct HttpAgent<R> {
    client: Client,
    base_url: String,
    api_key: String,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> HttpAgent<R> {
    /// Creates a client for the agent at `base_url` (e.g. `http://127.0.0.1:8002`).
    ///
    /// # Errors
    ///
    /// Returns [`GridError::Unavailable`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GridError::Unavailable(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            _resource: PhantomData,
        })
    }

    fn url(&self, route: &str) -> String {
        format!("{}/{route}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, route: &str) -> Result<T> {
        let agent = R::KIND;
        let response = request
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| GridError::Unavailable(format!("{agent} /{route}: {e}")))?;

        let status = response.status();
        debug!(%agent, route, %status, "agent responded");
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                GridError::Unavailable(format!("{agent} /{route}: unreadable response: {e}"))
            });
        }

        match response.json::<ErrorResponse>().await {
            Ok(body) => Err(GridError::from_kind(body.kind, body.error)),
            Err(_) => Err(GridError::Unavailable(format!(
                "{agent} /{route} returned HTTP {status}"
            ))),
        }
    }
}

#[async_trait]
impl<R: Resource> AgentPort<R> for HttpAgent<R> {
    async fn health(&self) -> Result<HealthStatus> {
        self.send(self.client.get(self.url("health")), "health").await
    }

    async fn status(&self) -> Result<R> {
        self.send(self.client.get(self.url("status")), "status").await
    }

    async fn update(&self, update: R::Update) -> Result<R> {
        let route = R::UPDATE_ROUTE;
        self.send(self.client.post(self.url(route)).json(&update), route)
            .await
    }

    async fn control(&self, control: R::Control) -> Result<R> {
        let Some(route) = R::CONTROL_ROUTE else {
            return Err(GridError::Validation(format!(
                "{} agent accepts no control requests",
                R::KIND
            )));
        };
        self.send(self.client.post(self.url(route)).json(&control), route)
            .await
    }
}

/// Builds HTTP ports to the four agents at the configured URLs.
///
/// # Errors
///
/// Fails only if an HTTP client cannot be constructed.
pub fn http_ports(agents: &AgentsConfig, api_key: &str, timeout: Duration) -> Result<AgentPorts> {
    Ok(AgentPorts {
        solar: Arc::new(HttpAgent::new(&agents.solar_url, api_key, timeout)?),
        battery: Arc::new(HttpAgent::new(&agents.battery_url, api_key, timeout)?),
        vehicle: Arc::new(HttpAgent::new(&agents.vehicle_url, api_key, timeout)?),
        load: Arc::new(HttpAgent::new(&agents.load_url, api_key, timeout)?),
        timeout,
    })
}
