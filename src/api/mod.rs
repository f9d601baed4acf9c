//! HTTP/JSON binding for agents and the coordinator.
//!
//! Agents expose:
//! - `GET /health`, `GET /status`
//! - `POST /<update route>` and, where the resource has one, `POST /<control route>`
//!
//! The coordinator exposes `GET /health`, `GET /status` and `POST /coordinate`.
//! Privileged routes expect the shared secret in the `X-API-Key` header.

mod client;
mod handlers;
mod types;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tracing::info;

use crate::agent::AgentService;
use crate::devices::Resource;
use crate::dispatch::CoordinatorService;

pub use client::{HttpAgent, http_ports};
pub use types::{API_KEY_HEADER, ApiError, ErrorResponse};

/// Builds the router for one resource agent.
///
/// Routes are taken from the resource's `UPDATE_ROUTE` and `CONTROL_ROUTE`.
///
/// # Arguments
///
/// * `agent` - Agent owning the resource state
///
/// # Returns
///
/// Configured `Router` ready to serve.
pub fn agent_router<R: Resource>(agent: Arc<AgentService<R>>) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::agent_health::<R>))
        .route("/status", get(handlers::agent_status::<R>))
        .route(
            &format!("/{}", R::UPDATE_ROUTE),
            post(handlers::agent_update::<R>),
        );
    if let Some(route) = R::CONTROL_ROUTE {
        router = router.route(&format!("/{route}"), post(handlers::agent_control::<R>));
    }
    router.with_state(agent)
}

/// Builds the coordinator router.
pub fn coordinator_router(coordinator: Arc<CoordinatorService>) -> Router {
    Router::new()
        .route("/health", get(handlers::coordinator_health))
        .route("/status", get(handlers::coordinator_status))
        .route("/coordinate", post(handlers::coordinate))
        .with_state(coordinator)
}

/// Binds to the given address and serves `app` until the process exits.
///
/// # Errors
///
/// Returns an I/O error if the listener cannot bind or the server fails.
pub async fn serve(app: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "API server listening");
    axum::serve(listener, app).await
}
