//! Request handlers for agent and coordinator endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;

use super::types::{API_KEY_HEADER, ApiError};
use crate::agent::{AgentService, HealthStatus};
use crate::devices::Resource;
use crate::dispatch::{CoordinationReport, CoordinatorService, SystemSnapshot, TelemetryPayload};
use crate::error::GridError;

fn api_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok())
}

/// `GET /health` → 200 `{"status": "ok"}`, no credential required.
pub async fn agent_health<R: Resource>(
    State(agent): State<Arc<AgentService<R>>>,
) -> Json<HealthStatus> {
    Json(agent.health())
}

/// `GET /status` → 200 + resource JSON.
pub async fn agent_status<R: Resource>(
    State(agent): State<Arc<AgentService<R>>>,
    headers: HeaderMap,
) -> Result<Json<R>, ApiError> {
    agent.authenticate(api_key(&headers))?;
    Ok(Json(agent.status().await))
}

/// `POST /<update route>` → 200 + updated resource JSON.
pub async fn agent_update<R: Resource>(
    State(agent): State<Arc<AgentService<R>>>,
    headers: HeaderMap,
    payload: Result<Json<R::Update>, JsonRejection>,
) -> Result<Json<R>, ApiError> {
    agent.authenticate(api_key(&headers))?;
    let Json(update) = payload?;
    Ok(Json(agent.update(update).await?))
}

/// `POST /<control route>` → 200 + resource JSON with the applied power.
pub async fn agent_control<R: Resource>(
    State(agent): State<Arc<AgentService<R>>>,
    headers: HeaderMap,
    payload: Result<Json<R::Control>, JsonRejection>,
) -> Result<Json<R>, ApiError> {
    agent.authenticate(api_key(&headers))?;
    let Json(control) = payload?;
    Ok(Json(agent.control(control).await?))
}

pub async fn coordinator_health(
    State(coordinator): State<Arc<CoordinatorService>>,
) -> Json<HealthStatus> {
    Json(coordinator.health())
}

/// `GET /status` → 200 + aggregated snapshot of all four agents.
pub async fn coordinator_status(
    State(coordinator): State<Arc<CoordinatorService>>,
    headers: HeaderMap,
) -> Result<Json<SystemSnapshot>, ApiError> {
    coordinator.authenticate(api_key(&headers))?;
    Ok(Json(coordinator.status().await?))
}

/// Runs one coordination cycle.
///
/// `POST /coordinate` with an empty body → cycle without telemetry
/// `POST /coordinate` with a telemetry JSON body → push, then cycle
pub async fn coordinate(
    State(coordinator): State<Arc<CoordinatorService>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CoordinationReport>, ApiError> {
    coordinator.authenticate(api_key(&headers))?;

    let telemetry = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let payload: TelemetryPayload = serde_json::from_slice(&body)
            .map_err(|e| GridError::Validation(format!("invalid telemetry: {e}")))?;
        Some(payload)
    };

    Ok(Json(coordinator.coordinate(telemetry).await?))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;

    use crate::api::{agent_router, coordinator_router};
    use crate::devices::{Battery, LoadProfile, Solar, Vehicle};
    use crate::dispatch::LocalAgents;

    use super::*;

    const KEY: &str = "test-key";

    fn post_json(uri: &str, key: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn get(uri: &str, key: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(key) = key {
            builder = builder.header(API_KEY_HEADER, key);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_needs_no_key() {
        let app = agent_router(Arc::new(AgentService::new(Solar::default(), KEY)));
        let resp = app.oneshot(get("/health", None)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["status"], "ok");
    }

    #[tokio::test]
    async fn status_without_key_is_401() {
        let app = agent_router(Arc::new(AgentService::new(Battery::default(), KEY)));
        let resp = app.oneshot(get("/status", Some("wrong"))).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_json(resp).await["kind"], "authentication");
    }

    #[tokio::test]
    async fn battery_control_is_clamped() {
        let app = agent_router(Arc::new(AgentService::new(Battery::default(), KEY)));
        let resp = app
            .oneshot(post_json(
                "/control",
                Some(KEY),
                r#"{"mode": "charge", "power_kw": 10.0}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["mode"], "charging");
        assert_eq!(json["power_kw"], 3.0);
    }

    #[tokio::test]
    async fn unknown_mode_is_400() {
        let app = agent_router(Arc::new(AgentService::new(Battery::default(), KEY)));
        let resp = app
            .oneshot(post_json(
                "/control",
                Some(KEY),
                r#"{"mode": "turbo", "power_kw": 1.0}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["kind"], "validation");
    }

    #[tokio::test]
    async fn disconnected_vehicle_is_409() {
        let vehicle = Vehicle::new(60.0, 30.0, 7.0, 7.0, false);
        let app = agent_router(Arc::new(AgentService::new(vehicle, KEY)));
        let resp = app
            .oneshot(post_json(
                "/control",
                Some(KEY),
                r#"{"mode": "discharging", "power_kw": 2.0}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["kind"], "precondition");
    }

    #[tokio::test]
    async fn oversized_shed_is_400() {
        let app = agent_router(Arc::new(AgentService::new(LoadProfile::new(3.0, 2.0), KEY)));
        let resp = app
            .oneshot(post_json("/shed", Some(KEY), r#"{"shed_kw": 2.5}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn solar_has_no_control_route() {
        let app = agent_router(Arc::new(AgentService::new(Solar::default(), KEY)));
        let resp = app
            .clone()
            .oneshot(post_json("/production", Some(KEY), r#"{"production_kw": 4.0}"#))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["production_kw"], 4.0);

        let resp = app
            .oneshot(post_json("/control", Some(KEY), "{}"))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    fn coordinator() -> Arc<CoordinatorService> {
        let agents = LocalAgents::new(
            Solar::default(),
            Battery::default(),
            Vehicle::default(),
            LoadProfile::default(),
            KEY,
        );
        Arc::new(CoordinatorService::new(
            agents.ports(KEY, Duration::from_secs(1)),
            KEY,
        ))
    }

    #[tokio::test]
    async fn coordinate_with_telemetry() {
        let app = coordinator_router(coordinator());
        let resp = app
            .oneshot(post_json(
                "/coordinate",
                Some(KEY),
                r#"{"solar": {"production_kw": 8.0}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["initial_net_power_kw"], 3.0);
        assert_eq!(json["actions"]["battery"]["mode"], "charging");
        assert_eq!(json["actions"]["battery"]["applied_power_kw"], 3.0);
        assert_eq!(json["status"]["battery"]["mode"], "charging");
    }

    #[tokio::test]
    async fn coordinate_with_empty_body() {
        let app = coordinator_router(coordinator());
        let req = Request::builder()
            .method("POST")
            .uri("/coordinate")
            .header(API_KEY_HEADER, KEY)
            .body(Body::empty())
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let json = body_json(resp).await;
        assert_eq!(json["initial_net_power_kw"], -5.0);
    }

    #[tokio::test]
    async fn coordinate_rejects_bad_telemetry() {
        let app = coordinator_router(coordinator());
        let resp = app
            .oneshot(post_json(
                "/coordinate",
                Some(KEY),
                r#"{"solar": {"production_kw": -1.0}}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
