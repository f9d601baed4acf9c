//! Integration tests for the HTTP binding.

#![cfg(feature = "api")]

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use common::{
    API_KEY, CALL_TIMEOUT, connected_vehicle, disconnected_vehicle, reference_battery,
    reference_load,
};
use microgrid_dispatch::agent::{AgentPort, AgentService};
use microgrid_dispatch::api::{
    API_KEY_HEADER, HttpAgent, agent_router, coordinator_router, http_ports,
};
use microgrid_dispatch::config::AgentsConfig;
use microgrid_dispatch::devices::{
    Battery, LoadProfile, ProductionUpdate, ShedRequest, Solar, StorageCommand, StorageMode, Vehicle,
};
use microgrid_dispatch::dispatch::{CoordinatorService, DispatchStep};
use microgrid_dispatch::error::ErrorKind;

/// Serves `app` on an ephemeral local port and returns its base URL.
async fn spawn_server(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn http_cycle_matches_in_process_cycle() {
    let solar = Arc::new(AgentService::new(Solar::new(8.0), API_KEY));
    let battery = Arc::new(AgentService::new(reference_battery(), API_KEY));
    let vehicle = Arc::new(AgentService::new(connected_vehicle(), API_KEY));
    let load = Arc::new(AgentService::new(reference_load(), API_KEY));

    let urls = AgentsConfig {
        solar_url: spawn_server(agent_router(Arc::clone(&solar))).await,
        battery_url: spawn_server(agent_router(Arc::clone(&battery))).await,
        vehicle_url: spawn_server(agent_router(Arc::clone(&vehicle))).await,
        load_url: spawn_server(agent_router(Arc::clone(&load))).await,
        ..AgentsConfig::default()
    };

    let ports = http_ports(&urls, API_KEY, Duration::from_secs(2)).unwrap();
    let coordinator = CoordinatorService::new(ports, API_KEY);
    let report = coordinator.coordinate(None).await.unwrap();

    assert_eq!(report.plan.initial_net_power_kw, 3.0);
    assert!(report.plan.is_balanced());
    assert_eq!(report.plan.steps[0].step, DispatchStep::ChargeBattery);
    assert_eq!(report.status.battery, battery.status().await);
    assert_eq!(battery.status().await.storage.state_of_charge_kwh, 8.0);
}

#[tokio::test]
async fn http_agent_rebuilds_remote_errors() {
    let vehicle = Arc::new(AgentService::new(disconnected_vehicle(), API_KEY));
    let url = spawn_server(agent_router(vehicle)).await;

    let client: HttpAgent<Vehicle> = HttpAgent::new(&url, API_KEY, CALL_TIMEOUT).unwrap();
    let err = client
        .control(StorageCommand::discharge(2.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);

    let err = client
        .control(StorageCommand::charge(-1.0))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let intruder: HttpAgent<Vehicle> = HttpAgent::new(&url, "wrong", CALL_TIMEOUT).unwrap();
    assert_eq!(
        intruder.status().await.unwrap_err().kind(),
        ErrorKind::Authentication
    );
    assert_eq!(intruder.health().await.unwrap().status, "ok");
}

#[tokio::test]
async fn http_agent_round_trips_updates_and_shed() {
    let solar = Arc::new(AgentService::new(Solar::default(), API_KEY));
    let load = Arc::new(AgentService::new(reference_load(), API_KEY));
    let solar_client: HttpAgent<Solar> =
        HttpAgent::new(&spawn_server(agent_router(solar)).await, API_KEY, CALL_TIMEOUT).unwrap();
    let load_client: HttpAgent<LoadProfile> =
        HttpAgent::new(&spawn_server(agent_router(load)).await, API_KEY, CALL_TIMEOUT).unwrap();

    let status = solar_client
        .update(ProductionUpdate { production_kw: 2.5 })
        .await
        .unwrap();
    assert_eq!(status.production_kw, 2.5);

    let status = load_client.control(ShedRequest { shed_kw: 1.5 }).await.unwrap();
    assert_eq!(status.shed_kw, 1.5);
    assert_eq!(status.total_consumption_kw, 3.5);
}

#[tokio::test]
async fn unreachable_agent_is_unavailable() {
    // Bind and drop to get a port nobody listens on.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client: HttpAgent<Battery> =
        HttpAgent::new(&format!("http://{addr}"), API_KEY, CALL_TIMEOUT).unwrap();
    assert_eq!(
        client.status().await.unwrap_err().kind(),
        ErrorKind::Unavailable
    );
}

#[tokio::test]
async fn coordinator_route_requires_key() {
    let agents = common::agents_with_solar(4.0);
    let app = coordinator_router(Arc::new(common::coordinator_for(&agents)));

    let req = Request::builder()
        .method("POST")
        .uri("/coordinate")
        .body(Body::empty())
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/status")
        .header(API_KEY_HEADER, API_KEY)
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["solar"]["production_kw"], 4.0);
    assert_eq!(json["load"]["total_consumption_kw"], 5.0);
    assert_eq!(json["battery"]["mode"], "idle");
}

#[tokio::test]
async fn coordinator_forwards_step_failure_kind() {
    let agents = common::agents_with_solar(12.0);
    let mut ports = agents.ports(API_KEY, CALL_TIMEOUT);
    ports.vehicle = Arc::new(common::FailingControl::new(
        ports.vehicle.clone(),
        ErrorKind::Precondition,
        "vehicle not connected",
    ));
    let app = coordinator_router(Arc::new(common::coordinator_over(ports)));

    let req = Request::builder()
        .method("POST")
        .uri("/coordinate")
        .header(API_KEY_HEADER, API_KEY)
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["kind"], "precondition");
    assert!(json["error"].as_str().unwrap().contains("charge_vehicle"));

    assert_eq!(
        agents.battery.status().await.storage.mode,
        StorageMode::Charging
    );
}
