//! Integration tests for the operator API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use scheduler_lib::{Component, HealthRegistry, OperatorMetrics};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use workload_scheduler_operator::api::{create_router, AppState};

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let state = Arc::new(AppState::new(health_registry, OperatorMetrics::new()));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_slice(&body).unwrap())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["components"]["reconciler"]["status"], "healthy");
    assert_eq!(health["components"]["watcher"]["status"], "healthy");
    assert_eq!(health["components"]["store"]["status"], "healthy");
}

#[tokio::test]
async fn test_healthz_returns_ok_when_degraded() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_degraded(Component::Watcher, "watch stream restarted")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"]["watcher"]["message"],
        "watch stream restarted"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_unhealthy(Component::Store, "api server unreachable")
        .await;

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_healthz_reports_last_pass() {
    let health_registry = HealthRegistry::with_stale_after(Duration::from_secs(180));
    health_registry.register_all().await;
    health_registry.record_pass(chrono::Utc::now()).await;
    let app = create_router(Arc::new(AppState::new(health_registry, OperatorMetrics::new())));

    let (status, health) = get_json(app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert!(health["lastPass"].is_string());
}

#[tokio::test]
async fn test_readyz_not_ready_before_startup_completes() {
    let (app, _state) = setup_test_app().await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
    assert!(readiness["reason"].is_string());
}

#[tokio::test]
async fn test_readyz_ready_when_set() {
    let (app, state) = setup_test_app().await;
    state.health_registry.set_ready(true).await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
    assert!(readiness.get("reason").is_none());
}

#[tokio::test]
async fn test_readyz_not_ready_when_component_unhealthy() {
    let (app, state) = setup_test_app().await;
    state.health_registry.set_ready(true).await;
    state
        .health_registry
        .set_unhealthy(Component::Reconciler, "pass failed")
        .await;

    let (status, readiness) = get_json(app, "/readyz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);
}

#[tokio::test]
async fn test_metrics_exposes_operator_metrics() {
    let (app, state) = setup_test_app().await;
    state.metrics.observe_pass(Duration::from_millis(40), true);
    state.metrics.inc_trigger("timer");

    let (status, body) = get(app, "/metrics").await;
    let text = String::from_utf8(body).unwrap();

    assert_eq!(status, StatusCode::OK);
    assert!(text.contains("workload_scheduler_passes_total"));
    assert!(text.contains("workload_scheduler_pass_duration_seconds"));
    assert!(text.contains("workload_scheduler_triggers_total"));
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _state) = setup_test_app().await;

    let (status, _) = get(app, "/nonexistent").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
