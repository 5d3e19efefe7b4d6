//! Probe and metrics endpoints
//!
//! `/healthz` fails only when a component is unhealthy, so a degraded
//! watcher does not get the pod restarted. `/readyz` also fails until
//! startup has finished.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use scheduler_lib::{ComponentStatus, HealthRegistry, OperatorMetrics};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: OperatorMetrics,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: OperatorMetrics) -> Self {
        Self {
            health_registry,
            metrics,
        }
    }
}

fn probe_status(ok: bool) -> StatusCode {
    if ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let health = state.health_registry.health().await;
    let alive = health.status != ComponentStatus::Unhealthy;
    (probe_status(alive), Json(health)).into_response()
}

async fn readyz(State(state): State<Arc<AppState>>) -> Response {
    let readiness = state.health_registry.readiness().await;
    (probe_status(readiness.ready), Json(readiness)).into_response()
}

async fn metrics() -> Response {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    match encoder.encode(&prometheus::gather(), &mut buffer) {
        Ok(()) => ([(header::CONTENT_TYPE, encoder.format_type().to_string())], buffer).into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve on every interface until `shutdown` fires
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Serving probes and metrics");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
        })
        .await?;

    info!("API server stopped");
    Ok(())
}
