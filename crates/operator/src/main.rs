//! Workload Scheduler - scales Deployments and StatefulSets on schedules
//!
//! Runs as a single-replica Deployment. Watches Schedule and WorkloadSchedule
//! objects and reconciles workload replica counts on a fixed interval and
//! whenever one of them changes.

use anyhow::{Context, Result};
use scheduler_lib::{
    ChangeWatchers, HealthRegistry, KubeStore, OperatorMetrics, ReconciliationLoop,
    StructuredLogger, WorkloadStore,
};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use workload_scheduler_operator::{api, config::OperatorConfig};

const OPERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Change notifications buffered while a pass runs
const TRIGGER_BUFFER: usize = 64;

/// Missed intervals after which the reconciler reports degraded
const STALE_INTERVALS: u32 = 3;

#[tokio::main]
async fn main() -> Result<()> {
    let config = OperatorConfig::load().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_level())))
        .with(fmt::layer().json())
        .init();

    let logger = StructuredLogger::new(&config.instance);
    let excluded: Vec<&str> = config.settings.excluded_namespaces.iter().collect();
    logger.log_startup(OPERATOR_VERSION, config.settings.interval, &excluded);
    info!(time_zone = ?config.time_zone, "Evaluating schedules in the local time zone");

    let health_registry = HealthRegistry::with_stale_after(config.settings.interval * STALE_INTERVALS);
    health_registry.register_all().await;
    let metrics = OperatorMetrics::new();

    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let store: Arc<dyn WorkloadStore> = Arc::new(KubeStore::new(client.clone()));

    let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_BUFFER);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let _watchers = ChangeWatchers::new(client, store.clone(), trigger_tx)
        .with_health(health_registry.clone())
        .start();

    let reconciliation = ReconciliationLoop::new(store, config.settings.clone())
        .with_health(health_registry.clone())
        .with_logger(logger.clone());
    let loop_handle = tokio::spawn(reconciliation.run(trigger_rx, shutdown_rx));

    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics));
    health_registry.set_ready(true).await;
    let api_handle = tokio::spawn(api::serve(config.api_port, app_state, shutdown_tx.subscribe()));

    let reason = shutdown_signal().await?;
    logger.log_shutdown(reason);

    let _ = shutdown_tx.send(());
    if let Err(e) = loop_handle.await {
        warn!(error = %e, "Reconciliation loop ended abnormally");
    }
    match api_handle.await {
        Ok(Err(e)) => warn!(error = %e, "API server failed"),
        Err(e) => warn!(error = %e, "API server ended abnormally"),
        Ok(Ok(())) => {}
    }

    Ok(())
}

/// Wait for SIGINT, or SIGTERM on unix
async fn shutdown_signal() -> Result<&'static str> {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for SIGINT")?;
                Ok("SIGINT received")
            }
            _ = terminate.recv() => Ok("SIGTERM received"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for SIGINT")?;
        Ok("SIGINT received")
    }
}
