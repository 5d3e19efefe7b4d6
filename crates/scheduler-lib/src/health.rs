//! Health tracking for liveness and readiness probes
//!
//! Components report their state into a shared [`HealthRegistry`]. The
//! reconciler also records when it last finished a pass; a registry built
//! with a staleness limit reports the reconciler degraded once no pass has
//! completed for that long.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Parts of the operator that report health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Reconciler,
    Watcher,
    Store,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Reconciler, Component::Watcher, Component::Store];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Reconciler => "reconciler",
            Component::Watcher => "watcher",
            Component::Store => "store",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Still working, but something needs attention
    Degraded,
    Unhealthy,
}

impl fmt::Display for ComponentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ComponentStatus::Healthy => "healthy",
            ComponentStatus::Degraded => "degraded",
            ComponentStatus::Unhealthy => "unhealthy",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub since: DateTime<Utc>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            since: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: BTreeMap<Component, ComponentHealth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_pass: Option<DateTime<Utc>>,
}

impl HealthResponse {
    /// Worst status among the components
    pub fn overall(components: &BTreeMap<Component, ComponentHealth>) -> ComponentStatus {
        components
            .values()
            .map(|h| h.status)
            .fold(ComponentStatus::Healthy, |worst, status| match (worst, status) {
                (ComponentStatus::Unhealthy, _) | (_, ComponentStatus::Unhealthy) => {
                    ComponentStatus::Unhealthy
                }
                (ComponentStatus::Degraded, _) | (_, ComponentStatus::Degraded) => {
                    ComponentStatus::Degraded
                }
                _ => ComponentStatus::Healthy,
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    components: BTreeMap<Component, ComponentHealth>,
    last_pass: Option<DateTime<Utc>>,
    ready: bool,
}

#[derive(Debug, Clone, Default)]
pub struct HealthRegistry {
    state: Arc<RwLock<State>>,
    stale_after: Option<Duration>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry that degrades the reconciler when passes stop completing
    pub fn with_stale_after(stale_after: Duration) -> Self {
        Self {
            state: Arc::default(),
            stale_after: Some(stale_after),
        }
    }

    /// Register every component as healthy
    pub async fn register_all(&self) {
        let mut state = self.state.write().await;
        for component in Component::ALL {
            state
                .components
                .insert(component, ComponentHealth::new(ComponentStatus::Healthy, None));
        }
    }

    async fn set(&self, component: Component, status: ComponentStatus, message: Option<String>) {
        let mut state = self.state.write().await;
        let unchanged = state
            .components
            .get(&component)
            .is_some_and(|h| h.status == status && h.message == message);
        if !unchanged {
            state
                .components
                .insert(component, ComponentHealth::new(status, message));
        }
    }

    pub async fn set_healthy(&self, component: Component) {
        self.set(component, ComponentStatus::Healthy, None).await;
    }

    pub async fn set_degraded(&self, component: Component, message: impl Into<String>) {
        self.set(component, ComponentStatus::Degraded, Some(message.into()))
            .await;
    }

    pub async fn set_unhealthy(&self, component: Component, message: impl Into<String>) {
        self.set(component, ComponentStatus::Unhealthy, Some(message.into()))
            .await;
    }

    /// Note a successful pass; marks the reconciler healthy
    pub async fn record_pass(&self, at: DateTime<Utc>) {
        self.state.write().await.last_pass = Some(at);
        self.set_healthy(Component::Reconciler).await;
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn health(&self) -> HealthResponse {
        self.health_at(Utc::now()).await
    }

    /// Health as of `now`, applying the staleness limit
    pub async fn health_at(&self, now: DateTime<Utc>) -> HealthResponse {
        let state = self.state.read().await;
        let mut components = state.components.clone();

        if let (Some(limit), Some(last_pass)) = (self.stale_after, state.last_pass) {
            let elapsed = (now - last_pass).to_std().unwrap_or_default();
            let reconciler_healthy = components
                .get(&Component::Reconciler)
                .is_some_and(|h| h.status == ComponentStatus::Healthy);
            if elapsed > limit && reconciler_healthy {
                components.insert(
                    Component::Reconciler,
                    ComponentHealth {
                        status: ComponentStatus::Degraded,
                        message: Some(format!("no pass completed for {}s", elapsed.as_secs())),
                        since: last_pass,
                    },
                );
            }
        }

        HealthResponse {
            status: HealthResponse::overall(&components),
            components,
            last_pass: state.last_pass,
        }
    }

    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = self.state.read().await.ready;
        if !ready {
            return ReadinessResponse {
                ready: false,
                reason: Some("Operator not yet initialized".to_string()),
            };
        }
        if self.health().await.status == ComponentStatus::Unhealthy {
            return ReadinessResponse {
                ready: false,
                reason: Some("A component is unhealthy".to_string()),
            };
        }
        ReadinessResponse {
            ready: true,
            reason: None,
        }
    }
}
