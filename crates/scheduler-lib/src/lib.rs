//! Time-based replica scheduling for Kubernetes workloads
//!
//! This crate provides the core functionality for:
//! - Schedule and WorkloadSchedule custom resources
//! - Time window evaluation and object validation
//! - Selector expansion and specificity ranking
//! - Replica reconciliation against a pluggable store
//! - The reconciliation loop, change watchers, health checks and observability

pub mod config;
pub mod controller;
pub mod crd;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod ranking;
pub mod reconciler;
pub mod selector;
pub mod store;
pub mod validation;
pub mod watch;
pub mod window;

pub use config::{ExcludedNamespaces, SchedulerSettings};
pub use controller::{PassSummary, ReconciliationLoop, Trigger};
pub use crd::{Schedule, ValidationStatus, WorkloadSchedule};
pub use error::{Error, Result, ScheduleError, StoreError};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{OperatorMetrics, StructuredLogger};
pub use reconciler::{PlannedChange, ReconcileSummary, ReplicaReconciler};
pub use store::{InMemoryStore, KubeStore, Workload, WorkloadStore};
pub use watch::{ChangeWatchers, WatcherHandle};
