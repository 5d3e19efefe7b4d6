//! Observability for the scheduler operator
//!
//! Provides:
//! - Prometheus metrics (pass count and duration, replica updates, skipped schedulers)
//! - Structured JSON logging with tracing

use crate::error::StoreError;
use crate::models::{WorkloadKey, WorkloadScheduleRecord};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Pass duration buckets (in seconds)
const PASS_DURATION_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

static GLOBAL_METRICS: OnceLock<OperatorMetricsInner> = OnceLock::new();

struct OperatorMetricsInner {
    passes: IntCounterVec,
    pass_duration_seconds: Histogram,
    replica_updates: IntCounter,
    replica_update_failures: IntCounter,
    skipped_schedulers: IntCounter,
    ranked_records: IntGauge,
    triggers: IntCounterVec,
}

impl OperatorMetricsInner {
    fn new() -> Self {
        Self {
            passes: register_int_counter_vec!(
                "workload_scheduler_passes_total",
                "Reconciliation passes by outcome",
                &["outcome"]
            )
            .expect("Failed to register passes_total"),

            pass_duration_seconds: register_histogram!(
                "workload_scheduler_pass_duration_seconds",
                "Time spent in one reconciliation pass",
                PASS_DURATION_BUCKETS.to_vec()
            )
            .expect("Failed to register pass_duration_seconds"),

            replica_updates: register_int_counter!(
                "workload_scheduler_replica_updates_total",
                "Workload replica counts changed"
            )
            .expect("Failed to register replica_updates_total"),

            replica_update_failures: register_int_counter!(
                "workload_scheduler_replica_update_failures_total",
                "Workload updates rejected by the API server"
            )
            .expect("Failed to register replica_update_failures_total"),

            skipped_schedulers: register_int_counter!(
                "workload_scheduler_skipped_schedulers_total",
                "WorkloadSchedules left out of a pass because of an error"
            )
            .expect("Failed to register skipped_schedulers_total"),

            ranked_records: register_int_gauge!(
                "workload_scheduler_ranked_records",
                "Candidate records ranked in the last pass"
            )
            .expect("Failed to register ranked_records"),

            triggers: register_int_counter_vec!(
                "workload_scheduler_triggers_total",
                "Pass triggers received by source",
                &["source"]
            )
            .expect("Failed to register triggers_total"),
        }
    }
}

/// Handle to the process-wide operator metrics.
///
/// Clones share the same underlying collectors.
#[derive(Clone)]
pub struct OperatorMetrics {
    _private: (),
}

impl Default for OperatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl OperatorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(OperatorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &OperatorMetricsInner {
        GLOBAL_METRICS.get_or_init(OperatorMetricsInner::new)
    }

    /// Record a finished pass
    pub fn observe_pass(&self, duration: Duration, succeeded: bool) {
        let outcome = if succeeded { "success" } else { "error" };
        self.inner().passes.with_label_values(&[outcome]).inc();
        self.inner()
            .pass_duration_seconds
            .observe(duration.as_secs_f64());
    }

    pub fn inc_replica_updates(&self, count: u64) {
        self.inner().replica_updates.inc_by(count);
    }

    pub fn inc_update_failures(&self, count: u64) {
        self.inner().replica_update_failures.inc_by(count);
    }

    pub fn inc_skipped_schedulers(&self, count: u64) {
        self.inner().skipped_schedulers.inc_by(count);
    }

    pub fn set_ranked_records(&self, count: usize) {
        self.inner().ranked_records.set(count as i64);
    }

    pub fn inc_trigger(&self, source: &str) {
        self.inner().triggers.with_label_values(&[source]).inc();
    }

    pub fn pass_count(&self, outcome: &str) -> u64 {
        self.inner().passes.with_label_values(&[outcome]).get()
    }
}

/// Event-tagged log records for operator activity
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_startup(&self, version: &str, interval: Duration, excluded_namespaces: &[&str]) {
        info!(
            event = "operator_started",
            instance = %self.instance,
            version = %version,
            interval_secs = interval.as_secs(),
            excluded_namespaces = ?excluded_namespaces,
            "Workload scheduler started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "operator_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Workload scheduler shutting down"
        );
    }

    /// Log a replica change, or a failed attempt at one
    pub fn log_replica_update(
        &self,
        record: &WorkloadScheduleRecord,
        workload: &WorkloadKey,
        from: i32,
        result: Result<(), &StoreError>,
    ) {
        match result {
            Ok(()) => info!(
                event = "replica_updated",
                instance = %self.instance,
                scheduler = %record.scheduler_name,
                workload = %workload,
                from = from,
                to = record.desired_replicas,
                "Scaled workload"
            ),
            Err(e) => error!(
                event = "replica_update_failed",
                instance = %self.instance,
                scheduler = %record.scheduler_name,
                workload = %workload,
                from = from,
                to = record.desired_replicas,
                error = %e,
                "Failed to scale workload"
            ),
        }
    }

    pub fn log_scheduler_skipped(&self, scheduler: &str, reason: &dyn std::error::Error) {
        warn!(
            event = "scheduler_skipped",
            instance = %self.instance,
            scheduler = %scheduler,
            reason = %reason,
            "WorkloadSchedule left out of this pass"
        );
    }

    pub fn log_pass_completed(
        &self,
        ranked: usize,
        updated: usize,
        unchanged: usize,
        failed: usize,
        duration: Duration,
    ) {
        info!(
            event = "pass_completed",
            instance = %self.instance,
            ranked = ranked,
            updated = updated,
            unchanged = unchanged,
            failed = failed,
            duration_ms = duration.as_millis() as u64,
            "Reconciliation pass completed"
        );
    }

    pub fn log_pass_failed(&self, error: &dyn std::error::Error) {
        error!(
            event = "pass_failed",
            instance = %self.instance,
            error = %error,
            "Reconciliation pass failed"
        );
    }

    pub fn log_validation(&self, kind: &str, name: &str, result: &Result<(), String>) {
        match result {
            Ok(()) => debug!(
                event = "object_validated",
                instance = %self.instance,
                kind = %kind,
                name = %name,
                "Object is valid"
            ),
            Err(message) => warn!(
                event = "object_invalid",
                instance = %self.instance,
                kind = %kind,
                name = %name,
                message = %message,
                "Object failed validation"
            ),
        }
    }
}
