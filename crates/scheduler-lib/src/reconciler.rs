//! Applies ranked records to live workloads
//!
//! Records arrive most specific first. The first record that reaches a
//! workload decides its replica count for the pass; later records touching
//! the same workload are ignored.

use crate::config::ExcludedNamespaces;
use crate::error::StoreError;
use crate::models::{WorkloadKey, WorkloadKind, WorkloadScheduleRecord};
use crate::observability::StructuredLogger;
use crate::store::{apply_replicas, Workload, WorkloadFilter, WorkloadStore};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A replica change the reconciler made, or would make in dry-run mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedChange {
    pub scheduler: String,
    pub workload: String,
    pub from: i32,
    pub to: i32,
}

/// Outcome of reconciling one ranked list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// Workloads scaled (or planned to be, in dry-run mode)
    pub updated: usize,
    /// Workloads already at their desired count
    pub unchanged: usize,
    /// Workloads passed over because their namespace is off limits
    pub excluded: usize,
    /// Records that could not be resolved
    pub skipped: usize,
    /// Updates the store rejected
    pub failed: usize,
    pub changes: Vec<PlannedChange>,
}

pub struct ReplicaReconciler {
    store: Arc<dyn WorkloadStore>,
    excluded: ExcludedNamespaces,
    dry_run: bool,
    logger: StructuredLogger,
}

impl ReplicaReconciler {
    pub fn new(store: Arc<dyn WorkloadStore>, excluded: ExcludedNamespaces) -> Self {
        Self {
            store,
            excluded,
            dry_run: false,
            logger: StructuredLogger::new("reconciler"),
        }
    }

    /// Plan changes without writing them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Walk `ranked` in order and bring each selected workload to the
    /// desired count of the first record that reaches it.
    pub async fn reconcile(&self, ranked: &[WorkloadScheduleRecord]) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let mut decided: HashSet<WorkloadKey> = HashSet::new();
        let mut off_limits: HashSet<WorkloadKey> = HashSet::new();

        for record in ranked {
            let kind = match record.kind.parse::<WorkloadKind>() {
                Ok(kind) => kind,
                Err(e) => {
                    debug!(scheduler = %record.scheduler_name, error = %e, "Skipping record");
                    summary.skipped += 1;
                    continue;
                }
            };

            let workloads = match self.resolve(kind, record).await {
                Ok(workloads) => workloads,
                Err(e) => {
                    warn!(
                        scheduler = %record.scheduler_name,
                        selection = %record.selection_key(),
                        error = %e,
                        "Failed to resolve workloads"
                    );
                    summary.skipped += 1;
                    continue;
                }
            };

            for workload in workloads {
                let key = workload.key();
                if decided.contains(&key) {
                    continue;
                }
                if self.excluded.contains(&key.namespace) {
                    debug!(workload = %key, "Namespace is off limits");
                    if off_limits.insert(key) {
                        summary.excluded += 1;
                    }
                    continue;
                }
                self.apply(record, workload, &mut summary).await;
                decided.insert(key);
            }
        }

        summary
    }

    /// Live workloads a record selects
    async fn resolve(
        &self,
        kind: WorkloadKind,
        record: &WorkloadScheduleRecord,
    ) -> Result<Vec<Workload>, StoreError> {
        let filter = WorkloadFilter::for_record(record);
        match (record.namespace_filter(), record.name_filter()) {
            (Some(namespace), Some(name)) => {
                let found = self.store.get_workload(kind, namespace, name).await?;
                Ok(found
                    .filter(|w| filter.matches_labels(w))
                    .into_iter()
                    .collect())
            }
            _ => self.store.list_workloads(kind, &filter).await,
        }
    }

    async fn apply(
        &self,
        record: &WorkloadScheduleRecord,
        mut workload: Workload,
        summary: &mut ReconcileSummary,
    ) {
        let key = workload.key();
        let current = workload.replicas();
        let desired = record.desired_replicas;

        if current == desired {
            debug!(workload = %key, replicas = current, "Already at desired replicas");
            summary.unchanged += 1;
            return;
        }

        let change = PlannedChange {
            scheduler: record.scheduler_name.clone(),
            workload: key.to_string(),
            from: current,
            to: desired,
        };

        if self.dry_run {
            summary.updated += 1;
            summary.changes.push(change);
            return;
        }

        apply_replicas(&mut workload, desired);
        match self.store.update_workload(&workload).await {
            Ok(()) => {
                self.logger.log_replica_update(record, &key, current, Ok(()));
                summary.updated += 1;
                summary.changes.push(change);
            }
            Err(e) => {
                self.logger.log_replica_update(record, &key, current, Err(&e));
                summary.failed += 1;
            }
        }
    }
}
