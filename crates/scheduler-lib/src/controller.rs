//! Reconciliation passes and the loop that triggers them
//!
//! A pass lists every WorkloadSchedule, finds the windows active at `now`,
//! ranks the resulting candidates and hands them to the
//! [`ReplicaReconciler`]. [`ReconciliationLoop::run`] drives passes from a
//! timer and from change notifications, one pass at a time.

use crate::config::SchedulerSettings;
use crate::crd::{Schedule, WorkloadScheduleSpec};
use crate::error::Result;
use crate::health::{Component, HealthRegistry};
use crate::models::WorkloadScheduleRecord;
use crate::observability::{OperatorMetrics, StructuredLogger};
use crate::ranking::{build_candidates, rank, CandidateMap};
use crate::reconciler::{ReconcileSummary, ReplicaReconciler};
use crate::store::WorkloadStore;
use crate::validation::validate_schedule;
use crate::window::first_active_unit;
use chrono::{DateTime, Local, TimeZone, Utc};
use kube::ResourceExt;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Why a pass was started
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Timer,
    ScheduleChanged(String),
    WorkloadScheduleChanged(String),
}

impl Trigger {
    pub fn source(&self) -> &'static str {
        match self {
            Trigger::Timer => "timer",
            Trigger::ScheduleChanged(_) => "schedule",
            Trigger::WorkloadScheduleChanged(_) => "workload_schedule",
        }
    }
}

/// A WorkloadSchedule left out of a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedScheduler {
    pub scheduler: String,
    pub reason: String,
}

/// Result of one pass, or of a dry-run plan
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassSummary {
    pub ranked: Vec<WorkloadScheduleRecord>,
    pub skipped: Vec<SkippedScheduler>,
    pub reconcile: ReconcileSummary,
}

/// Ranked candidates before reconciliation
#[derive(Debug, Default)]
struct Evaluation {
    ranked: Vec<WorkloadScheduleRecord>,
    skipped: Vec<SkippedScheduler>,
}

pub struct ReconciliationLoop {
    store: Arc<dyn WorkloadStore>,
    settings: SchedulerSettings,
    reconciler: ReplicaReconciler,
    health: Option<HealthRegistry>,
    metrics: OperatorMetrics,
    logger: StructuredLogger,
}

impl ReconciliationLoop {
    pub fn new(store: Arc<dyn WorkloadStore>, settings: SchedulerSettings) -> Self {
        let logger = StructuredLogger::new("reconciliation-loop");
        let reconciler = ReplicaReconciler::new(store.clone(), settings.excluded_namespaces.clone())
            .with_logger(logger.clone());
        Self {
            store,
            settings,
            reconciler,
            health: None,
            metrics: OperatorMetrics::new(),
            logger,
        }
    }

    /// Report pass outcomes into `health`
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.reconciler = self.reconciler.with_logger(logger.clone());
        self.logger = logger;
        self
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Run one pass evaluated at `now` and apply the result
    pub async fn run_pass<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<PassSummary> {
        let started = Instant::now();
        let outcome = self.pass(now, &self.reconciler).await;
        let elapsed = started.elapsed();

        match &outcome {
            Ok(summary) => {
                self.metrics.observe_pass(elapsed, true);
                self.metrics.set_ranked_records(summary.ranked.len());
                self.metrics
                    .inc_replica_updates(summary.reconcile.updated as u64);
                self.metrics
                    .inc_update_failures(summary.reconcile.failed as u64);
                self.metrics
                    .inc_skipped_schedulers(summary.skipped.len() as u64);
                self.logger.log_pass_completed(
                    summary.ranked.len(),
                    summary.reconcile.updated,
                    summary.reconcile.unchanged,
                    summary.reconcile.failed,
                    elapsed,
                );
                if let Some(health) = &self.health {
                    health.record_pass(Utc::now()).await;
                    health.set_healthy(Component::Store).await;
                }
            }
            Err(e) => {
                self.metrics.observe_pass(elapsed, false);
                self.logger.log_pass_failed(e);
                if let Some(health) = &self.health {
                    health.set_degraded(Component::Store, e.to_string()).await;
                }
            }
        }

        outcome
    }

    /// Evaluate a pass at `now` without updating any workload
    pub async fn plan<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<PassSummary> {
        let dry_run = ReplicaReconciler::new(
            self.store.clone(),
            self.settings.excluded_namespaces.clone(),
        )
        .dry_run(true);
        self.pass(now, &dry_run).await
    }

    async fn pass<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        reconciler: &ReplicaReconciler,
    ) -> Result<PassSummary> {
        let evaluation = self.evaluate(now).await?;
        let reconcile = reconciler.reconcile(&evaluation.ranked).await;
        Ok(PassSummary {
            ranked: evaluation.ranked,
            skipped: evaluation.skipped,
            reconcile,
        })
    }

    /// Collect and rank the records of every scheduler active at `now`
    async fn evaluate<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Result<Evaluation> {
        let mut schedulers = match self.store.list_workload_schedules().await {
            Ok(schedulers) => schedulers,
            Err(e) if e.is_not_found() => {
                debug!("WorkloadSchedule collection not found, nothing to do");
                return Ok(Evaluation::default());
            }
            Err(e) => return Err(e.into()),
        };
        // Equally specific records keep scheduler name order
        schedulers.sort_by_key(|ws| ws.name_any());

        let mut evaluation = Evaluation::default();
        let mut fetched: HashMap<String, Schedule> = HashMap::new();
        let mut candidates = CandidateMap::new();

        for scheduler in &schedulers {
            let name = scheduler.name_any();
            let outcome = self
                .fetch_schedules(&scheduler.spec, &mut fetched)
                .await
                .and_then(|schedules| self.collect(&name, &scheduler.spec, &schedules, now));
            match outcome {
                Ok(contributed) => candidates.merge(contributed),
                Err(e) => {
                    self.logger.log_scheduler_skipped(&name, &e);
                    evaluation.skipped.push(SkippedScheduler {
                        scheduler: name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        evaluation.ranked = rank(&candidates);
        debug!(
            schedulers = schedulers.len(),
            ranked = evaluation.ranked.len(),
            "Ranked candidate records"
        );
        Ok(evaluation)
    }

    /// Fetch the distinct schedules a scheduler references, in reference order
    async fn fetch_schedules(
        &self,
        spec: &WorkloadScheduleSpec,
        fetched: &mut HashMap<String, Schedule>,
    ) -> Result<Vec<Schedule>> {
        let mut schedules: Vec<Schedule> = Vec::new();
        for schedule_ref in &spec.schedules {
            let name = &schedule_ref.schedule;
            if schedules.iter().any(|s| s.name_any() == *name) {
                continue;
            }
            if let Some(schedule) = fetched.get(name) {
                schedules.push(schedule.clone());
                continue;
            }
            let schedule = self.store.get_schedule(name).await?;
            fetched.insert(name.clone(), schedule.clone());
            schedules.push(schedule);
        }
        Ok(schedules)
    }

    /// Records a single scheduler contributes at `now`.
    ///
    /// Built in a scratch map so a failing scheduler contributes nothing.
    fn collect<Tz: TimeZone>(
        &self,
        scheduler: &str,
        spec: &WorkloadScheduleSpec,
        schedules: &[Schedule],
        now: &DateTime<Tz>,
    ) -> Result<CandidateMap> {
        let mut contributed = CandidateMap::new();
        for schedule in schedules {
            let schedule_name = schedule.name_any();
            if let Err(e) = validate_schedule(&schedule.spec, now) {
                warn!(
                    scheduler = %scheduler,
                    schedule = %schedule_name,
                    error = %e,
                    "Skipping invalid schedule"
                );
                continue;
            }
            if let Some(unit) = first_active_unit(&schedule.spec, now) {
                let added = build_candidates(&mut contributed, scheduler, spec, &schedule_name)?;
                debug!(
                    scheduler = %scheduler,
                    schedule = %schedule_name,
                    unit = unit,
                    records = added,
                    "Schedule window active"
                );
            }
        }
        Ok(contributed)
    }

    /// Drive passes until `shutdown` fires.
    ///
    /// A pass starts on every interval tick and on every change notification.
    /// Notifications that queue up while a pass runs are folded into the next
    /// pass, and each pass pushes the next timer tick a full interval out.
    pub async fn run(self, mut triggers: mpsc::Receiver<Trigger>, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watching = true;

        info!(interval_secs = self.settings.interval.as_secs(), "Reconciliation loop started");

        loop {
            let trigger = tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                received = triggers.recv(), if watching => match received {
                    Some(trigger) => trigger,
                    None => {
                        warn!("Change notifications closed, continuing on the timer only");
                        watching = false;
                        continue;
                    }
                },
                _ = ticker.tick() => Trigger::Timer,
            };

            self.metrics.inc_trigger(trigger.source());
            let mut coalesced = 0;
            while let Ok(pending) = triggers.try_recv() {
                self.metrics.inc_trigger(pending.source());
                coalesced += 1;
            }
            debug!(trigger = ?trigger, coalesced = coalesced, "Starting pass");

            // Failures are logged and recorded; the next trigger retries
            let _ = self.run_pass(&Local::now()).await;
            ticker.reset();
        }

        info!("Reconciliation loop stopped");
    }
}
