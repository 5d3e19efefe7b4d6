//! Watches on Schedule and WorkloadSchedule objects
//!
//! Every applied object is validated and the verdict is written to its status
//! subresource when it changed. A spec change also notifies the trigger loop
//! so a pass runs without waiting for the next tick.

use crate::controller::Trigger;
use crate::crd::{Schedule, ValidationStatus, WorkloadSchedule};
use crate::health::{Component, HealthRegistry};
use crate::observability::StructuredLogger;
use crate::store::WorkloadStore;
use crate::validation::{validate_schedule, validate_workload_schedule_refs};
use chrono::{DateTime, Local, TimeZone};
use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::{watcher, WatchStreamExt};
use kube::{Client, Resource, ResourceExt};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Verdict for a Schedule at `now`
pub fn check_schedule<Tz: TimeZone>(schedule: &Schedule, now: &DateTime<Tz>) -> Result<(), String> {
    validate_schedule(&schedule.spec, now).map_err(|e| e.to_string())
}

/// Verdict for a WorkloadSchedule, including whether its schedules exist
pub async fn check_workload_schedule(
    scheduler: &WorkloadSchedule,
    store: &dyn WorkloadStore,
) -> Result<(), String> {
    validate_workload_schedule_refs(&scheduler.spec, store)
        .await
        .map_err(|e| e.to_string())
}

/// The status to write, or `None` when `current` already says the same
pub fn status_update(
    current: Option<&ValidationStatus>,
    outcome: Result<(), String>,
) -> Option<ValidationStatus> {
    let next = ValidationStatus::from_outcome(outcome);
    match current {
        Some(current) if current.same_outcome(&next) => None,
        _ => Some(next),
    }
}

/// Remembers the last spec generation seen per object
#[derive(Debug, Default)]
struct Generations(HashMap<String, Option<i64>>);

impl Generations {
    /// True the first time an object is seen and whenever its spec moved on
    fn changed(&mut self, name: &str, generation: Option<i64>) -> bool {
        match self.0.insert(name.to_string(), generation) {
            Some(previous) => previous != generation,
            None => true,
        }
    }
}

/// Spawns and owns the watch tasks
#[derive(Clone)]
pub struct ChangeWatchers {
    client: Client,
    store: Arc<dyn WorkloadStore>,
    triggers: mpsc::Sender<Trigger>,
    health: HealthRegistry,
    logger: StructuredLogger,
}

impl ChangeWatchers {
    pub fn new(client: Client, store: Arc<dyn WorkloadStore>, triggers: mpsc::Sender<Trigger>) -> Self {
        Self {
            client,
            store,
            triggers,
            health: HealthRegistry::new(),
            logger: StructuredLogger::new("watcher"),
        }
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    /// Start both watches; they stop when the handle is dropped
    pub fn start(self) -> WatcherHandle {
        let schedules = tokio::spawn(self.clone().watch_schedules());
        let workload_schedules = tokio::spawn(self.watch_workload_schedules());
        WatcherHandle {
            tasks: vec![schedules, workload_schedules],
        }
    }

    async fn watch_schedules(self) {
        let api: Api<Schedule> = Api::all(self.client.clone());
        let mut generations = Generations::default();
        let mut events = watcher(api.clone(), watcher::Config::default())
            .default_backoff()
            .applied_objects()
            .boxed();

        info!("Watching Schedules");
        while let Some(event) = events.next().await {
            match event {
                Ok(schedule) => {
                    self.health.set_healthy(Component::Watcher).await;
                    let name = schedule.name_any();
                    let outcome = check_schedule(&schedule, &Local::now());
                    self.publish(&api, &name, schedule.status.as_ref(), outcome)
                        .await;
                    if generations.changed(&name, schedule.meta().generation) {
                        self.notify(Trigger::ScheduleChanged(name)).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Schedule watch error");
                    self.health
                        .set_degraded(Component::Watcher, format!("Schedule watch: {}", e))
                        .await;
                }
            }
        }
        debug!("Schedule watch ended");
    }

    async fn watch_workload_schedules(self) {
        let api: Api<WorkloadSchedule> = Api::all(self.client.clone());
        let mut generations = Generations::default();
        let mut events = watcher(api.clone(), watcher::Config::default())
            .default_backoff()
            .applied_objects()
            .boxed();

        info!("Watching WorkloadSchedules");
        while let Some(event) = events.next().await {
            match event {
                Ok(scheduler) => {
                    self.health.set_healthy(Component::Watcher).await;
                    let name = scheduler.name_any();
                    let outcome = check_workload_schedule(&scheduler, self.store.as_ref()).await;
                    self.publish(&api, &name, scheduler.status.as_ref(), outcome)
                        .await;
                    if generations.changed(&name, scheduler.meta().generation) {
                        self.notify(Trigger::WorkloadScheduleChanged(name)).await;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "WorkloadSchedule watch error");
                    self.health
                        .set_degraded(Component::Watcher, format!("WorkloadSchedule watch: {}", e))
                        .await;
                }
            }
        }
        debug!("WorkloadSchedule watch ended");
    }

    /// Log the verdict and merge-patch the status if it changed
    async fn publish<K>(
        &self,
        api: &Api<K>,
        name: &str,
        current: Option<&ValidationStatus>,
        outcome: Result<(), String>,
    ) where
        K: Resource<DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let kind = K::kind(&());
        self.logger.log_validation(&kind, name, &outcome);

        let Some(status) = status_update(current, outcome) else {
            return;
        };
        let patch = Patch::Merge(serde_json::json!({ "status": status }));
        if let Err(e) = api.patch_status(name, &PatchParams::default(), &patch).await {
            warn!(kind = %kind, name = %name, error = %e, "Failed to write status");
        }
    }

    async fn notify(&self, trigger: Trigger) {
        if self.triggers.send(trigger).await.is_err() {
            debug!("Trigger loop is gone, change not delivered");
        }
    }
}

/// Handle to running watches.
/// Stops them when dropped.
pub struct WatcherHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
