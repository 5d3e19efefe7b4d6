//! In-memory store
//!
//! Holds objects in concurrent maps and records every update request, so
//! tests can assert on exactly what a pass would have written. `wsctl plan`
//! also uses it to evaluate manifests without a cluster.

use super::{Workload, WorkloadFilter, WorkloadStore};
use crate::crd::{Schedule, WorkloadSchedule};
use crate::error::StoreError;
use crate::models::{WorkloadKey, WorkloadKind};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use kube::ResourceExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Failure injected into [`InMemoryStore::list_workload_schedules`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListFailure {
    /// The WorkloadSchedule collection does not exist
    Missing,
    /// The API server cannot be reached
    Unavailable,
}

#[derive(Default)]
pub struct InMemoryStore {
    workload_schedules: DashMap<String, WorkloadSchedule>,
    schedules: DashMap<String, Schedule>,
    workloads: DashMap<WorkloadKey, Workload>,
    /// Updates requested, in call order
    updates: Mutex<Vec<(WorkloadKey, i32)>>,
    failing_updates: DashSet<WorkloadKey>,
    failing_schedules: DashSet<String>,
    list_failure: Mutex<Option<ListFailure>>,
    /// Calls to `list_workload_schedules`; one per pass
    schedule_lists: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_workload_schedule(&self, scheduler: WorkloadSchedule) {
        self.workload_schedules.insert(scheduler.name_any(), scheduler);
    }

    pub fn insert_schedule(&self, schedule: Schedule) {
        self.schedules.insert(schedule.name_any(), schedule);
    }

    pub fn insert_workload(&self, workload: Workload) {
        self.workloads.insert(workload.key(), workload);
    }

    pub fn workload(&self, key: &WorkloadKey) -> Option<Workload> {
        self.workloads.get(key).map(|w| w.clone())
    }

    /// Make every update of `key` fail
    pub fn fail_updates_for(&self, key: WorkloadKey) {
        self.failing_updates.insert(key);
    }

    /// Make fetching the named Schedule fail with a transient error
    pub fn fail_schedule_fetch(&self, name: &str) {
        self.failing_schedules.insert(name.to_string());
    }

    pub fn fail_list(&self, failure: ListFailure) {
        if let Ok(mut slot) = self.list_failure.lock() {
            *slot = Some(failure);
        }
    }

    /// How many times the WorkloadSchedule collection was listed
    pub fn schedule_lists(&self) -> usize {
        self.schedule_lists.load(Ordering::SeqCst)
    }

    /// Update requests seen so far, including failed ones
    pub fn updates(&self) -> Vec<(WorkloadKey, i32)> {
        self.updates
            .lock()
            .map(|updates| updates.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl WorkloadStore for InMemoryStore {
    async fn list_workload_schedules(&self) -> Result<Vec<WorkloadSchedule>, StoreError> {
        self.schedule_lists.fetch_add(1, Ordering::SeqCst);
        let failure = self.list_failure.lock().ok().and_then(|slot| *slot);
        match failure {
            Some(ListFailure::Missing) => return Err(StoreError::not_found("WorkloadSchedule", "*")),
            Some(ListFailure::Unavailable) => {
                return Err(StoreError::fetch("WorkloadSchedules", "connection refused"))
            }
            None => {}
        }
        Ok(self
            .workload_schedules
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn get_schedule(&self, name: &str) -> Result<Schedule, StoreError> {
        if self.failing_schedules.contains(name) {
            return Err(StoreError::fetch(format!("Schedule {}", name), "injected failure"));
        }
        self.schedules
            .get(name)
            .map(|s| s.clone())
            .ok_or_else(|| StoreError::not_found("Schedule", name))
    }

    async fn get_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Workload>, StoreError> {
        Ok(self.workload(&WorkloadKey::new(namespace, kind, name)))
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        filter: &WorkloadFilter,
    ) -> Result<Vec<Workload>, StoreError> {
        let mut matching: Vec<Workload> = self
            .workloads
            .iter()
            .filter(|entry| entry.key().kind == kind && filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        matching.sort_by_key(Workload::key);
        Ok(matching)
    }

    async fn update_workload(&self, workload: &Workload) -> Result<(), StoreError> {
        let key = workload.key();
        if let Ok(mut updates) = self.updates.lock() {
            updates.push((key.clone(), workload.replicas()));
        }
        if self.failing_updates.contains(&key) {
            return Err(StoreError::update(key.to_string(), "injected failure"));
        }
        if !self.workloads.contains_key(&key) {
            return Err(StoreError::not_found("workload", key.to_string()));
        }
        self.workloads.insert(key, workload.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{deployment, stateful_set};

    #[tokio::test]
    async fn test_list_workloads_filters_by_kind_and_namespace() {
        let store = InMemoryStore::new();
        store.insert_workload(deployment("shop", "web", 2, &[]));
        store.insert_workload(deployment("blog", "web", 2, &[]));
        store.insert_workload(stateful_set("shop", "db", 1, &[]));

        let filter = WorkloadFilter {
            namespace: Some("shop".into()),
            ..Default::default()
        };
        let found = store.list_workloads(WorkloadKind::Deployment, &filter).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key().to_string(), "shop/deployment/web");

        let all = store
            .list_workloads(WorkloadKind::Deployment, &WorkloadFilter::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_update_records_requests() {
        let store = InMemoryStore::new();
        let mut web = deployment("shop", "web", 2, &[]);
        store.insert_workload(web.clone());

        crate::store::apply_replicas(&mut web, 0);
        store.update_workload(&web).await.unwrap();

        assert_eq!(store.updates(), vec![(web.key(), 0)]);
        assert_eq!(store.workload(&web.key()).unwrap().replicas(), 0);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryStore::new();
        let web = deployment("shop", "web", 2, &[]);
        store.insert_workload(web.clone());
        store.fail_updates_for(web.key());
        store.fail_schedule_fetch("night");

        assert!(matches!(
            store.update_workload(&web).await,
            Err(StoreError::Update { .. })
        ));
        assert!(matches!(
            store.get_schedule("night").await,
            Err(StoreError::Fetch { .. })
        ));
        assert!(store.get_schedule("day").await.unwrap_err().is_not_found());
    }
}
