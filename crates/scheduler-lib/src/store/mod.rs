//! Access to declarative objects and live workloads
//!
//! The engine only talks to the [`WorkloadStore`] trait. [`KubeStore`] backs
//! it with the Kubernetes API; [`InMemoryStore`] backs tests and offline
//! planning.

mod cluster;
mod memory;

pub use self::cluster::KubeStore;
pub use self::memory::{InMemoryStore, ListFailure};

use crate::crd::{Schedule, WorkloadSchedule};
use crate::error::StoreError;
use crate::models::{WorkloadKey, WorkloadKind, WorkloadScheduleRecord};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;

/// Replica count Kubernetes assumes when the field is unset
const DEFAULT_REPLICAS: i32 = 1;

/// Store operations needed by one reconciliation pass
#[async_trait]
pub trait WorkloadStore: Send + Sync {
    /// List every WorkloadSchedule in the cluster
    async fn list_workload_schedules(&self) -> Result<Vec<WorkloadSchedule>, StoreError>;

    /// Fetch a Schedule by name
    async fn get_schedule(&self, name: &str) -> Result<Schedule, StoreError>;

    /// Fetch a single workload, `None` if it does not exist
    async fn get_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Workload>, StoreError>;

    /// List workloads of one kind matching `filter`
    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        filter: &WorkloadFilter,
    ) -> Result<Vec<Workload>, StoreError>;

    /// Persist a modified workload
    async fn update_workload(&self, workload: &Workload) -> Result<(), StoreError>;
}

/// A live workload whose replica count can be scheduled
#[derive(Debug, Clone, PartialEq)]
pub enum Workload {
    Deployment(Deployment),
    StatefulSet(StatefulSet),
}

impl Workload {
    pub fn kind(&self) -> WorkloadKind {
        match self {
            Workload::Deployment(_) => WorkloadKind::Deployment,
            Workload::StatefulSet(_) => WorkloadKind::StatefulSet,
        }
    }

    fn metadata(&self) -> &ObjectMeta {
        match self {
            Workload::Deployment(d) => &d.metadata,
            Workload::StatefulSet(s) => &s.metadata,
        }
    }

    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    pub fn namespace(&self) -> &str {
        self.metadata().namespace.as_deref().unwrap_or_default()
    }

    pub fn labels(&self) -> Option<&BTreeMap<String, String>> {
        self.metadata().labels.as_ref()
    }

    pub fn key(&self) -> WorkloadKey {
        WorkloadKey::new(self.namespace(), self.kind(), self.name())
    }

    /// Current replica count from the spec
    pub fn replicas(&self) -> i32 {
        let replicas = match self {
            Workload::Deployment(d) => d.spec.as_ref().and_then(|s| s.replicas),
            Workload::StatefulSet(s) => s.spec.as_ref().and_then(|s| s.replicas),
        };
        replicas.unwrap_or(DEFAULT_REPLICAS)
    }
}

/// Set the desired replica count on the workload's spec
pub fn apply_replicas(workload: &mut Workload, desired: i32) {
    match workload {
        Workload::Deployment(d) => {
            d.spec.get_or_insert_with(Default::default).replicas = Some(desired);
        }
        Workload::StatefulSet(s) => {
            s.spec.get_or_insert_with(Default::default).replicas = Some(desired);
        }
    }
}

/// Criteria for listing workloads
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadFilter {
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub labels: BTreeMap<String, String>,
}

impl WorkloadFilter {
    /// Filter for the workloads a record selects
    pub fn for_record(record: &WorkloadScheduleRecord) -> Self {
        Self {
            namespace: record.namespace_filter().map(str::to_string),
            name: record.name_filter().map(str::to_string),
            labels: record.labels.clone(),
        }
    }

    /// `k=v,k2=v2`, or `None` when no labels are required
    pub fn label_selector(&self) -> Option<String> {
        if self.labels.is_empty() {
            return None;
        }
        Some(
            self.labels
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join(","),
        )
    }

    /// Field selector on the indexed `metadata.name`
    pub fn field_selector(&self) -> Option<String> {
        self.name.as_ref().map(|name| format!("metadata.name={}", name))
    }

    pub fn matches(&self, workload: &Workload) -> bool {
        if self.namespace.as_deref().is_some_and(|ns| ns != workload.namespace()) {
            return false;
        }
        if self.name.as_deref().is_some_and(|name| name != workload.name()) {
            return false;
        }
        self.matches_labels(workload)
    }

    pub fn matches_labels(&self, workload: &Workload) -> bool {
        if self.labels.is_empty() {
            return true;
        }
        let Some(labels) = workload.labels() else {
            return false;
        };
        self.labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

/// Build a deployment for tests and offline plans
pub fn deployment(namespace: &str, name: &str, replicas: i32, labels: &[(&str, &str)]) -> Workload {
    let metadata = object_meta(namespace, name, labels);
    Workload::Deployment(Deployment {
        metadata,
        spec: Some(k8s_openapi::api::apps::v1::DeploymentSpec {
            replicas: Some(replicas),
            ..Default::default()
        }),
        status: None,
    })
}

/// Build a statefulset for tests and offline plans
pub fn stateful_set(namespace: &str, name: &str, replicas: i32, labels: &[(&str, &str)]) -> Workload {
    let metadata = object_meta(namespace, name, labels);
    Workload::StatefulSet(StatefulSet {
        metadata,
        spec: Some(k8s_openapi::api::apps::v1::StatefulSetSpec {
            replicas: Some(replicas),
            ..Default::default()
        }),
        status: None,
    })
}

fn object_meta(namespace: &str, name: &str, labels: &[(&str, &str)]) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: (!labels.is_empty()).then(|| {
            labels
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        }),
        ..Default::default()
    }
}
