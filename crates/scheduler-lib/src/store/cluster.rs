//! Kubernetes API backed store

use super::{Workload, WorkloadFilter, WorkloadStore};
use crate::crd::{Schedule, WorkloadSchedule};
use crate::error::StoreError;
use crate::models::WorkloadKind;
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, ListParams, PostParams};
use kube::{Client, Resource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::debug;

/// Store that reads and writes through the cluster API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn get_namespaced<K>(&self, namespace: &str, name: &str) -> Result<Option<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.get_opt(name)
            .await
            .map_err(|e| StoreError::fetch(format!("{} {}/{}", K::kind(&()), namespace, name), e))
    }

    async fn list_namespaced<K>(&self, filter: &WorkloadFilter) -> Result<Vec<K>, StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()> + Clone + DeserializeOwned + Debug,
    {
        let api: Api<K> = match &filter.namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        };

        let mut params = ListParams::default();
        if let Some(labels) = filter.label_selector() {
            params = params.labels(&labels);
        }
        if let Some(fields) = filter.field_selector() {
            params = params.fields(&fields);
        }

        debug!(kind = %K::kind(&()), filter = ?filter, "listing workloads");
        api.list(&params)
            .await
            .map(|list| list.items)
            .map_err(|e| StoreError::fetch(format!("{} list", K::kind(&())), e))
    }

    async fn replace<K>(&self, object: &K, namespace: &str, name: &str) -> Result<(), StoreError>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Serialize
            + Debug,
    {
        let api: Api<K> = Api::namespaced(self.client.clone(), namespace);
        api.replace(name, &PostParams::default(), object)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::update(format!("{} {}/{}", K::kind(&()), namespace, name), e))
    }
}

fn is_not_found(error: &kube::Error) -> bool {
    matches!(error, kube::Error::Api(response) if response.code == 404)
}

#[async_trait]
impl WorkloadStore for KubeStore {
    async fn list_workload_schedules(&self) -> Result<Vec<WorkloadSchedule>, StoreError> {
        let api: Api<WorkloadSchedule> = Api::all(self.client.clone());
        match api.list(&ListParams::default()).await {
            Ok(list) => Ok(list.items),
            Err(e) if is_not_found(&e) => Err(StoreError::not_found("WorkloadSchedule", "*")),
            Err(e) => Err(StoreError::fetch("WorkloadSchedule list", e)),
        }
    }

    async fn get_schedule(&self, name: &str) -> Result<Schedule, StoreError> {
        let api: Api<Schedule> = Api::all(self.client.clone());
        match api.get_opt(name).await {
            Ok(Some(schedule)) => Ok(schedule),
            Ok(None) => Err(StoreError::not_found("Schedule", name)),
            Err(e) => Err(StoreError::fetch(format!("Schedule {}", name), e)),
        }
    }

    async fn get_workload(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
    ) -> Result<Option<Workload>, StoreError> {
        Ok(match kind {
            WorkloadKind::Deployment => self
                .get_namespaced::<Deployment>(namespace, name)
                .await?
                .map(Workload::Deployment),
            WorkloadKind::StatefulSet => self
                .get_namespaced::<StatefulSet>(namespace, name)
                .await?
                .map(Workload::StatefulSet),
        })
    }

    async fn list_workloads(
        &self,
        kind: WorkloadKind,
        filter: &WorkloadFilter,
    ) -> Result<Vec<Workload>, StoreError> {
        Ok(match kind {
            WorkloadKind::Deployment => self
                .list_namespaced::<Deployment>(filter)
                .await?
                .into_iter()
                .map(Workload::Deployment)
                .collect(),
            WorkloadKind::StatefulSet => self
                .list_namespaced::<StatefulSet>(filter)
                .await?
                .into_iter()
                .map(Workload::StatefulSet)
                .collect(),
        })
    }

    async fn update_workload(&self, workload: &Workload) -> Result<(), StoreError> {
        let (namespace, name) = (workload.namespace(), workload.name());
        match workload {
            Workload::Deployment(d) => self.replace(d, namespace, name).await,
            Workload::StatefulSet(s) => self.replace(s, namespace, name).await,
        }
    }
}
