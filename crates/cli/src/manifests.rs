//! Offline manifest loading
//!
//! Reads multi-document YAML files and sorts the documents by kind, so the
//! scheduler can be exercised without a cluster.

use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use scheduler_lib::store::{InMemoryStore, Workload};
use scheduler_lib::{Schedule, WorkloadSchedule};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: document {index} is not valid YAML")]
    Parse {
        path: PathBuf,
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: document {index} is not a valid {kind}")]
    Decode {
        path: PathBuf,
        index: usize,
        kind: String,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Objects found in a set of manifest files
#[derive(Debug, Default)]
pub struct Manifests {
    pub schedules: Vec<Schedule>,
    pub workload_schedules: Vec<WorkloadSchedule>,
    pub workloads: Vec<Workload>,
    /// `path#index (kind)` of documents that were not understood
    pub ignored: Vec<String>,
}

impl Manifests {
    pub fn load<P: AsRef<Path>>(paths: &[P]) -> Result<Self, ManifestError> {
        let mut manifests = Self::default();
        for path in paths {
            let path = path.as_ref();
            let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            manifests.add_documents(path, &content)?;
        }
        Ok(manifests)
    }

    /// Add every document of one YAML stream
    pub fn add_documents(&mut self, path: &Path, content: &str) -> Result<(), ManifestError> {
        for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
            let value = serde_yaml::Value::deserialize(document).map_err(|source| {
                ManifestError::Parse {
                    path: path.to_path_buf(),
                    index,
                    source,
                }
            })?;
            if value.is_null() {
                continue;
            }

            let kind = value
                .get("kind")
                .and_then(serde_yaml::Value::as_str)
                .unwrap_or_default()
                .to_string();
            let decode_error = |source| ManifestError::Decode {
                path: path.to_path_buf(),
                index,
                kind: kind.clone(),
                source,
            };

            match kind.as_str() {
                "Schedule" => self
                    .schedules
                    .push(serde_yaml::from_value(value).map_err(decode_error)?),
                "WorkloadSchedule" => self
                    .workload_schedules
                    .push(serde_yaml::from_value(value).map_err(decode_error)?),
                "Deployment" => self.workloads.push(Workload::Deployment(
                    serde_yaml::from_value::<Deployment>(value).map_err(decode_error)?,
                )),
                "StatefulSet" => self.workloads.push(Workload::StatefulSet(
                    serde_yaml::from_value::<StatefulSet>(value).map_err(decode_error)?,
                )),
                _ => self
                    .ignored
                    .push(format!("{}#{} ({})", path.display(), index, kind)),
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.schedules.is_empty() && self.workload_schedules.is_empty() && self.workloads.is_empty()
    }

    /// Store holding every loaded object
    pub fn into_store(self) -> InMemoryStore {
        let store = InMemoryStore::new();
        for schedule in self.schedules {
            store.insert_schedule(schedule);
        }
        for scheduler in self.workload_schedules {
            store.insert_workload_schedule(scheduler);
        }
        for workload in self.workloads {
            store.insert_workload(workload);
        }
        store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scheduler_lib::models::{WorkloadKey, WorkloadKind};
    use std::io::Write;

    const MANIFEST: &str = r#"
apiVersion: workload-scheduler.bennsimon.github.io/v1
kind: Schedule
metadata:
  name: nights
spec:
  scheduleUnits:
    - days: [monday, tuesday]
      start: { time: "20:00:00" }
      end: { time: "23:59:59" }
---
apiVersion: workload-scheduler.bennsimon.github.io/v1
kind: WorkloadSchedule
metadata:
  name: shop-nights
spec:
  selector:
    namespaces: [shop]
  schedules:
    - schedule: nights
      desired: 0
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: web
  namespace: shop
spec:
  replicas: 3
  selector:
    matchLabels: { app: web }
  template:
    metadata:
      labels: { app: web }
---
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
"#;

    #[test]
    fn test_load_sorts_documents_by_kind() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MANIFEST.as_bytes()).unwrap();

        let manifests = Manifests::load(&[file.path()]).unwrap();

        assert_eq!(manifests.schedules.len(), 1);
        assert_eq!(manifests.schedules[0].spec.schedule_units[0].days.len(), 2);
        assert_eq!(manifests.workload_schedules.len(), 1);
        assert_eq!(manifests.workload_schedules[0].spec.schedules[0].desired, 0);
        assert_eq!(manifests.workloads.len(), 1);
        assert_eq!(manifests.ignored.len(), 1);
        assert!(manifests.ignored[0].ends_with("#3 (ConfigMap)"));
    }

    #[test]
    fn test_into_store() {
        let mut manifests = Manifests::default();
        manifests
            .add_documents(Path::new("inline.yaml"), MANIFEST)
            .unwrap();

        let store = manifests.into_store();
        let web = store
            .workload(&WorkloadKey::new("shop", WorkloadKind::Deployment, "web"))
            .unwrap();
        assert_eq!(web.replicas(), 3);
    }

    #[test]
    fn test_invalid_document_names_its_position() {
        let mut manifests = Manifests::default();
        let err = manifests
            .add_documents(
                Path::new("bad.yaml"),
                "kind: Schedule\nmetadata: { name: x }\nspec:\n  scheduleUnits: 5\n",
            )
            .unwrap_err();
        assert!(err.to_string().starts_with("bad.yaml: document 0 is not a valid Schedule"));
    }

    #[test]
    fn test_missing_file() {
        let err = Manifests::load(&["/nonexistent/manifest.yaml"]).unwrap_err();
        assert!(matches!(err, ManifestError::Read { .. }));
    }
}
