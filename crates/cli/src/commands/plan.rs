//! Dry-run of a reconciliation pass

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use scheduler_lib::store::{KubeStore, WorkloadStore};
use scheduler_lib::{PassSummary, ReconciliationLoop, SchedulerSettings};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::Tabled;

use crate::config::kube_client;
use crate::manifests::Manifests;
use crate::output::{format_change, print_info, print_json, print_rows, print_warning, OutputFormat};

/// Where workloads and schedules are read from
pub enum Source<'a> {
    Manifests(&'a [PathBuf]),
    Cluster {
        kubeconfig: Option<&'a str>,
        context: Option<&'a str>,
    },
}

#[derive(Tabled)]
struct ChangeRow {
    #[tabled(rename = "Workload")]
    workload: String,
    #[tabled(rename = "Replicas")]
    replicas: String,
    #[tabled(rename = "Scheduler")]
    scheduler: String,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Scheduler")]
    scheduler: String,
    #[tabled(rename = "Selection")]
    selection: String,
    #[tabled(rename = "Desired")]
    desired: i32,
}

async fn open_store(source: Source<'_>) -> Result<Arc<dyn WorkloadStore>> {
    match source {
        Source::Manifests(files) => {
            let manifests = Manifests::load(files)?;
            for ignored in &manifests.ignored {
                print_warning(&format!("Ignoring {}", ignored));
            }
            if manifests.is_empty() {
                anyhow::bail!("No Schedule, WorkloadSchedule or workload objects found");
            }
            Ok(Arc::new(manifests.into_store()))
        }
        Source::Cluster { kubeconfig, context } => {
            let client = kube_client(kubeconfig, context).await?;
            Ok(Arc::new(KubeStore::new(client)))
        }
    }
}

/// Evaluate a pass at `now` against `source` without scaling anything
pub async fn plan<Tz: TimeZone>(
    source: Source<'_>,
    namespaces_off_limits: Option<&str>,
    now: &DateTime<Tz>,
) -> Result<PassSummary> {
    let store = open_store(source).await?;
    let settings = SchedulerSettings::from_raw(None, namespaces_off_limits, None);
    ReconciliationLoop::new(store, settings)
        .plan(now)
        .await
        .context("Failed to evaluate schedules")
}

pub fn print_plan(summary: &PassSummary, format: OutputFormat, verbose: bool) {
    if format == OutputFormat::Json {
        print_json(summary);
        return;
    }

    for skipped in &summary.skipped {
        print_warning(&format!("Skipped {}: {}", skipped.scheduler, skipped.reason));
    }

    if verbose {
        let records: Vec<RecordRow> = summary
            .ranked
            .iter()
            .map(|r| RecordRow {
                scheduler: r.scheduler_name.clone(),
                selection: r.selection_key(),
                desired: r.desired_replicas,
            })
            .collect();
        print_rows(&records, "No schedule is active");
    }

    let changes: Vec<ChangeRow> = summary
        .reconcile
        .changes
        .iter()
        .map(|c| ChangeRow {
            workload: c.workload.clone(),
            replicas: format_change(c.from, c.to),
            scheduler: c.scheduler.clone(),
        })
        .collect();
    print_rows(&changes, "No replica changes planned");

    let reconcile = &summary.reconcile;
    print_info(&format!(
        "{} to scale, {} unchanged, {} off limits, {} unresolved",
        reconcile.updated, reconcile.unchanged, reconcile.excluded, reconcile.skipped
    ));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    // 2023-07-21 is a Friday
    const MANIFEST: &str = r#"
apiVersion: workload-scheduler.bennsimon.github.io/v1
kind: Schedule
metadata: { name: office }
spec:
  scheduleUnits:
    - days: [friday]
      start: { date: "2023-07-21", time: "08:00:00" }
      end: { date: "2023-07-21", time: "18:00:00" }
---
apiVersion: workload-scheduler.bennsimon.github.io/v1
kind: WorkloadSchedule
metadata: { name: shop-office }
spec:
  selector:
    namespaces: [shop, tools]
    kinds: [deployment]
  schedules:
    - { schedule: office, desired: 4 }
---
apiVersion: apps/v1
kind: Deployment
metadata: { name: web, namespace: shop }
spec:
  replicas: 1
  selector:
    matchLabels: { app: web }
  template:
    metadata:
      labels: { app: web }
---
apiVersion: apps/v1
kind: Deployment
metadata: { name: lint, namespace: tools }
spec:
  replicas: 1
  selector:
    matchLabels: { app: lint }
  template:
    metadata:
      labels: { app: lint }
"#;

    fn manifest_file(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("plan.yaml");
        std::fs::write(&path, MANIFEST).unwrap();
        path
    }

    #[tokio::test]
    async fn test_plan_inside_window() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![manifest_file(&dir)];
        let now = Utc.with_ymd_and_hms(2023, 7, 21, 10, 0, 0).unwrap();

        let summary = plan(Source::Manifests(&files), Some("tools"), &now)
            .await
            .unwrap();

        assert_eq!(summary.ranked.len(), 2);
        assert_eq!(summary.reconcile.updated, 1);
        assert_eq!(summary.reconcile.excluded, 1);
        assert_eq!(summary.reconcile.changes[0].workload, "shop/deployment/web");
        assert_eq!(summary.reconcile.changes[0].to, 4);
    }

    #[tokio::test]
    async fn test_plan_outside_window() {
        let dir = tempfile::tempdir().unwrap();
        let files = vec![manifest_file(&dir)];
        let now = Utc.with_ymd_and_hms(2023, 7, 21, 19, 0, 0).unwrap();

        let summary = plan(Source::Manifests(&files), None, &now).await.unwrap();

        assert!(summary.ranked.is_empty());
        assert!(summary.reconcile.changes.is_empty());
    }

    #[tokio::test]
    async fn test_plan_rejects_empty_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.yaml");
        std::fs::write(&path, "apiVersion: v1\nkind: ConfigMap\nmetadata: { name: x }\n").unwrap();

        let err = plan(Source::Manifests(&[path]), None, &Utc::now())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("No Schedule"));
    }
}
