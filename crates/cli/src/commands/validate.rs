//! Offline validation of Schedule and WorkloadSchedule manifests

use anyhow::Result;
use chrono::{DateTime, TimeZone};
use kube::ResourceExt;
use scheduler_lib::store::InMemoryStore;
use scheduler_lib::watch::{check_schedule, check_workload_schedule};
use serde::Serialize;
use std::path::PathBuf;
use tabled::Tabled;

use crate::manifests::Manifests;
use crate::output::{color_status, print_json, print_rows, print_success, print_warning, OutputFormat};

/// Verdict for one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub kind: &'static str,
    pub name: String,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Verdict {
    fn new(kind: &'static str, name: String, outcome: Result<(), String>) -> Self {
        Self {
            kind,
            name,
            valid: outcome.is_ok(),
            message: outcome.err(),
        }
    }
}

#[derive(Tabled)]
struct VerdictRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

/// Validate every Schedule and WorkloadSchedule in `manifests`.
///
/// Schedule references are resolved against the Schedules in the same set.
pub async fn check_manifests<Tz: TimeZone>(manifests: &Manifests, now: &DateTime<Tz>) -> Vec<Verdict> {
    let known = InMemoryStore::new();
    for schedule in &manifests.schedules {
        known.insert_schedule(schedule.clone());
    }

    let mut verdicts: Vec<Verdict> = manifests
        .schedules
        .iter()
        .map(|schedule| Verdict::new("Schedule", schedule.name_any(), check_schedule(schedule, now)))
        .collect();
    for scheduler in &manifests.workload_schedules {
        let outcome = check_workload_schedule(scheduler, &known).await;
        verdicts.push(Verdict::new("WorkloadSchedule", scheduler.name_any(), outcome));
    }
    verdicts
}

pub async fn validate_files<Tz: TimeZone>(
    files: &[PathBuf],
    now: &DateTime<Tz>,
    format: OutputFormat,
) -> Result<()> {
    let manifests = Manifests::load(files)?;
    for ignored in &manifests.ignored {
        print_warning(&format!("Ignoring {}", ignored));
    }

    let verdicts = check_manifests(&manifests, now).await;
    let invalid = verdicts.iter().filter(|v| !v.valid).count();

    match format {
        OutputFormat::Json => print_json(&verdicts),
        OutputFormat::Table => {
            let rows: Vec<VerdictRow> = verdicts
                .iter()
                .map(|v| VerdictRow {
                    kind: v.kind.to_string(),
                    name: v.name.clone(),
                    status: color_status(if v.valid { "valid" } else { "invalid" }),
                    message: v.message.clone().unwrap_or_default(),
                })
                .collect();
            print_rows(&rows, "No Schedule or WorkloadSchedule objects found");
        }
    }

    if invalid > 0 {
        anyhow::bail!("{} of {} objects are invalid", invalid, verdicts.len());
    }
    if format == OutputFormat::Table && !verdicts.is_empty() {
        print_success(&format!("{} objects are valid", verdicts.len()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::Path;

    const MANIFEST: &str = r#"
apiVersion: workload-scheduler.bennsimon.github.io/v1
kind: Schedule
metadata: { name: office }
spec:
  scheduleUnits:
    - days: [monday, friday]
      start: { time: "08:00:00" }
      end: { time: "18:00:00" }
---
apiVersion: workload-scheduler.bennsimon.github.io/v1
kind: Schedule
metadata: { name: typo }
spec:
  scheduleUnits:
    - days: [fryday]
---
apiVersion: workload-scheduler.bennsimon.github.io/v1
kind: WorkloadSchedule
metadata: { name: ok }
spec:
  schedules:
    - { schedule: office, desired: 2 }
---
apiVersion: workload-scheduler.bennsimon.github.io/v1
kind: WorkloadSchedule
metadata: { name: dangling }
spec:
  schedules:
    - { schedule: weekend, desired: 0 }
---
apiVersion: workload-scheduler.bennsimon.github.io/v1
kind: WorkloadSchedule
metadata: { name: badname }
spec:
  schedules:
    - { schedule: Office_Hours, desired: 0 }
"#;

    #[tokio::test]
    async fn test_check_manifests() {
        let mut manifests = Manifests::default();
        manifests
            .add_documents(Path::new("inline.yaml"), MANIFEST)
            .unwrap();

        let verdicts = check_manifests(&manifests, &Utc::now()).await;
        let summary: Vec<(&str, bool)> = verdicts
            .iter()
            .map(|v| (v.name.as_str(), v.valid))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("office", true),
                ("typo", false),
                ("ok", true),
                ("dangling", false),
                ("badname", false),
            ]
        );
        assert_eq!(verdicts[1].message.as_deref(), Some("day: fryday, is not valid"));
        assert!(verdicts[4].message.as_deref().unwrap().contains("Office_Hours"));
    }

    #[tokio::test]
    async fn test_validate_files_fails_on_invalid_objects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schedules.yaml");
        std::fs::write(&path, MANIFEST).unwrap();

        let err = validate_files(&[path], &Utc::now(), OutputFormat::Json)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "3 of 5 objects are invalid");
    }
}
