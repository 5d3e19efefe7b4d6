//! Custom resource definitions
//!
//! Both resources are cluster-scoped and live in the
//! `workload-scheduler.bennsimon.github.io` API group, so objects created by
//! earlier releases of the scheduler keep working. Field names follow the
//! persisted camelCase layout; every field is optional on the wire and
//! defaults to empty.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const API_GROUP: &str = "workload-scheduler.bennsimon.github.io";
pub const API_VERSION: &str = "v1";

/// A named set of time windows
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "workload-scheduler.bennsimon.github.io",
    version = "v1",
    kind = "Schedule",
    status = "ValidationStatus",
    shortname = "sched"
)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedule_units: Vec<ScheduleUnit>,
}

/// One time window, optionally restricted to some weekdays
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct ScheduleUnit {
    /// Full weekday names, case-insensitive. Empty means every day.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub days: Vec<String>,
    #[serde(default)]
    pub start: TimeUnit,
    #[serde(default)]
    pub end: TimeUnit,
}

/// Date and time-of-day of a window boundary.
///
/// `date` is empty (today), `YYYY-MM-DD`, or a template where `y`, `m` and `d`
/// stand for the current year, month and day. `time` is empty (midnight) or
/// `HH:MM:SS`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct TimeUnit {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub date: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub time: String,
}

impl TimeUnit {
    pub fn new(date: impl Into<String>, time: impl Into<String>) -> Self {
        Self {
            date: date.into(),
            time: time.into(),
        }
    }
}

/// Binds a workload selector to desired replica counts per schedule
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "workload-scheduler.bennsimon.github.io",
    version = "v1",
    kind = "WorkloadSchedule",
    status = "ValidationStatus",
    shortname = "ws"
)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadScheduleSpec {
    #[serde(default)]
    pub selector: WorkloadSelector,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schedules: Vec<ScheduleRef>,
}

/// Selects workloads by namespace, kind, name and labels
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct WorkloadSelector {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub namespaces: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

/// Desired replica count while the named schedule is active
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct ScheduleRef {
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub desired: i32,
}

impl ScheduleRef {
    pub fn new(schedule: impl Into<String>, desired: i32) -> Self {
        Self {
            schedule: schedule.into(),
            desired,
        }
    }
}

/// Validation outcome written to the status subresource of both kinds
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationStatus {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_validated: Option<String>,
}

impl ValidationStatus {
    pub fn from_outcome(outcome: Result<(), String>) -> Self {
        let (valid, message) = match outcome {
            Ok(()) => (true, None),
            Err(message) => (false, Some(message)),
        };
        Self {
            valid,
            message,
            last_validated: Some(chrono::Utc::now().to_rfc3339()),
        }
    }

    /// Same verdict, ignoring when it was reached
    pub fn same_outcome(&self, other: &ValidationStatus) -> bool {
        self.valid == other.valid && self.message == other.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::{CustomResourceExt, Resource};

    #[test]
    fn test_schedule_wire_layout() {
        let json = serde_json::json!({
            "apiVersion": "workload-scheduler.bennsimon.github.io/v1",
            "kind": "Schedule",
            "metadata": { "name": "office-hours" },
            "spec": {
                "scheduleUnits": [{
                    "days": ["Monday", "friday"],
                    "start": { "date": "y-m-d", "time": "08:00:00" },
                    "end": { "time": "18:00:00" }
                }]
            }
        });

        let schedule: Schedule = serde_json::from_value(json).unwrap();
        let unit = &schedule.spec.schedule_units[0];
        assert_eq!(unit.days, vec!["Monday", "friday"]);
        assert_eq!(unit.start, TimeUnit::new("y-m-d", "08:00:00"));
        assert_eq!(unit.end, TimeUnit::new("", "18:00:00"));
    }

    #[test]
    fn test_workload_schedule_defaults_missing_fields() {
        let json = serde_json::json!({
            "apiVersion": "workload-scheduler.bennsimon.github.io/v1",
            "kind": "WorkloadSchedule",
            "metadata": { "name": "nightly" },
            "spec": { "schedules": [{ "schedule": "night" }] }
        });

        let ws: WorkloadSchedule = serde_json::from_value(json).unwrap();
        assert_eq!(ws.spec.selector, WorkloadSelector::default());
        assert_eq!(ws.spec.schedules, vec![ScheduleRef::new("night", 0)]);
    }

    #[test]
    fn test_crds_are_cluster_scoped() {
        assert_eq!(Schedule::crd().spec.scope, "Cluster");
        assert_eq!(WorkloadSchedule::crd().spec.scope, "Cluster");
        assert_eq!(Schedule::group(&()), API_GROUP);
        assert_eq!(WorkloadSchedule::version(&()), API_VERSION);
        assert_eq!(
            Schedule::crd().metadata.name.as_deref(),
            Some("schedules.workload-scheduler.bennsimon.github.io")
        );
        assert_eq!(
            WorkloadSchedule::api_version(&()),
            "workload-scheduler.bennsimon.github.io/v1"
        );
    }

    #[test]
    fn test_validation_status_same_outcome_ignores_timestamp() {
        let mut first = ValidationStatus::from_outcome(Err("bad".into()));
        let second = ValidationStatus::from_outcome(Err("bad".into()));
        first.last_validated = Some("2023-07-21T00:00:00Z".into());

        assert!(first.same_outcome(&second));
        assert!(!first.same_outcome(&ValidationStatus::from_outcome(Ok(()))));
    }
}
