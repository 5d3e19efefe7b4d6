//! Structural validation of Schedule and WorkloadSchedule objects

use crate::crd::{ScheduleSpec, WorkloadScheduleSpec};
use crate::error::{Error, ScheduleError};
use crate::store::WorkloadStore;
use crate::window::{is_weekday_name, resolve};
use chrono::{DateTime, TimeZone};

/// Maximum length of an RFC 1123 DNS label
const DNS1123_LABEL_MAX_LEN: usize = 63;

/// Check the invariants of a Schedule.
///
/// Relative boundaries are resolved against `now`, so a template window is
/// validated on the day it is evaluated.
pub fn validate_schedule<Tz: TimeZone>(spec: &ScheduleSpec, now: &DateTime<Tz>) -> Result<(), ScheduleError> {
    if spec.schedule_units.is_empty() {
        return Err(ScheduleError::EmptySchedule);
    }

    for unit in &spec.schedule_units {
        if let Some(day) = unit.days.iter().find(|day| !is_weekday_name(day)) {
            return Err(ScheduleError::InvalidDay(day.clone()));
        }

        let start = resolve(&unit.start, now)?;
        let end = resolve(&unit.end, now)?;
        if start >= end {
            return Err(ScheduleError::InvalidWindow {
                start: start.naive_local().to_string(),
                end: end.naive_local().to_string(),
            });
        }
    }

    Ok(())
}

/// Check the invariants of a WorkloadSchedule that need no store access
pub fn validate_workload_schedule(spec: &WorkloadScheduleSpec) -> Result<(), ScheduleError> {
    if spec.schedules.is_empty() {
        return Err(ScheduleError::NoSchedules);
    }

    match spec.schedules.iter().find(|r| !is_dns1123_label(&r.schedule)) {
        Some(invalid) => Err(ScheduleError::InvalidScheduleName(invalid.schedule.clone())),
        None => Ok(()),
    }
}

/// Validate a WorkloadSchedule and confirm every schedule it references exists
pub async fn validate_workload_schedule_refs(
    spec: &WorkloadScheduleSpec,
    store: &dyn WorkloadStore,
) -> Result<(), Error> {
    validate_workload_schedule(spec)?;
    for schedule_ref in &spec.schedules {
        store.get_schedule(&schedule_ref.schedule).await?;
    }
    Ok(())
}

/// Lowercase alphanumerics and '-', starting and ending alphanumeric
pub fn is_dns1123_label(value: &str) -> bool {
    let bytes = value.as_bytes();
    let valid_edge = |b: &u8| b.is_ascii_lowercase() || b.is_ascii_digit();

    !bytes.is_empty()
        && bytes.len() <= DNS1123_LABEL_MAX_LEN
        && bytes.first().is_some_and(valid_edge)
        && bytes.last().is_some_and(valid_edge)
        && bytes
            .iter()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
}
