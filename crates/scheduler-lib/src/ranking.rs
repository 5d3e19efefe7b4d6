//! Candidate collection and specificity ranking
//!
//! Every active (scheduler, schedule) pair contributes records to a
//! [`CandidateMap`] grouped by specificity and selection key. [`rank`]
//! flattens the map most specific first, which is the order the reconciler
//! consumes it in.

use crate::crd::WorkloadScheduleSpec;
use crate::error::ScheduleError;
use crate::models::WorkloadScheduleRecord;
use crate::selector::{expand, Specificity};
use std::collections::BTreeMap;

/// specificity -> selection key -> records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateMap {
    groups: BTreeMap<Specificity, BTreeMap<String, Vec<WorkloadScheduleRecord>>>,
}

impl CandidateMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Total number of records across all groups
    pub fn len(&self) -> usize {
        self.groups
            .values()
            .flat_map(|keys| keys.values())
            .map(Vec::len)
            .sum()
    }

    /// Append a record under its selection key
    pub fn insert(&mut self, specificity: Specificity, record: WorkloadScheduleRecord) {
        self.groups
            .entry(specificity)
            .or_default()
            .entry(record.selection_key())
            .or_default()
            .push(record);
    }

    /// Move every record of `other` into this map, keeping their order
    pub fn merge(&mut self, other: CandidateMap) {
        for (specificity, keys) in other.groups {
            let group = self.groups.entry(specificity).or_default();
            for (key, mut records) in keys {
                group.entry(key).or_default().append(&mut records);
            }
        }
    }

    pub fn specificities(&self) -> impl Iterator<Item = Specificity> + '_ {
        self.groups.keys().copied()
    }
}

/// Desired replicas for `schedule_name` according to the first matching ref
pub fn desired_for(
    scheduler_name: &str,
    spec: &WorkloadScheduleSpec,
    schedule_name: &str,
) -> Result<i32, ScheduleError> {
    spec.schedules
        .iter()
        .find(|r| r.schedule == schedule_name)
        .map(|r| r.desired)
        .ok_or_else(|| ScheduleError::NoMatchingScheduleRef {
            scheduler: scheduler_name.to_string(),
            schedule: schedule_name.to_string(),
        })
}

/// Add the records a scheduler contributes while `schedule_name` is active.
///
/// Fails without touching `candidates` when the scheduler has no ref to the
/// schedule. Returns the number of records added.
pub fn build_candidates(
    candidates: &mut CandidateMap,
    scheduler_name: &str,
    spec: &WorkloadScheduleSpec,
    schedule_name: &str,
) -> Result<usize, ScheduleError> {
    desired_for(scheduler_name, spec, schedule_name)?;

    let expansion = expand(&spec.selector);
    let mut added = 0;
    for schedule_ref in spec.schedules.iter().filter(|r| r.schedule == schedule_name) {
        for selection in &expansion.selections {
            candidates.insert(
                expansion.specificity,
                WorkloadScheduleRecord {
                    scheduler_name: scheduler_name.to_string(),
                    namespace: selection.namespace.clone(),
                    kind: selection.kind.clone(),
                    name: selection.name.clone(),
                    desired_replicas: schedule_ref.desired,
                    labels: spec.selector.labels.clone(),
                },
            );
            added += 1;
        }
    }
    Ok(added)
}

/// Flatten candidates, highest specificity first.
///
/// Groups are consumed from the highest specificity down. Inside a group,
/// selection keys come in ascending order and each key keeps the insertion
/// order of its records; nothing else breaks ties between equally specific
/// records.
pub fn rank(candidates: &CandidateMap) -> Vec<WorkloadScheduleRecord> {
    candidates
        .groups
        .iter()
        .rev()
        .flat_map(|(_, keys)| keys.values().flatten().cloned())
        .collect()
}
