//! Error types for schedule evaluation and store access

use thiserror::Error;

/// Boxed error used as the source of store failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors in the definition of a Schedule or WorkloadSchedule.
///
/// These abort use of the offending object for the current pass and are
/// surfaced on the object's status by the validation watchers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("schedule(s) need to be defined")]
    EmptySchedule,

    #[error("day: {0}, is not valid")]
    InvalidDay(String),

    #[error("invalid time window; start: {start}, end: {end}")]
    InvalidWindow { start: String, end: String },

    #[error("cannot parse schedule time '{value}': {reason}")]
    TimeFormat { value: String, reason: String },

    #[error("no matching schedule '{schedule}' found in workload schedule '{scheduler}'")]
    NoMatchingScheduleRef { scheduler: String, schedule: String },

    #[error("schedules need to be defined")]
    NoSchedules,

    #[error("schedule: {0} is not a valid DNS-1123 label")]
    InvalidScheduleName(String),
}

/// Errors returned by a [`crate::store::WorkloadStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("failed to fetch {what}")]
    Fetch {
        what: String,
        #[source]
        source: BoxError,
    },

    #[error("failed to update {what}")]
    Update {
        what: String,
        #[source]
        source: BoxError,
    },
}

impl StoreError {
    pub fn not_found(kind: &'static str, name: impl Into<String>) -> Self {
        StoreError::NotFound {
            kind,
            name: name.into(),
        }
    }

    pub fn fetch(what: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StoreError::Fetch {
            what: what.into(),
            source: source.into(),
        }
    }

    pub fn update(what: impl Into<String>, source: impl Into<BoxError>) -> Self {
        StoreError::Update {
            what: what.into(),
            source: source.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Crate-level error
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("kubernetes api error")]
    Kube(#[from] kube::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
