//! Core data models shared by the ranking engine and the reconciler

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Matches every value of a selector dimension
pub const WILDCARD: &str = "*";

/// Separator used to join selection keys
pub const KEY_SEPARATOR: &str = "/";

/// Workload kinds whose replica count can be scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

impl WorkloadKind {
    pub const ALL: [WorkloadKind; 2] = [WorkloadKind::Deployment, WorkloadKind::StatefulSet];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkloadKind::Deployment => "deployment",
            WorkloadKind::StatefulSet => "statefulset",
        }
    }
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a selector names a kind that cannot be scheduled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKind(pub String);

impl fmt::Display for UnknownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported workload kind: {}", self.0)
    }
}

impl std::error::Error for UnknownKind {}

impl FromStr for WorkloadKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "deployment" => Ok(WorkloadKind::Deployment),
            "statefulset" => Ok(WorkloadKind::StatefulSet),
            _ => Err(UnknownKind(s.to_string())),
        }
    }
}

/// Identity of a live workload
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkloadKey {
    pub namespace: String,
    pub kind: WorkloadKind,
    pub name: String,
}

impl WorkloadKey {
    pub fn new(namespace: impl Into<String>, kind: WorkloadKind, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            kind,
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.namespace,
            self.kind,
            self.name,
            sep = KEY_SEPARATOR
        )
    }
}

/// One fully expanded candidate assignment, rebuilt on every pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadScheduleRecord {
    pub scheduler_name: String,
    pub namespace: String,
    pub kind: String,
    pub name: String,
    pub desired_replicas: i32,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl WorkloadScheduleRecord {
    /// `namespace/kind/name` as expanded from the selector
    pub fn selection_key(&self) -> String {
        [
            self.namespace.as_str(),
            self.kind.as_str(),
            self.name.as_str(),
        ]
        .join(KEY_SEPARATOR)
    }

    pub fn namespace_filter(&self) -> Option<&str> {
        (self.namespace != WILDCARD).then_some(self.namespace.as_str())
    }

    pub fn name_filter(&self) -> Option<&str> {
        (self.name != WILDCARD).then_some(self.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(namespace: &str, kind: &str, name: &str) -> WorkloadScheduleRecord {
        WorkloadScheduleRecord {
            scheduler_name: "ws".to_string(),
            namespace: namespace.to_string(),
            kind: kind.to_string(),
            name: name.to_string(),
            desired_replicas: 1,
            labels: BTreeMap::new(),
        }
    }

    #[test]
    fn test_workload_kind_parse_is_case_insensitive() {
        assert_eq!("Deployment".parse::<WorkloadKind>(), Ok(WorkloadKind::Deployment));
        assert_eq!("STATEFULSET".parse::<WorkloadKind>(), Ok(WorkloadKind::StatefulSet));
        assert!("daemonset".parse::<WorkloadKind>().is_err());
    }

    #[test]
    fn test_workload_key_display() {
        let key = WorkloadKey::new("default", WorkloadKind::StatefulSet, "db");
        assert_eq!(key.to_string(), "default/statefulset/db");
    }

    #[test]
    fn test_record_filters() {
        let wildcard = record(WILDCARD, "deployment", WILDCARD);
        assert_eq!(wildcard.selection_key(), "*/deployment/*");
        assert_eq!(wildcard.namespace_filter(), None);
        assert_eq!(wildcard.name_filter(), None);

        let exact = record("shop", "deployment", "web");
        assert_eq!(exact.namespace_filter(), Some("shop"));
        assert_eq!(exact.name_filter(), Some("web"));
    }
}
