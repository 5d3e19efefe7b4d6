//! Scheduler settings consumed by the core
//!
//! Values are parsed leniently: a missing or malformed value falls back to
//! its default instead of failing startup.

use std::collections::BTreeSet;
use std::time::Duration;

/// Interval between timer-driven passes when none is configured
pub const DEFAULT_RECONCILIATION_INTERVAL_SECS: u64 = 60;

/// Namespace that is always off limits
pub const SYSTEM_NAMESPACE: &str = "kube-system";

/// Namespaces whose workloads are never scaled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedNamespaces(BTreeSet<String>);

impl ExcludedNamespaces {
    /// Parse a comma-separated list; the system namespace is always included
    pub fn parse(raw: Option<&str>) -> Self {
        let mut namespaces: BTreeSet<String> = raw
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
            .collect();
        namespaces.insert(SYSTEM_NAMESPACE.to_string());
        Self(namespaces)
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.0.contains(namespace)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for ExcludedNamespaces {
    fn default() -> Self {
        Self::parse(None)
    }
}

/// Settings for the reconciliation loop
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Time between timer-driven passes
    pub interval: Duration,
    /// Namespaces the reconciler never touches
    pub excluded_namespaces: ExcludedNamespaces,
    /// Verbose logging only; never changes behavior
    pub debug: bool,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_RECONCILIATION_INTERVAL_SECS),
            excluded_namespaces: ExcludedNamespaces::default(),
            debug: false,
        }
    }
}

impl SchedulerSettings {
    /// Build settings from raw configuration strings
    pub fn from_raw(interval: Option<&str>, excluded: Option<&str>, debug: Option<&str>) -> Self {
        Self {
            interval: parse_interval(interval),
            excluded_namespaces: ExcludedNamespaces::parse(excluded),
            debug: debug.map(parse_bool).unwrap_or(false),
        }
    }
}

/// Seconds as a positive integer, otherwise the default
fn parse_interval(raw: Option<&str>) -> Duration {
    let secs = raw
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .unwrap_or(DEFAULT_RECONCILIATION_INTERVAL_SECS);
    Duration::from_secs(secs)
}

/// Accepts the usual spellings of true; anything else is false
pub fn parse_bool(raw: &str) -> bool {
    matches!(raw.trim(), "1" | "t" | "T" | "true" | "TRUE" | "True")
}
