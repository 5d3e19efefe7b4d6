//! Operator configuration
//!
//! Read from the process environment. Every value is optional and a bad value
//! falls back to its default, so a misconfigured variable never blocks
//! startup.

use anyhow::Result;
use scheduler_lib::SchedulerSettings;
use serde::Deserialize;

/// Port of the health and metrics server when `API_PORT` is unset
pub const DEFAULT_API_PORT: u16 = 8080;

/// Environment variables as read, before any parsing
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfig {
    /// `RECONCILIATION_DURATION`, seconds between timer-driven passes
    pub reconciliation_duration: Option<String>,
    /// `NAMESPACES_OFF_LIMITS`, comma-separated
    pub namespaces_off_limits: Option<String>,
    /// `DEBUG`
    pub debug: Option<String>,
    /// `API_PORT`
    pub api_port: Option<String>,
    /// `HOSTNAME`, the pod name when running in a cluster
    pub hostname: Option<String>,
    /// `TZ`, only reported; chrono reads it directly
    pub tz: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OperatorConfig {
    pub settings: SchedulerSettings,
    pub api_port: u16,
    /// Name this replica logs under
    pub instance: String,
    pub time_zone: Option<String>,
}

impl OperatorConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::load_from(config::Environment::default())
    }

    pub fn load_from(environment: config::Environment) -> Result<Self> {
        let config = config::Config::builder().add_source(environment).build()?;
        Ok(Self::from_raw(config.try_deserialize().unwrap_or_default()))
    }

    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            settings: SchedulerSettings::from_raw(
                raw.reconciliation_duration.as_deref(),
                raw.namespaces_off_limits.as_deref(),
                raw.debug.as_deref(),
            ),
            api_port: raw
                .api_port
                .as_deref()
                .and_then(|port| port.trim().parse().ok())
                .unwrap_or(DEFAULT_API_PORT),
            instance: raw
                .hostname
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| "workload-scheduler".to_string()),
            time_zone: raw.tz.filter(|tz| !tz.is_empty()),
        }
    }

    /// Default tracing filter directive
    pub fn log_level(&self) -> &'static str {
        if self.settings.debug {
            "debug"
        } else {
            "info"
        }
    }
}
