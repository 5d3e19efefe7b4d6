//! Workload scheduler operator
//!
//! Process configuration and the health/metrics HTTP surface. The binary in
//! `main.rs` wires these to the reconciliation loop from `scheduler-lib`.

pub mod api;
pub mod config;
