//! Workload scheduler CLI
//!
//! Validates and dry-runs schedules, either from manifest files or against
//! a live cluster, and reports the health of a running operator.

mod client;
mod commands;
mod config;
mod manifests;
mod output;

use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use clap::{Parser, Subcommand};
use commands::plan::Source;
use commands::{crds, instant_or_now, parse_instant, plan, status, validate};
use std::path::PathBuf;

/// Workload scheduler CLI
#[derive(Parser)]
#[command(name = "wsctl")]
#[command(author, version, about = "CLI for the time-based workload scheduler", long_about = None)]
pub struct Cli {
    /// Operator API endpoint URL (can also be set via WSCTL_API_URL env var)
    #[arg(long, env = "WSCTL_API_URL", default_value = "http://localhost:8080")]
    pub api_url: String,

    /// Path to kubeconfig file (uses default if not specified)
    #[arg(long, env = "KUBECONFIG")]
    pub kubeconfig: Option<String>,

    /// Kubeconfig context to use
    #[arg(long)]
    pub context: Option<String>,

    /// Output format
    #[arg(long, short, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the CustomResourceDefinitions as YAML
    Crds,

    /// Validate Schedule and WorkloadSchedule manifests
    Validate {
        /// Manifest files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Evaluate relative dates at this RFC 3339 instant instead of now
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<FixedOffset>>,
    },

    /// Show the replica changes a pass would make, without making them
    Plan {
        /// Read objects from manifest files instead of the cluster
        #[arg(long = "manifests", short = 'm')]
        manifests: Vec<PathBuf>,

        /// Evaluate at this RFC 3339 instant instead of now
        #[arg(long, value_parser = parse_instant)]
        at: Option<DateTime<FixedOffset>>,

        /// Comma-separated namespaces never scaled (kube-system always is)
        #[arg(long, env = "NAMESPACES_OFF_LIMITS")]
        namespaces_off_limits: Option<String>,
    },

    /// Show operator health and readiness
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crds => crds::print_crds()?,
        Commands::Validate { files, at } => {
            validate::validate_files(&files, &instant_or_now(at), cli.format).await?;
        }
        Commands::Plan {
            manifests,
            at,
            namespaces_off_limits,
        } => {
            let source = if manifests.is_empty() {
                Source::Cluster {
                    kubeconfig: cli.kubeconfig.as_deref(),
                    context: cli.context.as_deref(),
                }
            } else {
                Source::Manifests(&manifests)
            };
            let summary = plan::plan(source, namespaces_off_limits.as_deref(), &instant_or_now(at)).await?;
            plan::print_plan(&summary, cli.format, cli.verbose);
        }
        Commands::Status => {
            let client = client::ApiClient::new(&cli.api_url)?;
            status::show_status(&client, cli.format).await?;
        }
    }

    Ok(())
}
