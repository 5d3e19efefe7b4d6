//! Operator health as reported by its probe endpoints

use anyhow::Result;
use colored::Colorize;
use scheduler_lib::{HealthResponse, ReadinessResponse};
use serde::Serialize;
use tabled::Tabled;

use crate::client::ApiClient;
use crate::output::{color_status, print_json, print_rows, OutputFormat};

#[derive(Serialize)]
struct StatusReport {
    health: HealthResponse,
    readiness: ReadinessResponse,
}

#[derive(Tabled)]
struct ComponentRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Since")]
    since: String,
    #[tabled(rename = "Message")]
    message: String,
}

pub async fn show_status(client: &ApiClient, format: OutputFormat) -> Result<()> {
    let health = client.health().await?;
    let readiness = client.readiness().await?;

    if format == OutputFormat::Json {
        print_json(&StatusReport { health, readiness });
        return Ok(());
    }

    let ready = if readiness.ready {
        "ready".green().to_string()
    } else {
        format!(
            "{} ({})",
            "not ready".red(),
            readiness.reason.as_deref().unwrap_or("no reason given")
        )
    };
    println!("{} {}", "Operator:".bold(), ready);
    println!("{} {}", "Overall:".bold(), color_status(&health.status.to_string()));
    match health.last_pass {
        Some(at) => println!("{} {}", "Last pass:".bold(), at.to_rfc3339()),
        None => println!("{} {}", "Last pass:".bold(), "never".yellow()),
    }
    println!();

    let rows: Vec<ComponentRow> = health
        .components
        .iter()
        .map(|(component, state)| ComponentRow {
            component: component.to_string(),
            status: color_status(&state.status.to_string()),
            since: state.since.format("%Y-%m-%d %H:%M:%S").to_string(),
            message: state.message.clone().unwrap_or_default(),
        })
        .collect();
    print_rows(&rows, "No components registered");
    Ok(())
}
