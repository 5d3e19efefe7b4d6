//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    Json,
}

/// Print rows as a table, or the whole value as JSON
pub fn print_rows<T: Tabled>(rows: &[T], empty_message: &str) {
    if rows.is_empty() {
        println!("{}", empty_message.yellow());
        return;
    }
    println!("{}", Table::new(rows).with(Style::rounded()));
}

pub fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => print_error(&format!("Failed to serialize output: {}", e)),
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Color status based on value
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "healthy" | "valid" | "ready" => status.green().to_string(),
        "degraded" | "unchanged" => status.yellow().to_string(),
        "unhealthy" | "invalid" | "failed" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// `from -> to`, colored by direction
pub fn format_change(from: i32, to: i32) -> String {
    let arrow = format!("{} -> {}", from, to);
    if to > from {
        arrow.green().to_string()
    } else {
        arrow.yellow().to_string()
    }
}
