mod cli;
mod json;

pub use cli::{print_cli_table, render_table};
pub use json::print_json;

use crate::model::VulnerabilityResponse;
use anyhow::Result;

/// Output format for lookup results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable table format
    Table,
    /// JSON response body, as a server would return it
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use 'table' or 'json'", s)),
        }
    }
}

pub fn print_result(
    response: &VulnerabilityResponse,
    checked: usize,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Table => print_cli_table(response, checked),
        OutputFormat::Json => print_json(response),
    }
}

/// Format result to string for file output
pub fn format_result_to_string(
    response: &VulnerabilityResponse,
    checked: usize,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(response)?),
        OutputFormat::Table => Ok(render_table(response, checked)),
    }
}
