// crates/furrow-cli/src/output.rs
//
// Rendering for Furrow reports: every command builds one serializable
// report and hands it here, so `--format json` always prints the whole
// report and `--format table` prints the command's human layout.

use clap::ValueEnum;
use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format for CLI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable tables (default).
    Table,
    /// The full report as pretty JSON.
    Json,
}

/// Render `report` as JSON, or through `layout` for table output.
pub fn render<T: Serialize>(format: OutputFormat, report: &T, layout: impl FnOnce(&T) -> String) -> String {
    match format {
        OutputFormat::Json => format_json(report),
        OutputFormat::Table => layout(report),
    }
}

/// Rows as a rounded table, or a placeholder line when there are none.
pub fn format_table<T: Tabled>(rows: &[T]) -> String {
    if rows.is_empty() {
        return "(none)".to_string();
    }
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

/// `Label: value` pairs on one line.
pub fn summary_line(fields: &[(&str, String)]) -> String {
    fields
        .iter()
        .map(|(label, value)| format!("{}: {}", label, value))
        .collect::<Vec<_>>()
        .join("  |  ")
}

pub fn format_json<T: Serialize>(data: &T) -> String {
    serde_json::to_string_pretty(data).unwrap_or_else(|e| format!("JSON serialization error: {}", e))
}
