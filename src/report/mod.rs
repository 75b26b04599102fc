mod structured;
mod table;

pub use structured::{JsonReporter, YamlReporter};
pub use table::TableReporter;

use crate::analysis::{GroupedResults, RunError};
use colored::Colorize;
use std::str::FromStr;
use thiserror::Error;

/// Output format for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(ReportFormat::Table),
            "json" => Ok(ReportFormat::Json),
            "yaml" | "yml" => Ok(ReportFormat::Yaml),
            other => Err(format!(
                "unknown output format '{}', expected table, json or yaml",
                other
            )),
        }
    }
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Failed to encode JSON report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to encode YAML report: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Renders grouped results in the chosen format
pub struct Reporter {
    format: ReportFormat,
    show_reason: bool,
    color: bool,
}

impl Reporter {
    pub fn new(format: ReportFormat) -> Self {
        Self {
            format,
            show_reason: false,
            color: true,
        }
    }

    /// Add a REASON column to tables; structured output never carries reasons
    pub fn with_show_reason(mut self, show: bool) -> Self {
        self.show_reason = show;
        self
    }

    /// Render tables without escape codes, for destinations other than a
    /// terminal
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn render(&self, results: &GroupedResults) -> Result<String, ReportError> {
        match self.format {
            ReportFormat::Table => Ok(TableReporter::new(self.show_reason)
                .with_color(self.color)
                .render(results)),
            ReportFormat::Json => JsonReporter.render(results),
            ReportFormat::Yaml => YamlReporter.render(results),
        }
    }
}

/// Print per-unit errors to stderr, after the report
pub fn print_errors(errors: &[RunError]) {
    if errors.is_empty() {
        return;
    }

    eprintln!();
    eprintln!(
        "{}",
        format!("{} error(s) during the run:", errors.len())
            .red()
            .bold()
    );
    for error in errors {
        eprintln!("  {} {}", "✗".red(), error);
    }
}
