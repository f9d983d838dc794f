//! Output formatters for plate maps and run results
//!
//! Provides table, JSON, YAML, CSV, and summary output formats.

#![allow(dead_code)]

use anyhow::{Context, Result};
use std::path::Path;
use tracing::warn;

use crate::models::{PlateInfoMap, PlateRunResult, RunStatus, RunSummary};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Yaml,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "yaml" | "yml" => Some(OutputFormat::Yaml),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Formatter for plans and run results
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format the plate map handed to the runner
    pub fn format_plan(&self, plates: &PlateInfoMap) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string(plates).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(plates).unwrap_or_default(),
            OutputFormat::Yaml => serde_yaml::to_string(plates).unwrap_or_default(),
            OutputFormat::Csv => csv_or_empty(plan_csv(plates)),
            OutputFormat::Summary => format!(
                "{} plate(s): {}",
                plates.len(),
                plates.names().collect::<Vec<_>>().join(", ")
            ),
            OutputFormat::Table => plates.to_string(),
        }
    }

    fn status_label(&self, status: RunStatus) -> String {
        let label = format!("{} {:7}", status.symbol(), status.to_string());
        if !self.colorize {
            return label;
        }
        match status {
            RunStatus::Success => format!("\x1b[32m{label}\x1b[0m"),
            RunStatus::Failed | RunStatus::Error => format!("\x1b[31m{label}\x1b[0m"),
        }
    }

    fn format_result_table(&self, result: &PlateRunResult) -> String {
        format!(
            "{:20} {} [{:>8}ms]",
            result.plate,
            self.status_label(result.status),
            result.duration_ms
        )
    }

    /// Format a run summary
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(summary).unwrap_or_default(),
            OutputFormat::Yaml => serde_yaml::to_string(summary).unwrap_or_default(),
            OutputFormat::Csv => csv_or_empty(summary_csv(summary)),
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        output.push_str("\n╔══════════════════════════════════════════════════════════════╗\n");
        output.push_str(&format!("║  Run: {:54} ║\n", summary.run_name));
        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");

        for result in &summary.results {
            output.push_str(&format!("║  {}\n", self.format_result_table(result)));
            if let Some(log) = &result.log_path {
                output.push_str(&format!("║      log: {}\n", log.display()));
            }
        }

        output.push_str("╠══════════════════════════════════════════════════════════════╣\n");
        output.push_str(&format!(
            "║  Total: {:3} | Success: {:3} | Failed: {:3} | Error: {:3}        ║\n",
            summary.total, summary.succeeded, summary.failed, summary.errors
        ));
        output.push_str(&format!(
            "║  Duration: {:10}ms                                      ║\n",
            summary.total_duration_ms
        ));
        output.push_str("╚══════════════════════════════════════════════════════════════╝\n");

        output
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "{}: {}/{} plate(s) succeeded ({:.1}%) in {}ms",
            summary.run_name,
            summary.succeeded,
            summary.total,
            summary.success_rate(),
            summary.total_duration_ms
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn result_record(result: &PlateRunResult) -> [String; 6] {
    [
        result.plate.clone(),
        result.status.to_string(),
        result.exit_code.map(|c| c.to_string()).unwrap_or_default(),
        result.duration_ms.to_string(),
        result
            .log_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default(),
        result.message.clone().unwrap_or_default(),
    ]
}

fn plan_csv(plates: &PlateInfoMap) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "plate",
        "path_to_images",
        "path_to_output",
        "path_to_pipeline",
        "path_to_plugins",
    ])?;
    for (name, info) in plates {
        writer.write_record([
            name.clone(),
            info.path_to_images.display().to_string(),
            info.path_to_output.display().to_string(),
            info.path_to_pipeline.display().to_string(),
            info.path_to_plugins
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        ])?;
    }
    into_string(writer)
}

fn summary_csv(summary: &RunSummary) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record([
        "plate",
        "status",
        "exit_code",
        "duration_ms",
        "log_path",
        "message",
    ])?;
    for result in &summary.results {
        writer.write_record(result_record(result))?;
    }
    into_string(writer)
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> Result<String> {
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Failed to flush CSV output: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

fn csv_or_empty(csv: Result<String>) -> String {
    csv.unwrap_or_else(|e| {
        warn!("Failed to format CSV: {:#}", e);
        String::new()
    })
}

/// Write a run summary to a file
pub fn write_summary_to_file(
    path: &Path,
    summary: &RunSummary,
    format: OutputFormat,
) -> Result<()> {
    let content = match format {
        OutputFormat::Csv => summary_csv(summary)?,
        _ => ResultFormatter::new(format).no_color().format_summary(summary),
    };

    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;

    Ok(())
}
