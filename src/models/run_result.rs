//! Run result models for CellProfiler plate runs
//!
//! Defines per-plate outcomes and the summary of a whole run.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Outcome of one CellProfiler subprocess
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// Exited with status 0
    Success,
    /// Exited non-zero or was killed by a signal
    Failed,
    /// Could not be spawned or awaited
    Error,
}

impl RunStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            RunStatus::Success => "✓",
            RunStatus::Failed => "✗",
            RunStatus::Error => "!",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "SUCCESS"),
            RunStatus::Failed => write!(f, "FAILED"),
            RunStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Result of running CellProfiler over a single plate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlateRunResult {
    pub plate: String,
    pub status: RunStatus,
    pub exit_code: Option<i32>,
    pub duration_ms: u64,
    pub log_path: Option<PathBuf>,
    pub message: Option<String>,
}

impl PlateRunResult {
    pub fn success(plate: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            plate: plate.into(),
            status: RunStatus::Success,
            exit_code: Some(0),
            duration_ms,
            log_path: None,
            message: None,
        }
    }

    /// `exit_code` is `None` when the process was terminated by a signal
    pub fn failed(plate: impl Into<String>, duration_ms: u64, exit_code: Option<i32>) -> Self {
        let message = match exit_code {
            Some(code) => format!("CellProfiler exited with status {code}"),
            None => "CellProfiler was terminated by a signal".to_string(),
        };
        Self {
            plate: plate.into(),
            status: RunStatus::Failed,
            exit_code,
            duration_ms,
            log_path: None,
            message: Some(message),
        }
    }

    pub fn error(plate: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            plate: plate.into(),
            status: RunStatus::Error,
            exit_code: None,
            duration_ms: 0,
            log_path: None,
            message: Some(error.into()),
        }
    }

    pub fn with_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }
}

impl fmt::Display for PlateRunResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.plate,
            self.duration_ms
        )?;
        if let Some(msg) = &self.message {
            write!(f, " - {msg}")?;
        }
        Ok(())
    }
}

/// Summary of one run across all plates
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_name: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub errors: usize,
    pub total_duration_ms: u64,
    pub results: Vec<PlateRunResult>,
}

impl RunSummary {
    /// Build a summary; results are ordered by plate name
    pub fn new(
        run_name: impl Into<String>,
        started_at: DateTime<Utc>,
        mut results: Vec<PlateRunResult>,
    ) -> Self {
        results.sort_by(|a, b| a.plate.cmp(&b.plate));

        let count = |status: RunStatus| results.iter().filter(|r| r.status == status).count();
        let succeeded = count(RunStatus::Success);
        let failed = count(RunStatus::Failed);
        let errors = count(RunStatus::Error);
        let completed_at = Utc::now();
        let total_duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;

        Self {
            run_name: run_name.into(),
            started_at,
            completed_at,
            total: results.len(),
            succeeded,
            failed,
            errors,
            total_duration_ms,
            results,
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.succeeded as f64 / self.total as f64) * 100.0
        }
    }

    /// True when every plate succeeded (vacuously true for an empty run)
    pub fn is_all_succeeded(&self) -> bool {
        self.succeeded == self.total
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run '{}'", self.run_name)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for result in &self.results {
            writeln!(f, "  {result}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Success: {} | Failed: {} | Error: {}",
            self.total, self.succeeded, self.failed, self.errors
        )?;
        writeln!(f, "Duration: {}ms", self.total_duration_ms)
    }
}
