//! Run record storage and retrieval
//!
//! Persists one JSON record per run under `<base>/<run_name>/<run_id>.json`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::{PlateInfoMap, RunSummary};

/// Stored run with the plan it executed
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRecord {
    /// Unique run ID
    pub id: String,

    /// Run label
    pub run_name: String,

    /// CellProfiler executable used
    pub cellprofiler: String,

    /// Plates as handed to the runner
    pub plates: PlateInfoMap,

    /// Outcome of the run
    pub summary: RunSummary,

    /// Environment info
    pub environment: EnvironmentInfo,
}

/// Host information captured with each record
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl RunRecord {
    pub fn new(cellprofiler: impl Into<String>, plates: PlateInfoMap, summary: RunSummary) -> Self {
        Self {
            id: generate_run_id(&summary.started_at),
            run_name: summary.run_name.clone(),
            cellprofiler: cellprofiler.into(),
            plates,
            summary,
            environment: EnvironmentInfo::default(),
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.summary.started_at
    }
}

/// Generate unique run ID
fn generate_run_id(started_at: &DateTime<Utc>) -> String {
    let timestamp = started_at.format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Brief run information
#[derive(Clone, Debug)]
pub struct RunInfo {
    pub id: String,
    pub run_name: String,
    pub started_at: DateTime<Utc>,
    pub plates: usize,
    pub succeeded: usize,
}

impl From<&RunRecord> for RunInfo {
    fn from(record: &RunRecord) -> Self {
        Self {
            id: record.id.clone(),
            run_name: record.run_name.clone(),
            started_at: record.started_at(),
            plates: record.summary.total,
            succeeded: record.summary.succeeded,
        }
    }
}

/// Export format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(ExportFormat::Json),
            "csv" => Some(ExportFormat::Csv),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_str)
    }
}

/// Run record storage manager
pub struct ResultsStorage {
    base_dir: PathBuf,
}

impl ResultsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Storage under the user data directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("illum-correct")
            .join("results");
        Self::new(base_dir)
    }

    /// Configured directory, falling back to the user data directory
    pub fn from_option(dir: Option<&Path>) -> Self {
        match dir {
            Some(dir) => Self::new(dir),
            None => Self::default_dir(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn run_dir(&self, run_name: &str) -> PathBuf {
        self.base_dir.join(run_name)
    }

    fn record_path(&self, run_name: &str, run_id: &str) -> PathBuf {
        self.run_dir(run_name).join(format!("{run_id}.json"))
    }

    /// Save a run record
    pub fn save(&self, record: &RunRecord) -> Result<PathBuf> {
        let run_dir = self.run_dir(&record.run_name);
        fs::create_dir_all(&run_dir)
            .with_context(|| format!("Failed to create results directory: {}", run_dir.display()))?;

        let path = self.record_path(&record.run_name, &record.id);
        let file = File::create(&path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);

        serde_json::to_writer_pretty(writer, record).context("Failed to write results")?;

        info!("Saved run record to {}", path.display());
        Ok(path)
    }

    /// Load a run record
    pub fn load(&self, run_name: &str, run_id: &str) -> Result<RunRecord> {
        let path = self.record_path(run_name, run_id);
        let record = self.load_from_path(&path)?;
        debug!("Loaded run record from {}", path.display());
        Ok(record)
    }

    /// Load from a specific path
    pub fn load_from_path(&self, path: &Path) -> Result<RunRecord> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open results file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse results: {}", path.display()))
    }

    /// Load all records for a run name, newest first
    pub fn load_runs(&self, run_name: &str) -> Result<Vec<RunRecord>> {
        let run_dir = self.run_dir(run_name);
        if !run_dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in fs::read_dir(&run_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match self.load_from_path(&path) {
                    Ok(record) => records.push(record),
                    Err(e) => debug!("Skipping {}: {:#}", path.display(), e),
                }
            }
        }

        records.sort_by(|a, b| b.started_at().cmp(&a.started_at()));
        Ok(records)
    }

    /// Brief listing of records for a run name, newest first
    pub fn list_runs(&self, run_name: &str) -> Result<Vec<RunInfo>> {
        Ok(self.load_runs(run_name)?.iter().map(RunInfo::from).collect())
    }

    /// Most recent record for a run name
    pub fn latest(&self, run_name: &str) -> Result<Option<RunRecord>> {
        Ok(self.load_runs(run_name)?.into_iter().next())
    }

    /// All run names with stored records
    pub fn list_run_names(&self) -> Result<Vec<String>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Export a record to a file
    pub fn export(&self, record: &RunRecord, path: &Path, format: ExportFormat) -> Result<()> {
        match format {
            ExportFormat::Json => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                serde_json::to_writer_pretty(BufWriter::new(file), record)?;
            }
            ExportFormat::Csv => {
                let mut writer = csv::Writer::from_path(path)?;

                writer.write_record([
                    "run_id",
                    "plate",
                    "status",
                    "exit_code",
                    "duration_ms",
                    "path_to_images",
                    "path_to_output",
                    "log_path",
                    "message",
                ])?;

                for result in &record.summary.results {
                    let info = record.plates.get(&result.plate);
                    writer.write_record([
                        record.id.clone(),
                        result.plate.clone(),
                        result.status.to_string(),
                        result.exit_code.map(|c| c.to_string()).unwrap_or_default(),
                        result.duration_ms.to_string(),
                        info.map(|i| i.path_to_images.display().to_string())
                            .unwrap_or_default(),
                        info.map(|i| i.path_to_output.display().to_string())
                            .unwrap_or_default(),
                        result
                            .log_path
                            .as_ref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_default(),
                        result.message.clone().unwrap_or_default(),
                    ])?;
                }
                writer.flush()?;
            }
        }

        info!("Exported run record to {}", path.display());
        Ok(())
    }
}
