//! Parallel CellProfiler execution
//!
//! Runs one CellProfiler subprocess per plate with a bounded number of
//! concurrent processes. Failures are recorded per plate; nothing is retried.

#![allow(dead_code)]

use anyhow::{Context, Result};
use chrono::Utc;
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use super::command::{CellProfilerCommand, DEFAULT_CELLPROFILER};
use crate::config::AppConfig;
use crate::models::{PlateInfo, PlateInfoMap, PlateRunResult, RunSummary};
use crate::planner::ensure_dir;

/// Parallel CellProfiler runner
#[derive(Clone, Debug)]
pub struct ParallelExecutor {
    program: String,
    extra_args: Vec<String>,
    max_concurrent: Option<usize>,
    log_dir: PathBuf,
}

impl ParallelExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            extra_args: Vec::new(),
            max_concurrent: None,
            log_dir: PathBuf::from("logs"),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.cellprofiler.binary.clone())
            .with_extra_args(config.cellprofiler.extra_args.clone())
            .with_max_concurrent(config.max_concurrent)
            .with_log_dir(&config.log_dir)
    }

    /// Limit concurrent processes; `None` runs every plate at once
    pub fn with_max_concurrent(mut self, max: Option<usize>) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_extra_args(mut self, args: Vec<String>) -> Self {
        self.extra_args = args;
        self
    }

    /// Log file for a plate within a run
    pub fn log_path(&self, plate: &str, run_name: &str) -> PathBuf {
        self.log_dir.join(format!("{plate}_{run_name}.log"))
    }

    /// Command that would be run for a plate
    pub fn command_for(&self, info: &PlateInfo) -> CellProfilerCommand {
        CellProfilerCommand::for_plate(self.program.clone(), info, &self.extra_args)
    }

    fn permits(&self, plates: usize) -> usize {
        self.max_concurrent.unwrap_or(plates).clamp(1, plates.max(1))
    }

    /// Run CellProfiler over every plate in the map
    pub async fn run_cellprofiler_parallel(
        &self,
        plates: PlateInfoMap,
        run_name: &str,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();

        if plates.is_empty() {
            warn!("No plates to process for run '{}'", run_name);
            return Ok(RunSummary::new(run_name, started_at, Vec::new()));
        }

        ensure_dir(&self.log_dir).context("Failed to prepare log directory")?;

        let permits = self.permits(plates.len());
        info!(
            "Running {} CellProfiler process(es) for '{}' (max {} concurrent)",
            plates.len(),
            run_name,
            permits
        );

        let semaphore = Arc::new(Semaphore::new(permits));
        let start = Instant::now();
        let mut names = Vec::with_capacity(plates.len());
        let mut handles = Vec::with_capacity(plates.len());

        for (plate, info) in plates {
            let semaphore = semaphore.clone();
            let command = self.command_for(&info);
            let log_path = self.log_path(&plate, run_name);
            names.push(plate.clone());

            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return PlateRunResult::error(plate, e.to_string()),
                };
                run_plate(plate, command, log_path).await
            });

            handles.push(handle);
        }

        let results: Vec<PlateRunResult> = join_all(handles)
            .await
            .into_iter()
            .zip(names)
            .map(|(joined, plate)| {
                joined.unwrap_or_else(|e| PlateRunResult::error(plate, format!("Task failed: {e}")))
            })
            .collect();

        info!("All processes have been completed!");

        let summary = RunSummary::new(run_name, started_at, results);
        info!(
            "Run '{}' finished in {}ms - Success: {}/{}",
            run_name,
            start.elapsed().as_millis(),
            summary.succeeded,
            summary.total
        );

        Ok(summary)
    }
}

impl Default for ParallelExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_CELLPROFILER)
    }
}

async fn run_plate(plate: String, command: CellProfilerCommand, log_path: PathBuf) -> PlateRunResult {
    let (stdout, stderr) = match open_log(&log_path).await {
        Ok(pair) => pair,
        Err(e) => return PlateRunResult::error(plate, format!("{e:#}")),
    };

    debug!("Starting {}: {}", plate, command);
    let start = Instant::now();

    let status = command
        .to_command()
        .stdin(Stdio::null())
        .stdout(stdout)
        .stderr(stderr)
        .status()
        .await;

    let duration_ms = start.elapsed().as_millis() as u64;

    let result = match status {
        Ok(status) if status.success() => {
            info!("Plate {} completed in {}ms", plate, duration_ms);
            PlateRunResult::success(plate, duration_ms)
        }
        Ok(status) => {
            error!(
                "Plate {} failed ({}), see {}",
                plate,
                status,
                log_path.display()
            );
            PlateRunResult::failed(plate, duration_ms, status.code())
        }
        Err(e) => {
            error!("Failed to launch {} for plate {}: {}", command.program(), plate, e);
            PlateRunResult::error(plate, format!("Failed to launch {}: {e}", command.program()))
        }
    };

    result.with_log_path(log_path)
}

/// Log file handles for a subprocess's stdout and stderr
async fn open_log(path: &Path) -> Result<(Stdio, Stdio)> {
    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create log file: {}", path.display()))?
        .into_std()
        .await;
    let clone = file
        .try_clone()
        .with_context(|| format!("Failed to share log file: {}", path.display()))?;
    Ok((Stdio::from(file), Stdio::from(clone)))
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::models::RunStatus;
    use tempfile::tempdir;

    fn plates(names: &[&str]) -> PlateInfoMap {
        let mut map = PlateInfoMap::new();
        for name in names {
            map.insert(
                *name,
                PlateInfo::new(
                    format!("/data/{name}"),
                    format!("/out/{name}"),
                    "/pipelines/illum.cppipe",
                ),
            );
        }
        map
    }

    #[test]
    fn test_executor_from_config() {
        let mut config = AppConfig::default();
        config.max_concurrent = Some(2);
        config.log_dir = PathBuf::from("/tmp/illum-logs");

        let executor = ParallelExecutor::from_config(&config);
        assert_eq!(executor.program, "cellprofiler");
        assert_eq!(executor.max_concurrent, Some(2));
        assert_eq!(
            executor.log_path("NF0014", "illum_correction"),
            PathBuf::from("/tmp/illum-logs/NF0014_illum_correction.log")
        );
    }

    #[test]
    fn test_permits() {
        let executor = ParallelExecutor::default();
        assert_eq!(executor.permits(3), 3);
        assert_eq!(executor.permits(0), 1);

        let bounded = ParallelExecutor::default().with_max_concurrent(Some(2));
        assert_eq!(bounded.permits(5), 2);
        assert_eq!(bounded.permits(1), 1);

        let zero = ParallelExecutor::default().with_max_concurrent(Some(0));
        assert_eq!(zero.permits(4), 1);
    }

    #[test]
    fn test_empty_plate_map() {
        let dir = tempdir().unwrap();
        let executor = ParallelExecutor::default().with_log_dir(dir.path().join("logs"));

        let summary =
            tokio_test::block_on(executor.run_cellprofiler_parallel(PlateInfoMap::new(), "empty"))
                .unwrap();
        assert_eq!(summary.total, 0);
        assert!(!dir.path().join("logs").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_plates() {
        let dir = tempdir().unwrap();
        let executor = ParallelExecutor::new("true")
            .with_log_dir(dir.path().join("logs"))
            .with_max_concurrent(Some(1));

        let summary = executor
            .run_cellprofiler_parallel(plates(&["NF0016", "NF0014"]), "illum_correction")
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert!(summary.is_all_succeeded());
        assert_eq!(summary.results[0].plate, "NF0014");
        assert!(dir.path().join("logs/NF0014_illum_correction.log").is_file());
        assert!(dir.path().join("logs/NF0016_illum_correction.log").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_output_captured_in_plate_log() {
        let dir = tempdir().unwrap();
        let executor = ParallelExecutor::new("echo").with_log_dir(dir.path());

        let summary = executor
            .run_cellprofiler_parallel(plates(&["NF0014", "NF0016"]), "illum_correction")
            .await
            .unwrap();
        assert!(summary.is_all_succeeded());

        let log = std::fs::read_to_string(dir.path().join("NF0014_illum_correction.log")).unwrap();
        assert_eq!(
            log,
            "-c -r -p /pipelines/illum.cppipe -o /out/NF0014 -i /data/NF0014\n"
        );

        let log = std::fs::read_to_string(dir.path().join("NF0016_illum_correction.log")).unwrap();
        assert!(log.contains("-i /data/NF0016"));
        assert!(!log.contains("NF0014"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stderr_captured_in_plate_log() {
        let dir = tempdir().unwrap();
        let executor = ParallelExecutor::new("ls").with_log_dir(dir.path());

        let summary = executor
            .run_cellprofiler_parallel(plates(&["NF0014"]), "illum_correction")
            .await
            .unwrap();
        assert_eq!(summary.results[0].status, RunStatus::Failed);

        let log = std::fs::read_to_string(dir.path().join("NF0014_illum_correction.log")).unwrap();
        assert!(!log.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_plate() {
        let dir = tempdir().unwrap();
        let executor = ParallelExecutor::new("false").with_log_dir(dir.path());

        let summary = executor
            .run_cellprofiler_parallel(plates(&["NF0014"]), "illum_correction")
            .await
            .unwrap();

        let result = &summary.results[0];
        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.exit_code, Some(1));
        assert!(result.log_path.is_some());
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let dir = tempdir().unwrap();
        let executor =
            ParallelExecutor::new("illum-correct-no-such-binary").with_log_dir(dir.path());

        let summary = executor
            .run_cellprofiler_parallel(plates(&["NF0014", "NF0016"]), "illum_correction")
            .await
            .unwrap();

        assert_eq!(summary.errors, 2);
        assert!(summary.results.iter().all(|r| r.status == RunStatus::Error));
    }
}
