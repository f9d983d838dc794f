//! Configuration module
//!
//! Handles loading and managing configuration.

mod env;
mod file;

pub use env::{print_env_help, EnvConfig};
pub use file::ConfigFile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::executor::DEFAULT_CELLPROFILER;

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Label for the run, used in log file names and result records
    pub run_name: String,

    /// CellProfiler pipeline file
    pub pipeline: PathBuf,

    /// Directories of max-projected images, one per plate
    pub images_dirs: Vec<PathBuf>,

    /// Root directory for corrected images; one subdirectory per plate
    pub output_dir: PathBuf,

    /// Directory for per-plate CellProfiler logs
    pub log_dir: PathBuf,

    /// Directory for run records (defaults to the user data directory)
    pub results_dir: Option<PathBuf>,

    /// Maximum concurrent CellProfiler processes (one per plate when unset)
    pub max_concurrent: Option<usize>,

    /// CellProfiler invocation settings
    pub cellprofiler: CellProfilerConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            run_name: "illum_correction".to_string(),
            pipeline: PathBuf::from("./illum.cppipe"),
            images_dirs: vec![PathBuf::from(
                "../1.max_projection/Max_Projected_Images/NF0014",
            )],
            output_dir: PathBuf::from("./Corrected_Images"),
            log_dir: PathBuf::from("./logs"),
            results_dir: None,
            max_concurrent: None,
            cellprofiler: CellProfilerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Check values that would make a run impossible
    pub fn validate(&self) -> Result<()> {
        if self.run_name.trim().is_empty() {
            anyhow::bail!("run_name must not be empty");
        }
        if self.run_name.contains(['/', '\\']) {
            anyhow::bail!("run_name must not contain path separators: {}", self.run_name);
        }
        if matches!(self.run_name.as_str(), "." | "..") {
            anyhow::bail!("run_name must not be a relative directory: {}", self.run_name);
        }
        if self.images_dirs.is_empty() {
            anyhow::bail!("At least one images directory is required");
        }
        if self.max_concurrent == Some(0) {
            anyhow::bail!("max_concurrent must be at least 1");
        }
        if self.cellprofiler.binary.trim().is_empty() {
            anyhow::bail!("cellprofiler.binary must not be empty");
        }
        Ok(())
    }
}

/// CellProfiler invocation settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CellProfilerConfig {
    /// Executable name or path
    pub binary: String,

    /// Plugins directory passed as `--plugins-directory`
    pub plugins_dir: Option<PathBuf>,

    /// Extra arguments appended to every invocation
    pub extra_args: Vec<String>,
}

impl Default for CellProfilerConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_CELLPROFILER.to_string(),
            plugins_dir: None,
            extra_args: Vec::new(),
        }
    }
}
