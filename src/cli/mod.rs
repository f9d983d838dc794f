//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// Illumination correction launcher for CellProfiler
#[derive(Parser, Debug)]
#[command(name = "illum-correct")]
#[command(version)]
#[command(about = "Run CellProfiler illumination correction over plate image sets")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Configuration file (defaults to the standard search locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Plan plates and run CellProfiler on each
    Run(RunArgs),

    /// Resolve paths and print the plate map without running anything
    Plan(PlanArgs),

    /// Manage the configuration file
    Config(ConfigArgs),

    /// View stored run records
    Results(ResultsArgs),
}

/// Path and CellProfiler overrides shared by `run` and `plan`
#[derive(ClapArgs, Debug, Default)]
pub struct PlateArgs {
    /// CellProfiler pipeline file
    #[arg(short, long)]
    pub pipeline: Option<PathBuf>,

    /// Images directory; repeat for several plates
    #[arg(short, long = "images")]
    pub images: Vec<PathBuf>,

    /// Output root directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Run label used in log and record names
    #[arg(short = 'n', long)]
    pub run_name: Option<String>,

    /// CellProfiler plugins directory
    #[arg(long)]
    pub plugins: Option<PathBuf>,
}

impl PlateArgs {
    /// Overlay the flags that were given onto a configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(pipeline) = &self.pipeline {
            config.pipeline = pipeline.clone();
        }
        if !self.images.is_empty() {
            config.images_dirs = self.images.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(run_name) = &self.run_name {
            config.run_name = run_name.clone();
        }
        if let Some(plugins) = &self.plugins {
            config.cellprofiler.plugins_dir = Some(plugins.clone());
        }
    }
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub plates: PlateArgs,

    /// CellProfiler executable
    #[arg(long)]
    pub cellprofiler: Option<String>,

    /// Maximum concurrent CellProfiler processes
    #[arg(short = 'j', long)]
    pub max_concurrent: Option<usize>,

    /// Directory for per-plate CellProfiler logs
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Print the commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Do not store a run record
    #[arg(long)]
    pub no_save: bool,

    /// Write the run summary to a file as well
    #[arg(long)]
    pub summary_file: Option<PathBuf>,

    /// Output format (table, json, json-pretty, yaml, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

impl RunArgs {
    pub fn apply_to(&self, config: &mut AppConfig) {
        self.plates.apply_to(config);
        if let Some(binary) = &self.cellprofiler {
            config.cellprofiler.binary = binary.clone();
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = Some(max);
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = log_dir.clone();
        }
    }
}

/// Arguments for plan command
#[derive(Parser, Debug)]
pub struct PlanArgs {
    #[command(flatten)]
    pub plates: PlateArgs,

    /// Output format (table, json, json-pretty, yaml, csv, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,
}

/// Arguments for config management
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "./illum-correct.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Show environment variable overrides instead
        #[arg(short, long)]
        env: bool,

        /// Output format (yaml, json)
        #[arg(short, long, default_value = "yaml")]
        format: String,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate (defaults to the first file found)
        file: Option<PathBuf>,
    },

    /// List supported environment variables
    Env,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    /// Run name to show (lists all run names when omitted)
    #[arg(short = 'n', long)]
    pub run_name: Option<String>,

    /// Specific run ID (defaults to the latest run)
    #[arg(long)]
    pub id: Option<String>,

    /// Output format for the selected run
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Export the selected run to a file (.json or .csv)
    #[arg(short, long)]
    pub export: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_parsing() {
        let args = Args::parse_from([
            "illum-correct",
            "run",
            "--pipeline",
            "illum.cppipe",
            "-i",
            "/data/NF0014",
            "-i",
            "/data/NF0016",
            "-j",
            "2",
            "--dry-run",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.plates.pipeline, Some(PathBuf::from("illum.cppipe")));
                assert_eq!(run.plates.images.len(), 2);
                assert_eq!(run.max_concurrent, Some(2));
                assert!(run.dry_run);
                assert_eq!(run.format, "table");
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = Args::parse_from(["illum-correct", "plan", "--verbose", "-c", "cfg.yaml"]);
        assert!(args.verbose);
        assert_eq!(args.config, Some(PathBuf::from("cfg.yaml")));
        assert!(matches!(args.command, Command::Plan(_)));
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from([
            "illum-correct",
            "run",
            "--images",
            "/data/NF0020",
            "--cellprofiler",
            "/opt/cp/bin/cellprofiler",
            "--run-name",
            "illum_rerun",
        ]);
        let Command::Run(run) = args.command else {
            panic!("Expected Run command");
        };

        let mut config = AppConfig::default();
        run.apply_to(&mut config);
        assert_eq!(config.images_dirs, vec![PathBuf::from("/data/NF0020")]);
        assert_eq!(config.cellprofiler.binary, "/opt/cp/bin/cellprofiler");
        assert_eq!(config.run_name, "illum_rerun");
        assert_eq!(config.pipeline, PathBuf::from("./illum.cppipe"));
    }

    #[test]
    fn test_config_init_args() {
        let args = Args::parse_from(["illum-correct", "config", "init", "--force"]);
        match args.command {
            Command::Config(ConfigArgs {
                action: ConfigAction::Init { output, force },
            }) => {
                assert_eq!(output, PathBuf::from("./illum-correct.yaml"));
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
