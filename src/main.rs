//! illum-correct - CellProfiler illumination correction launcher
//!
//! Resolves a plate's pipeline and image paths, builds the plate map, and
//! runs CellProfiler headless over each plate in parallel.
//!
//! ## Usage
//!
//! ```bash
//! # Correct the default plate with the default pipeline
//! illum-correct run
//!
//! # Several plates, two CellProfiler processes at a time
//! illum-correct run -i ../1.max_projection/Max_Projected_Images/NF0014 \
//!                   -i ../1.max_projection/Max_Projected_Images/NF0016 -j 2
//!
//! # Inspect the plate map without running anything
//! illum-correct plan --format json-pretty
//!
//! # Show the latest stored run
//! illum-correct results --run-name illum_correction
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use tracing::{info, warn};

mod cli;
mod config;
mod executor;
mod models;
mod output;
mod planner;
mod results;
mod utils;

use cli::Args;
use config::{AppConfig, ConfigFile, EnvConfig};
use executor::ParallelExecutor;
use models::PlateInfoMap;
use output::{OutputFormat, ResultFormatter};
use planner::PlatePlanner;
use results::{ExportFormat, ResultsStorage, RunRecord};
use utils::{init_logger, LogLevel, Timer};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let env = EnvConfig::load();

    init_logger(LogLevel::resolve(
        args.verbose,
        args.log_level.as_deref().or(env.log_level.as_deref()),
    ));

    let config_path = args.config.clone().or_else(|| env.config_file.clone());

    match args.command {
        cli::Command::Run(run_args) => {
            let mut config = load_config(config_path.as_deref(), &env)?;
            run_args.apply_to(&mut config);
            config.validate()?;
            run(config, run_args).await?;
        }
        cli::Command::Plan(plan_args) => {
            let mut config = load_config(config_path.as_deref(), &env)?;
            plan_args.plates.apply_to(&mut config);
            config.validate()?;
            let plates = plan(&config)?;
            println!("{}", formatter(&plan_args.format).format_plan(&plates));
        }
        cli::Command::Config(config_args) => {
            manage_config(config_args, config_path.as_deref(), &env)?;
        }
        cli::Command::Results(results_args) => {
            let config = load_config(config_path.as_deref(), &env)?;
            show_results(results_args, &config)?;
        }
    }

    Ok(())
}

/// File (or defaults), then environment overrides
fn load_config(path: Option<&Path>, env: &EnvConfig) -> Result<AppConfig> {
    let mut config = ConfigFile::load_or_default(path)?.app;
    env.apply_to(&mut config);
    Ok(config)
}

fn formatter(format: &str) -> ResultFormatter {
    let format = OutputFormat::from_str(format).unwrap_or_else(|| {
        warn!("Unknown output format '{}', using table", format);
        OutputFormat::Table
    });
    ResultFormatter::new(format)
}

fn plan(config: &AppConfig) -> Result<PlateInfoMap> {
    let planner = PlatePlanner::new(&config.pipeline, &config.output_dir)
        .with_plugins(config.cellprofiler.plugins_dir.clone());

    let plates = planner
        .plan_plates(&config.images_dirs)
        .context("Failed to plan plates")?;

    Ok(plates)
}

async fn run(config: AppConfig, args: cli::RunArgs) -> Result<()> {
    let timer = Timer::start(format!("Run '{}'", config.run_name));
    let formatter = formatter(&args.format);

    let plates = plan(&config)?;
    info!("Plate map:\n{}", plates);

    let executor = ParallelExecutor::from_config(&config);

    if args.dry_run {
        for (name, info) in &plates {
            println!("# {name} -> {}", executor.log_path(name, &config.run_name).display());
            println!("{}", executor.command_for(info));
        }
        return Ok(());
    }

    let summary = executor
        .run_cellprofiler_parallel(plates.clone(), &config.run_name)
        .await?;

    println!("{}", formatter.format_summary(&summary));

    if let Some(path) = &args.summary_file {
        let format = match ExportFormat::from_extension(path) {
            Some(ExportFormat::Csv) => OutputFormat::Csv,
            _ => OutputFormat::JsonPretty,
        };
        output::write_summary_to_file(path, &summary, format)?;
    }

    if !args.no_save {
        let storage = ResultsStorage::from_option(config.results_dir.as_deref());
        let record = RunRecord::new(config.cellprofiler.binary.clone(), plates, summary.clone());
        if let Err(e) = storage.save(&record) {
            warn!("Failed to store run record: {:#}", e);
        }
    }

    timer.stop();

    if !summary.is_all_succeeded() {
        anyhow::bail!(
            "{} of {} plate(s) did not complete successfully",
            summary.total - summary.succeeded,
            summary.total
        );
    }

    Ok(())
}

fn manage_config(args: cli::ConfigArgs, path: Option<&Path>, env: &EnvConfig) -> Result<()> {
    match args.action {
        cli::ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "Configuration file already exists: {}. Use --force to overwrite.",
                    output.display()
                );
            }

            ConfigFile::example().save(&output)?;
            println!("✓ Configuration file created: {}", output.display());
            println!("\nEdit the file to customize your settings.");
        }

        cli::ConfigAction::Show { env: show_env, format } => {
            if show_env {
                if !env.has_any() {
                    println!("No ILLUM_CORRECT_* variables are set.\n");
                }
                env.print_summary();
            } else {
                let mut config = ConfigFile::load_or_default(path)?;
                env.apply_to(&mut config.app);
                let output = if format == "json" {
                    serde_json::to_string_pretty(&config)?
                } else {
                    serde_yaml::to_string(&config)?
                };
                println!("{output}");
            }
        }

        cli::ConfigAction::Validate { file } => {
            let file = file
                .or_else(|| path.map(Path::to_path_buf))
                .or_else(ConfigFile::find)
                .context("No configuration file found")?;

            match ConfigFile::load(&file) {
                Ok(_) => println!("✓ Configuration file is valid: {}", file.display()),
                Err(e) => {
                    println!("✗ Configuration file is invalid: {}", file.display());
                    println!("  Error: {e:#}");
                    return Err(e);
                }
            }
        }

        cli::ConfigAction::Env => config::print_env_help(),
    }

    Ok(())
}

fn show_results(args: cli::ResultsArgs, config: &AppConfig) -> Result<()> {
    let storage = ResultsStorage::from_option(config.results_dir.as_deref());

    let Some(run_name) = args.run_name else {
        let names = storage.list_run_names()?;
        if names.is_empty() {
            println!("\nNo stored runs in {}", storage.base_dir().display());
            println!("   Run CellProfiler with: illum-correct run");
            return Ok(());
        }

        println!("\nStored runs in {}:\n", storage.base_dir().display());
        for name in names {
            for run in storage.list_runs(&name)? {
                println!(
                    "  {:20} {:22} {}  {}/{} plate(s) succeeded",
                    run.run_name,
                    run.id,
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.succeeded,
                    run.plates
                );
            }
        }
        println!("\nUse --run-name <name> to view a run.\n");
        return Ok(());
    };

    let record = match &args.id {
        Some(id) => storage.load(&run_name, id)?,
        None => storage
            .latest(&run_name)?
            .with_context(|| format!("No stored runs named '{run_name}'"))?,
    };

    println!("{}", formatter(&args.format).format_summary(&record.summary));

    if let Some(path) = &args.export {
        let format = ExportFormat::from_extension(path).unwrap_or(ExportFormat::Json);
        storage.export(&record, path, format)?;
        println!("✓ Exported run {} to {}", record.id, path.display());
    }

    Ok(())
}
