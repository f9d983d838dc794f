//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;
use std::path::PathBuf;

use super::AppConfig;

/// Environment variable prefix
const ENV_PREFIX: &str = "ILLUM_CORRECT";

/// Configuration overrides read from environment variables
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EnvConfig {
    /// ILLUM_CORRECT_CONFIG
    pub config_file: Option<PathBuf>,
    /// ILLUM_CORRECT_RUN_NAME
    pub run_name: Option<String>,
    /// ILLUM_CORRECT_PIPELINE
    pub pipeline: Option<PathBuf>,
    /// ILLUM_CORRECT_IMAGES (comma-separated)
    pub images_dirs: Option<Vec<PathBuf>>,
    /// ILLUM_CORRECT_OUTPUT
    pub output_dir: Option<PathBuf>,
    /// ILLUM_CORRECT_LOG_DIR
    pub log_dir: Option<PathBuf>,
    /// ILLUM_CORRECT_RESULTS_DIR
    pub results_dir: Option<PathBuf>,
    /// ILLUM_CORRECT_MAX_CONCURRENT
    pub max_concurrent: Option<usize>,
    /// ILLUM_CORRECT_CELLPROFILER
    pub cellprofiler: Option<String>,
    /// ILLUM_CORRECT_PLUGINS
    pub plugins_dir: Option<PathBuf>,
    /// ILLUM_CORRECT_LOG
    pub log_level: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load using a custom variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |name: &str| {
            lookup(&format!("{ENV_PREFIX}_{name}")).filter(|v| !v.trim().is_empty())
        };

        Self {
            config_file: get("CONFIG").map(PathBuf::from),
            run_name: get("RUN_NAME"),
            pipeline: get("PIPELINE").map(PathBuf::from),
            images_dirs: get("IMAGES").map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(PathBuf::from)
                    .collect()
            }),
            output_dir: get("OUTPUT").map(PathBuf::from),
            log_dir: get("LOG_DIR").map(PathBuf::from),
            results_dir: get("RESULTS_DIR").map(PathBuf::from),
            max_concurrent: get("MAX_CONCURRENT").and_then(|v| v.trim().parse().ok()),
            cellprofiler: get("CELLPROFILER"),
            plugins_dir: get("PLUGINS").map(PathBuf::from),
            log_level: get("LOG"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self != &Self::default()
    }

    /// Overlay the set variables onto a configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(run_name) = &self.run_name {
            config.run_name = run_name.clone();
        }
        if let Some(pipeline) = &self.pipeline {
            config.pipeline = pipeline.clone();
        }
        if let Some(images) = &self.images_dirs {
            config.images_dirs = images.clone();
        }
        if let Some(output) = &self.output_dir {
            config.output_dir = output.clone();
        }
        if let Some(log_dir) = &self.log_dir {
            config.log_dir = log_dir.clone();
        }
        if let Some(results_dir) = &self.results_dir {
            config.results_dir = Some(results_dir.clone());
        }
        if let Some(max) = self.max_concurrent {
            config.max_concurrent = Some(max);
        }
        if let Some(binary) = &self.cellprofiler {
            config.cellprofiler.binary = binary.clone();
        }
        if let Some(plugins) = &self.plugins_dir {
            config.cellprofiler.plugins_dir = Some(plugins.clone());
        }
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {}_CONFIG:         {:?}", ENV_PREFIX, self.config_file);
        println!("  {}_RUN_NAME:       {:?}", ENV_PREFIX, self.run_name);
        println!("  {}_PIPELINE:       {:?}", ENV_PREFIX, self.pipeline);
        println!("  {}_IMAGES:         {:?}", ENV_PREFIX, self.images_dirs);
        println!("  {}_OUTPUT:         {:?}", ENV_PREFIX, self.output_dir);
        println!("  {}_LOG_DIR:        {:?}", ENV_PREFIX, self.log_dir);
        println!("  {}_RESULTS_DIR:    {:?}", ENV_PREFIX, self.results_dir);
        println!("  {}_MAX_CONCURRENT: {:?}", ENV_PREFIX, self.max_concurrent);
        println!("  {}_CELLPROFILER:   {:?}", ENV_PREFIX, self.cellprofiler);
        println!("  {}_PLUGINS:        {:?}", ENV_PREFIX, self.plugins_dir);
        println!("  {}_LOG:            {:?}", ENV_PREFIX, self.log_level);
    }
}

/// Print all ILLUM_CORRECT environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_CONFIG          Path to configuration file");
    println!("  {ENV_PREFIX}_RUN_NAME        Run label (default: illum_correction)");
    println!("  {ENV_PREFIX}_PIPELINE        CellProfiler pipeline file");
    println!("  {ENV_PREFIX}_IMAGES          Image directories, comma-separated");
    println!("  {ENV_PREFIX}_OUTPUT          Output root directory");
    println!("  {ENV_PREFIX}_LOG_DIR         CellProfiler log directory");
    println!("  {ENV_PREFIX}_RESULTS_DIR     Run record directory");
    println!("  {ENV_PREFIX}_MAX_CONCURRENT  Maximum concurrent CellProfiler processes");
    println!("  {ENV_PREFIX}_CELLPROFILER    CellProfiler executable");
    println!("  {ENV_PREFIX}_PLUGINS         CellProfiler plugins directory");
    println!("  {ENV_PREFIX}_LOG             Log level (trace, debug, info, warn, error)");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_CELLPROFILER=/opt/conda/bin/cellprofiler");
    println!("  illum-correct run");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.run_name.is_none());
        assert!(!config.has_any());
    }

    #[test]
    fn test_from_lookup() {
        let config = EnvConfig::from_lookup(lookup(&[
            ("ILLUM_CORRECT_RUN_NAME", "illum_rerun"),
            ("ILLUM_CORRECT_IMAGES", "/data/NF0014, /data/NF0016,"),
            ("ILLUM_CORRECT_MAX_CONCURRENT", "3"),
            ("ILLUM_CORRECT_CELLPROFILER", ""),
        ]));

        assert!(config.has_any());
        assert_eq!(config.run_name.as_deref(), Some("illum_rerun"));
        assert_eq!(
            config.images_dirs,
            Some(vec![PathBuf::from("/data/NF0014"), PathBuf::from("/data/NF0016")])
        );
        assert_eq!(config.max_concurrent, Some(3));
        assert!(config.cellprofiler.is_none());
    }

    #[test]
    fn test_unparsable_number_is_ignored() {
        let config = EnvConfig::from_lookup(lookup(&[("ILLUM_CORRECT_MAX_CONCURRENT", "many")]));
        assert!(config.max_concurrent.is_none());
    }

    #[test]
    fn test_apply_to() {
        let env = EnvConfig {
            output_dir: Some(PathBuf::from("/scratch/Corrected_Images")),
            cellprofiler: Some("/opt/cp/bin/cellprofiler".to_string()),
            plugins_dir: Some(PathBuf::from("/opt/cp/plugins")),
            ..Default::default()
        };

        let mut config = AppConfig::default();
        env.apply_to(&mut config);

        assert_eq!(config.output_dir, PathBuf::from("/scratch/Corrected_Images"));
        assert_eq!(config.cellprofiler.binary, "/opt/cp/bin/cellprofiler");
        assert_eq!(
            config.cellprofiler.plugins_dir,
            Some(PathBuf::from("/opt/cp/plugins"))
        );
        assert_eq!(config.run_name, "illum_correction");
    }
}
