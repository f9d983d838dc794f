//! Plate planning
//!
//! Resolves the pipeline and image paths for a run and assembles the
//! plate map handed to the CellProfiler runner. Every input path is
//! resolved strictly before the output directory is touched, so a missing
//! input leaves the filesystem as it was.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{PlateInfo, PlateInfoMap};

/// Planning errors
#[derive(Error, Debug)]
pub enum PlanError {
    #[error("Required path does not exist: {}", path.display())]
    MissingPath { path: PathBuf },

    #[error("Expected a directory of images: {}", path.display())]
    NotADirectory { path: PathBuf },

    #[error("Cannot derive a plate name from: {}", path.display())]
    InvalidPlateName { path: PathBuf },

    #[error("Plate '{name}' is listed more than once")]
    DuplicatePlate { name: String },

    #[error("Failed to resolve {}: {source}", path.display())]
    Resolve { path: PathBuf, source: io::Error },

    #[error("Failed to create directory {}: {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },
}

/// Builds plate maps for one pipeline and one output root
#[derive(Clone, Debug)]
pub struct PlatePlanner {
    pipeline: PathBuf,
    output_root: PathBuf,
    plugins: Option<PathBuf>,
}

impl PlatePlanner {
    pub fn new(pipeline: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            pipeline: pipeline.into(),
            output_root: output_root.into(),
            plugins: None,
        }
    }

    pub fn with_plugins(mut self, plugins: Option<PathBuf>) -> Self {
        self.plugins = plugins;
        self
    }

    /// Plan a single plate from its images directory
    pub fn plan(&self, images_dir: &Path) -> Result<PlateInfoMap, PlanError> {
        self.plan_plates(std::slice::from_ref(&images_dir.to_path_buf()))
    }

    /// Plan one plate per images directory
    pub fn plan_plates(&self, images_dirs: &[PathBuf]) -> Result<PlateInfoMap, PlanError> {
        let pipeline = resolve_strict(&self.pipeline)?;
        let plugins = self.plugins.as_deref().map(resolve_dir).transpose()?;

        let mut plates: BTreeMap<String, PathBuf> = BTreeMap::new();
        for dir in images_dirs {
            let images = resolve_dir(dir)?;
            let name = plate_name(&images)?;
            if plates.contains_key(&name) {
                return Err(PlanError::DuplicatePlate { name });
            }
            debug!("Plate {} -> {}", name, images.display());
            plates.insert(name, images);
        }

        ensure_dir(&self.output_root)?;

        let map: PlateInfoMap = plates
            .into_iter()
            .map(|(name, images)| {
                let output = self.output_root.join(&name);
                let mut info = PlateInfo::new(images, output, pipeline.clone());
                if let Some(plugins) = &plugins {
                    info = info.with_plugins(plugins.clone());
                }
                (name, info)
            })
            .collect();

        info!(
            "Planned {} plate(s) with pipeline {}",
            map.len(),
            pipeline.display()
        );
        Ok(map)
    }
}

/// Canonicalize a path, failing if it does not exist
pub fn resolve_strict(path: &Path) -> Result<PathBuf, PlanError> {
    std::fs::canonicalize(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => PlanError::MissingPath {
            path: path.to_path_buf(),
        },
        _ => PlanError::Resolve {
            path: path.to_path_buf(),
            source,
        },
    })
}

fn resolve_dir(path: &Path) -> Result<PathBuf, PlanError> {
    let resolved = resolve_strict(path)?;
    if !resolved.is_dir() {
        return Err(PlanError::NotADirectory { path: resolved });
    }
    Ok(resolved)
}

/// Plate name is the images directory's base name without extension
pub fn plate_name(images_dir: &Path) -> Result<String, PlanError> {
    images_dir
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PlanError::InvalidPlateName {
            path: images_dir.to_path_buf(),
        })
}

/// Create a directory and its parents; an existing directory is fine
pub fn ensure_dir(path: &Path) -> Result<(), PlanError> {
    std::fs::create_dir_all(path).map_err(|source| PlanError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempdir().unwrap();
            fs::write(dir.path().join("illum.cppipe"), "CellProfiler Pipeline").unwrap();
            fs::create_dir_all(dir.path().join("Max_Projected_Images/NF0014")).unwrap();
            Self { dir }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.dir.path().join(rel)
        }

        fn planner(&self) -> PlatePlanner {
            PlatePlanner::new(self.path("illum.cppipe"), self.path("Corrected_Images"))
        }
    }

    #[test]
    fn test_single_plate_keyed_by_directory_name() {
        let fx = Fixture::new();
        let map = fx
            .planner()
            .plan(&fx.path("Max_Projected_Images/NF0014"))
            .unwrap();

        assert_eq!(map.len(), 1);
        let info = map.get("NF0014").unwrap();
        assert!(info.path_to_images.is_absolute());
        assert!(info.path_to_images.ends_with("NF0014"));
        assert_eq!(info.path_to_output, fx.path("Corrected_Images").join("NF0014"));
        assert!(info.path_to_pipeline.ends_with("illum.cppipe"));
        assert!(info.path_to_plugins.is_none());
        assert!(fx.path("Corrected_Images").is_dir());
    }

    #[test]
    fn test_missing_images_dir_creates_nothing() {
        let fx = Fixture::new();
        let err = fx
            .planner()
            .plan(&fx.path("Max_Projected_Images/NF9999"))
            .unwrap_err();

        assert!(matches!(err, PlanError::MissingPath { .. }));
        assert!(!fx.path("Corrected_Images").exists());
    }

    #[test]
    fn test_missing_pipeline_creates_nothing() {
        let fx = Fixture::new();
        let planner = PlatePlanner::new(fx.path("missing.cppipe"), fx.path("Corrected_Images"));
        let err = planner
            .plan(&fx.path("Max_Projected_Images/NF0014"))
            .unwrap_err();

        assert!(matches!(err, PlanError::MissingPath { .. }));
        assert!(err.to_string().contains("missing.cppipe"));
        assert!(!fx.path("Corrected_Images").exists());
    }

    #[test]
    fn test_output_dir_creation_is_idempotent() {
        let fx = Fixture::new();
        let planner = fx.planner();
        let images = fx.path("Max_Projected_Images/NF0014");

        let first = planner.plan(&images).unwrap();
        let second = planner.plan(&images).unwrap();
        assert_eq!(first, second);

        ensure_dir(&fx.path("Corrected_Images")).unwrap();
    }

    #[test]
    fn test_images_path_must_be_directory() {
        let fx = Fixture::new();
        let err = fx.planner().plan(&fx.path("illum.cppipe")).unwrap_err();
        assert!(matches!(err, PlanError::NotADirectory { .. }));
    }

    #[test]
    fn test_multiple_plates() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.path("Max_Projected_Images/NF0016")).unwrap();

        let map = fx
            .planner()
            .plan_plates(&[
                fx.path("Max_Projected_Images/NF0016"),
                fx.path("Max_Projected_Images/NF0014"),
            ])
            .unwrap();

        assert_eq!(map.names().collect::<Vec<_>>(), vec!["NF0014", "NF0016"]);
    }

    #[test]
    fn test_duplicate_plate_names_rejected() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.path("other/NF0014")).unwrap();

        let err = fx
            .planner()
            .plan_plates(&[
                fx.path("Max_Projected_Images/NF0014"),
                fx.path("other/NF0014"),
            ])
            .unwrap_err();

        assert!(matches!(err, PlanError::DuplicatePlate { ref name } if name == "NF0014"));
        assert!(!fx.path("Corrected_Images").exists());
    }

    #[test]
    fn test_plugins_are_resolved() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.path("plugins")).unwrap();

        let map = fx
            .planner()
            .with_plugins(Some(fx.path("plugins")))
            .plan(&fx.path("Max_Projected_Images/NF0014"))
            .unwrap();
        assert!(map.get("NF0014").unwrap().path_to_plugins.is_some());

        let err = fx
            .planner()
            .with_plugins(Some(fx.path("no-plugins")))
            .plan(&fx.path("Max_Projected_Images/NF0014"))
            .unwrap_err();
        assert!(matches!(err, PlanError::MissingPath { .. }));
    }

    #[test]
    fn test_plate_name_strips_extension() {
        assert_eq!(plate_name(Path::new("/data/NF0014")).unwrap(), "NF0014");
        assert_eq!(plate_name(Path::new("/data/NF0014.zarr")).unwrap(), "NF0014");
        assert!(plate_name(Path::new("/")).is_err());
    }
}
