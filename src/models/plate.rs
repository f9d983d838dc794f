//! Plate models for CellProfiler runs
//!
//! Describes which images go where for each plate handed to the runner.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Paths CellProfiler needs to process one plate
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateInfo {
    /// Directory of max-projected input images
    pub path_to_images: PathBuf,

    /// Directory CellProfiler writes corrected images into
    pub path_to_output: PathBuf,

    /// Pipeline definition file (`.cppipe`)
    pub path_to_pipeline: PathBuf,

    /// Optional CellProfiler plugins directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_to_plugins: Option<PathBuf>,
}

impl PlateInfo {
    pub fn new(
        path_to_images: impl Into<PathBuf>,
        path_to_output: impl Into<PathBuf>,
        path_to_pipeline: impl Into<PathBuf>,
    ) -> Self {
        Self {
            path_to_images: path_to_images.into(),
            path_to_output: path_to_output.into(),
            path_to_pipeline: path_to_pipeline.into(),
            path_to_plugins: None,
        }
    }

    pub fn with_plugins(mut self, path: impl Into<PathBuf>) -> Self {
        self.path_to_plugins = Some(path.into());
        self
    }
}

/// Plate name to plate paths, ordered by plate name
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlateInfoMap {
    plates: BTreeMap<String, PlateInfo>,
}

impl PlateInfoMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a plate, returning the previous entry under the same name
    pub fn insert(&mut self, name: impl Into<String>, info: PlateInfo) -> Option<PlateInfo> {
        self.plates.insert(name.into(), info)
    }

    pub fn get(&self, name: &str) -> Option<&PlateInfo> {
        self.plates.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.plates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plates.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.plates.keys().map(String::as_str)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, PlateInfo> {
        self.plates.iter()
    }
}

impl IntoIterator for PlateInfoMap {
    type Item = (String, PlateInfo);
    type IntoIter = btree_map::IntoIter<String, PlateInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.plates.into_iter()
    }
}

impl<K: Into<String>> FromIterator<(K, PlateInfo)> for PlateInfoMap {
    fn from_iter<I: IntoIterator<Item = (K, PlateInfo)>>(iter: I) -> Self {
        Self {
            plates: iter.into_iter().map(|(name, info)| (name.into(), info)).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a PlateInfoMap {
    type Item = (&'a String, &'a PlateInfo);
    type IntoIter = btree_map::Iter<'a, String, PlateInfo>;

    fn into_iter(self) -> Self::IntoIter {
        self.plates.iter()
    }
}

impl fmt::Display for PlateInfoMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, info) in &self.plates {
            writeln!(f, "{name}:")?;
            writeln!(f, "    path_to_images:   {}", info.path_to_images.display())?;
            writeln!(f, "    path_to_output:   {}", info.path_to_output.display())?;
            writeln!(f, "    path_to_pipeline: {}", info.path_to_pipeline.display())?;
            if let Some(plugins) = &info.path_to_plugins {
                writeln!(f, "    path_to_plugins:  {}", plugins.display())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(plate: &str) -> PlateInfo {
        PlateInfo::new(
            format!("/data/{plate}"),
            format!("/out/{plate}"),
            "/pipelines/illum.cppipe",
        )
    }

    #[test]
    fn test_one_plate_map() {
        let map = PlateInfoMap::from_iter([("NF0014", info("NF0014"))]);
        assert_eq!(map.len(), 1);
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["NF0014"]);
        assert!(map.contains("NF0014"));
    }

    #[test]
    fn test_names_are_sorted() {
        let mut map = PlateInfoMap::new();
        map.insert("NF0016", info("NF0016"));
        map.insert("NF0014", info("NF0014"));
        assert_eq!(map.names().collect::<Vec<_>>(), vec!["NF0014", "NF0016"]);
    }

    #[test]
    fn test_serializes_as_plain_mapping() {
        let map = PlateInfoMap::from_iter([("NF0014", info("NF0014"))]);
        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["NF0014"]["path_to_images"], "/data/NF0014");
        assert!(json["NF0014"].get("path_to_plugins").is_none());
    }

    #[test]
    fn test_display_lists_plugins_only_when_set() {
        let plain = PlateInfoMap::from_iter([("NF0014", info("NF0014"))]).to_string();
        assert!(plain.contains("path_to_pipeline: /pipelines/illum.cppipe"));
        assert!(!plain.contains("path_to_plugins"));

        let with_plugins =
            PlateInfoMap::from_iter([("NF0014", info("NF0014").with_plugins("/plugins"))]).to_string();
        assert!(with_plugins.contains("path_to_plugins:  /plugins"));
    }
}
