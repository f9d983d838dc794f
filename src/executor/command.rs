//! CellProfiler command line construction

use std::ffi::OsString;
use std::fmt;
use tokio::process::Command;

use crate::models::PlateInfo;

/// Default CellProfiler executable name
pub const DEFAULT_CELLPROFILER: &str = "cellprofiler";

/// A headless CellProfiler invocation for one plate
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellProfilerCommand {
    program: String,
    args: Vec<OsString>,
}

impl CellProfilerCommand {
    /// `<program> -c -r -p <pipeline> -o <output> -i <images> [--plugins-directory <dir>] [extra...]`
    pub fn for_plate(program: impl Into<String>, info: &PlateInfo, extra_args: &[String]) -> Self {
        let mut args: Vec<OsString> = vec![
            "-c".into(),
            "-r".into(),
            "-p".into(),
            info.path_to_pipeline.clone().into_os_string(),
            "-o".into(),
            info.path_to_output.clone().into_os_string(),
            "-i".into(),
            info.path_to_images.clone().into_os_string(),
        ];

        if let Some(plugins) = &info.path_to_plugins {
            args.push("--plugins-directory".into());
            args.push(plugins.clone().into_os_string());
        }

        args.extend(extra_args.iter().map(OsString::from));

        Self {
            program: program.into(),
            args,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    /// Build a tokio command; stdio is left to the caller
    pub fn to_command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args).kill_on_drop(true);
        command
    }
}

impl fmt::Display for CellProfilerCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg.to_string_lossy())?;
        }
        Ok(())
    }
}
