//! Data models for illumination correction runs
//!
//! This module contains all data structures used throughout the application.

mod plate;
mod run_result;

pub use plate::{PlateInfo, PlateInfoMap};
pub use run_result::{PlateRunResult, RunStatus, RunSummary};
