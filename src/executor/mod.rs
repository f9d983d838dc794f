//! CellProfiler execution engine
//!
//! Builds CellProfiler command lines and runs them in parallel per plate.

mod command;
mod parallel;

pub use command::DEFAULT_CELLPROFILER;
pub use parallel::ParallelExecutor;
