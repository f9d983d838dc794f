//! Run record persistence
//!
//! Stores run summaries on disk and exports them.

mod storage;

pub use storage::{ExportFormat, ResultsStorage, RunRecord};
