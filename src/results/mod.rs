//! Outcome aggregation and run storage

mod storage;
mod summary;

pub use storage::{EnvironmentInfo, ResultsStorage, RunInfo, StoredRun};
pub use summary::{summarize, TestSummary};
