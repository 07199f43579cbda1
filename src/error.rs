//! Engine-level errors
//!
//! A failing test is never an error here; these are reserved for bad options
//! and for runs that were aborted before every unit settled.

use std::time::Duration;
use thiserror::Error;

use crate::models::TestOutcome;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid execution options: {0}")]
    InvalidOptions(String),

    /// The caller's cancellation token fired. `completed` holds the outcomes
    /// settled before the abort, sorted by id.
    #[error("run cancelled after {} settled unit(s)", completed.len())]
    Cancelled { completed: Vec<TestOutcome> },

    #[error("run exceeded global timeout of {}ms after {} settled unit(s)", timeout.as_millis(), completed.len())]
    GlobalTimeout {
        timeout: Duration,
        completed: Vec<TestOutcome>,
    },
}

impl EngineError {
    /// Outcomes that settled before an abort, empty for other errors
    pub fn completed(&self) -> &[TestOutcome] {
        match self {
            EngineError::Cancelled { completed } | EngineError::GlobalTimeout { completed, .. } => {
                completed
            }
            EngineError::InvalidOptions(_) => &[],
        }
    }

    pub fn is_abort(&self) -> bool {
        !matches!(self, EngineError::InvalidOptions(_))
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
