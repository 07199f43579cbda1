//! Settled-outcome hook
//!
//! Lets callers observe outcomes as they settle without changing scheduling.

use anyhow::Result;
use tracing::info;

use crate::models::{TestOutcome, TestStatus};

/// Called once for every outcome, after it has been recorded.
///
/// Errors are logged by the engine; they never alter or drop the outcome.
pub trait OutcomeListener: Send + Sync {
    fn on_unit_settled(&self, outcome: &TestOutcome) -> Result<()>;
}

impl<F> OutcomeListener for F
where
    F: Fn(&TestOutcome) -> Result<()> + Send + Sync,
{
    fn on_unit_settled(&self, outcome: &TestOutcome) -> Result<()> {
        self(outcome)
    }
}

/// Logs each settled outcome as a progress line
#[derive(Clone, Copy, Debug, Default)]
pub struct LogListener;

impl OutcomeListener for LogListener {
    fn on_unit_settled(&self, outcome: &TestOutcome) -> Result<()> {
        match outcome.status {
            TestStatus::Failed => info!(
                "  {} ({})",
                outcome,
                outcome
                    .error_kind
                    .map(|k| k.name())
                    .unwrap_or("unknown")
            ),
            _ => info!("  {}", outcome),
        }
        Ok(())
    }
}
