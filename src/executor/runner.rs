//! Single unit execution
//!
//! Runs one unit under its skip, timeout and cancellation rules.

use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::unit::ExecutionUnit;
use crate::models::{ErrorKind, TestFailure, TestOutcome, TestStatus};

/// Marker returned when the run token fired before the unit settled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Abandoned;

enum Settled {
    Returned(Result<(), TestFailure>),
    TimedOut(Duration),
}

/// Run a single unit.
///
/// Returns `Err(Abandoned)` when `run_token` fires before the unit settles; no
/// outcome exists for such a unit.
pub async fn run_unit(
    unit: &ExecutionUnit,
    run_token: &CancellationToken,
) -> Result<TestOutcome, Abandoned> {
    // An aborted run records nothing further, skipped units included
    if run_token.is_cancelled() {
        return Err(Abandoned);
    }

    if unit.skip {
        debug!("Skipping {}", unit.id);
        return Ok(skipped_outcome(unit));
    }

    debug!("Running {}", unit.id);
    let start_time = Utc::now();
    let timer = Instant::now();

    // Fires on run abort (through the parent) or when this unit times out
    let unit_token = run_token.child_token();
    // Build the future inside the guard so a panic before its first await is caught too
    let body = AssertUnwindSafe(async { (unit.invoke)(unit_token.clone()).await }).catch_unwind();
    let settled = tokio::select! {
        biased;
        _ = run_token.cancelled() => {
            debug!("Abandoning {} after run cancellation", unit.id);
            return Err(Abandoned);
        }
        result = body => Settled::Returned(result.unwrap_or_else(|payload| Err(TestFailure::from_panic(payload)))),
        timeout = deadline(unit.timeout) => {
            unit_token.cancel();
            Settled::TimedOut(timeout)
        }
    };

    let mut outcome = match settled {
        Settled::Returned(Ok(())) => base_outcome(unit, TestStatus::Passed),
        Settled::Returned(Err(failure)) if failure.is_cancelled() && run_token.is_cancelled() => {
            return Err(Abandoned);
        }
        Settled::Returned(Err(failure)) => {
            base_outcome(unit, TestStatus::Failed).fail_with(failure.kind.into(), &failure)
        }
        Settled::TimedOut(timeout) => {
            let failure = TestFailure::unexpected(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ));
            base_outcome(unit, TestStatus::Failed).fail_with(ErrorKind::Timeout, &failure)
        }
    };

    if let Some(cleanup) = &unit.cleanup {
        let hook = AssertUnwindSafe(async { cleanup().await }).catch_unwind();
        let result = tokio::select! {
            biased;
            _ = run_token.cancelled() => return Err(Abandoned),
            result = hook => result.unwrap_or_else(|payload| Err(TestFailure::from_panic(payload))),
            // Cleanup gets its own budget equal to the unit timeout
            timeout = deadline(unit.timeout) => Err(TestFailure::unexpected(format!(
                "timed out after {}ms",
                timeout.as_millis()
            ))),
        };

        if let Err(failure) = result {
            outcome = merge_cleanup_failure(outcome, failure);
        }
    }

    let elapsed = timer.elapsed();
    outcome.start_time = start_time;
    outcome.end_time = start_time + chrono::Duration::from_std(elapsed).unwrap_or_default();
    outcome.duration_ms = elapsed.as_millis() as u64;

    debug!("Settled {}", outcome);
    Ok(outcome)
}

/// Resolves after `timeout`, never when there is none
async fn deadline(timeout: Option<Duration>) -> Duration {
    match timeout {
        Some(timeout) => {
            tokio::time::sleep(timeout).await;
            timeout
        }
        None => std::future::pending().await,
    }
}

/// The body's failure always wins; a cleanup failure only fails a passing unit
fn merge_cleanup_failure(outcome: TestOutcome, failure: TestFailure) -> TestOutcome {
    if outcome.is_failed() {
        warn!(
            "Cleanup for {} also failed: {} (keeping primary failure)",
            outcome.id, failure.message
        );
        return outcome;
    }

    let failure = TestFailure {
        message: format!("cleanup failed: {}", failure.message),
        ..failure
    };
    outcome.fail_with(failure.kind.into(), &failure)
}

/// Failed outcome for a unit whose task died outside the body guard
pub(crate) fn crashed_outcome(unit: &ExecutionUnit, failure: &TestFailure) -> TestOutcome {
    base_outcome(unit, TestStatus::Failed).fail_with(ErrorKind::UnexpectedException, failure)
}

fn base_outcome(unit: &ExecutionUnit, status: TestStatus) -> TestOutcome {
    let now = Utc::now();
    TestOutcome {
        id: unit.id.clone(),
        suite_name: unit.suite_name.clone(),
        case_name: unit.case_name.clone(),
        display_name: unit.display_name.clone(),
        status,
        start_time: now,
        end_time: now,
        duration_ms: 0,
        error_message: None,
        error_kind: None,
        stack_trace: None,
        skip_reason: None,
        arguments: unit.arguments.clone(),
    }
}

fn skipped_outcome(unit: &ExecutionUnit) -> TestOutcome {
    TestOutcome {
        skip_reason: unit.skip_reason.clone(),
        ..base_outcome(unit, TestStatus::Skipped)
    }
}
