//! Bounded-parallel execution
//!
//! Units are offered to a semaphore-gated pool in flattened order. Once the
//! stop flag is set no further unit is dispatched, but units already running
//! are left to finish.

use futures::future::join_all;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::engine::RunState;
use super::runner::{crashed_outcome, run_unit, Abandoned};
use super::unit::ExecutionUnit;
use crate::models::TestFailure;

pub(crate) async fn run_parallel(
    units: Vec<ExecutionUnit>,
    max_concurrency: usize,
    run_token: &CancellationToken,
    state: Arc<RunState>,
) -> Result<(), Abandoned> {
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let total = units.len();
    let mut handles = Vec::with_capacity(total);
    let mut dispatched = Vec::with_capacity(total);
    let mut abandoned = false;

    for unit in units {
        let permit = tokio::select! {
            biased;
            _ = run_token.cancelled() => {
                abandoned = true;
                break;
            }
            permit = semaphore.clone().acquire_owned() => permit,
        };
        let Ok(permit) = permit else {
            break;
        };

        // Read after acquiring the permit so failures that settled while we
        // waited are observed
        if state.should_stop() {
            debug!("{} unit(s) never dispatched", total - handles.len());
            break;
        }

        debug!("Dispatching {}", unit.id);
        let unit = Arc::new(unit);
        let task_unit = unit.clone();
        let task_state = state.clone();
        let run_token = run_token.clone();
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let outcome = run_unit(&task_unit, &run_token).await?;
            task_state.record(outcome).await;
            Ok::<(), Abandoned>(())
        });
        dispatched.push(unit);
        handles.push(handle);
    }

    let results = join_all(handles).await;
    for (unit, result) in dispatched.iter().zip(results) {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(Abandoned)) => abandoned = true,
            Err(e) if e.is_panic() => {
                error!("Unit task for {} panicked", unit.id);
                let failure = TestFailure::from_panic(e.into_panic());
                state.record(crashed_outcome(unit, &failure)).await;
            }
            Err(e) => error!("Unit task for {} failed: {}", unit.id, e),
        }
    }

    if abandoned {
        Err(Abandoned)
    } else {
        Ok(())
    }
}
