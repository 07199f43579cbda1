//! Execution options

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a batch of units is scheduled.
///
/// `stop_on_first_failure` behaves differently per strategy. Sequential runs
/// stop right after the first failed unit, so nothing after it is scheduled.
/// Parallel runs only stop *dispatching*: units already handed to a worker
/// when the failure is observed still run to completion and are reported.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOptions {
    pub parallel: bool,
    pub max_concurrency: usize,
    pub stop_on_first_failure: bool,
    pub global_timeout: Option<Duration>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_concurrency: available_cores(),
            stop_on_first_failure: false,
            global_timeout: None,
        }
    }
}

impl ExecutionOptions {
    pub fn sequential() -> Self {
        Self {
            parallel: false,
            ..Default::default()
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency;
        self
    }

    pub fn stop_on_first_failure(mut self, stop: bool) -> Self {
        self.stop_on_first_failure = stop;
        self
    }

    pub fn with_global_timeout(mut self, timeout: Duration) -> Self {
        self.global_timeout = Some(timeout);
        self
    }
}

/// Number of cores available to this process, at least 1
pub fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
