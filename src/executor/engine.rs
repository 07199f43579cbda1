//! Test execution engine
//!
//! Owns the run-level concerns: option validation, the global deadline,
//! strategy selection, outcome collection and final ordering.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::listener::OutcomeListener;
use super::parallel::run_parallel;
use super::runner::{run_unit, Abandoned};
use super::unit::{flatten, ExecutionUnit};
use crate::error::{EngineError, EngineResult};
use crate::models::{ExecutionOptions, TestOutcome, TestSuite};
use crate::results::{summarize, TestSummary};
use crate::utils::Timer;

/// Outcomes of a complete run plus their summary
#[derive(Clone, Debug)]
pub struct TestRun {
    pub outcomes: Vec<TestOutcome>,
    pub summary: TestSummary,
    pub wall_time_ms: u64,
}

/// State shared by every unit of one run
pub(crate) struct RunState {
    outcomes: Mutex<Vec<TestOutcome>>,
    stop: AtomicBool,
    stop_on_first_failure: bool,
    listener: Option<Arc<dyn OutcomeListener>>,
}

impl RunState {
    fn new(stop_on_first_failure: bool, listener: Option<Arc<dyn OutcomeListener>>) -> Self {
        Self {
            outcomes: Mutex::new(Vec::new()),
            stop: AtomicBool::new(false),
            stop_on_first_failure,
            listener,
        }
    }

    /// Whether dispatch of further units must stop
    pub(crate) fn should_stop(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub(crate) async fn record(&self, outcome: TestOutcome) {
        if self.stop_on_first_failure
            && outcome.is_failed()
            && !self.stop.swap(true, Ordering::SeqCst)
        {
            info!("Stopping dispatch after first failure: {}", outcome.id);
        }

        if let Some(listener) = &self.listener {
            let notified =
                std::panic::catch_unwind(AssertUnwindSafe(|| listener.on_unit_settled(&outcome)));
            match notified {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Outcome listener failed for {}: {:#}", outcome.id, e),
                Err(_) => warn!("Outcome listener panicked for {}", outcome.id),
            }
        }

        self.outcomes.lock().await.push(outcome);
    }

    async fn take_sorted(&self) -> Vec<TestOutcome> {
        let mut outcomes = std::mem::take(&mut *self.outcomes.lock().await);
        outcomes.sort_by(|a, b| a.id.cmp(&b.id));
        outcomes
    }
}

/// Runs flattened units under an [`ExecutionOptions`] policy
pub struct TestEngine {
    options: ExecutionOptions,
    listener: Option<Arc<dyn OutcomeListener>>,
}

impl TestEngine {
    pub fn new(options: ExecutionOptions) -> Self {
        Self {
            options,
            listener: None,
        }
    }

    /// Attach a hook called once per settled outcome
    pub fn with_listener(mut self, listener: impl OutcomeListener + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.options.max_concurrency == 0 {
            return Err(EngineError::InvalidOptions(
                "max_concurrency must be at least 1".to_string(),
            ));
        }
        if self.options.global_timeout == Some(Duration::ZERO) {
            return Err(EngineError::InvalidOptions(
                "global_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Flatten, execute and summarize in one call
    pub async fn run(
        &self,
        suites: &[TestSuite],
        cancel: &CancellationToken,
    ) -> EngineResult<TestRun> {
        let timer = Timer::start("run");
        let outcomes = self.execute(flatten(suites), cancel).await?;
        let summary = summarize(&outcomes);
        let wall_time_ms = timer.stop().as_millis() as u64;

        info!(
            "Run completed in {}ms - Pass: {}/{} ({:.1}%)",
            wall_time_ms,
            summary.passed,
            summary.total,
            summary.pass_rate_percent()
        );

        Ok(TestRun {
            outcomes,
            summary,
            wall_time_ms,
        })
    }

    /// Execute units and return one outcome per scheduled unit, sorted by id.
    ///
    /// Cancelling `cancel` aborts the run with [`EngineError::Cancelled`];
    /// in-flight units are abandoned rather than reported as failures.
    pub async fn execute(
        &self,
        units: Vec<ExecutionUnit>,
        cancel: &CancellationToken,
    ) -> EngineResult<Vec<TestOutcome>> {
        self.validate()?;

        let total = units.len();
        let parallel = self.options.parallel && total > 1;
        info!(
            "Executing {} unit(s) {}",
            total,
            if parallel {
                format!("in parallel (max {} concurrent)", self.options.max_concurrency)
            } else {
                "sequentially".to_string()
            }
        );

        let run_token = cancel.child_token();
        let state = Arc::new(RunState::new(
            self.options.stop_on_first_failure,
            self.listener.clone(),
        ));

        let schedule = async {
            if parallel {
                run_parallel(
                    units,
                    self.options.max_concurrency,
                    &run_token,
                    state.clone(),
                )
                .await
            } else {
                run_sequential(units, &run_token, &state).await
            }
        };
        tokio::pin!(schedule);

        let deadline = async {
            match self.options.global_timeout {
                Some(timeout) => {
                    tokio::time::sleep(timeout).await;
                    timeout
                }
                None => std::future::pending().await,
            }
        };

        let raced = tokio::select! {
            result = &mut schedule => Ok(result),
            timeout = deadline => Err(timeout),
        };
        let (result, timed_out) = match raced {
            Ok(result) => (result, None),
            Err(timeout) => {
                warn!("Global timeout of {}ms reached, aborting run", timeout.as_millis());
                run_token.cancel();
                // Let in-flight units observe the abort before collecting
                (schedule.await, Some(timeout))
            }
        };

        let completed = state.take_sorted().await;
        match result {
            Ok(()) => Ok(completed),
            Err(Abandoned) => match timed_out {
                Some(timeout) if !cancel.is_cancelled() => {
                    Err(EngineError::GlobalTimeout { timeout, completed })
                }
                _ => {
                    warn!("Run cancelled with {}/{} unit(s) settled", completed.len(), total);
                    Err(EngineError::Cancelled { completed })
                }
            },
        }
    }
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new(ExecutionOptions::default())
    }
}

/// Run units one at a time in flattened order
async fn run_sequential(
    units: Vec<ExecutionUnit>,
    run_token: &CancellationToken,
    state: &RunState,
) -> Result<(), Abandoned> {
    let total = units.len();

    for (index, unit) in units.into_iter().enumerate() {
        if state.should_stop() {
            debug!("{} unit(s) never scheduled", total - index);
            break;
        }

        let outcome = run_unit(&unit, run_token).await?;
        state.record(outcome).await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        ErrorKind, ParameterSet, TestCase, TestFailure, TestStatus,
    };
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tokio_test::{assert_err, assert_ok};

    fn passing(name: &str) -> TestCase {
        TestCase::simple(name, |_| async { Ok(()) })
    }

    fn failing(name: &str) -> TestCase {
        TestCase::simple(name, |_| async { Err(TestFailure::assertion("boom")) })
    }

    /// A passing case that records whether it ran
    fn tracked(name: &str, counter: Arc<AtomicUsize>) -> TestCase {
        TestCase::simple(name, move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        })
    }

    fn sleeping(name: &str, millis: u64) -> TestCase {
        TestCase::simple(name, move |_| async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(())
        })
    }

    #[tokio::test]
    async fn test_all_passing_cases() {
        let suites = vec![
            TestSuite::new("a").with_cases([passing("one"), passing("two")]),
            TestSuite::new("b").with_case(passing("three")),
        ];
        let expected = flatten(&suites).len();

        let run = TestEngine::default()
            .run(&suites, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(run.outcomes.len(), expected);
        assert!(run.outcomes.iter().all(|o| o.status == TestStatus::Passed));
        assert!(run.summary.all_passed);
    }

    #[tokio::test]
    async fn test_run_reports_wall_time() {
        let suites = vec![TestSuite::new("slow").with_case(sleeping("nap", 30))];

        let run = TestEngine::default()
            .run(&suites, &CancellationToken::new())
            .await
            .unwrap();

        assert!(run.wall_time_ms >= 30);
    }

    #[tokio::test]
    async fn test_parameterized_failure_keeps_arguments() {
        let suites = vec![TestSuite::new("params").with_case(TestCase::parameterized(
            "even",
            vec![
                ParameterSet::new(vec![json!(2)]),
                ParameterSet::new(vec![json!(3)]),
                ParameterSet::new(vec![json!(4)]),
            ],
            |args, _| async move {
                let n = args[0].as_i64().unwrap_or_default();
                if n % 2 != 0 {
                    return Err(TestFailure::assertion(format!("{n} is odd")));
                }
                Ok(())
            },
        ))];

        let outcomes = TestEngine::default()
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        let failed: Vec<_> = outcomes.iter().filter(|o| o.is_failed()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].arguments, Some(vec![json!(3)]));
        assert_eq!(
            outcomes.iter().filter(|o| o.status == TestStatus::Passed).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_sequential_stop_on_first_failure() {
        let ran_after = Arc::new(AtomicUsize::new(0));
        let suites = vec![TestSuite::new("s").with_cases([
            passing("first"),
            failing("second"),
            tracked("third", ran_after.clone()),
        ])];

        let engine = TestEngine::new(ExecutionOptions::sequential().stop_on_first_failure(true));
        let outcomes = engine
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].status, TestStatus::Failed);
        assert_eq!(ran_after.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sequential_without_stop_runs_everything() {
        let suites = vec![TestSuite::new("s").with_cases([
            passing("first"),
            failing("second"),
            passing("third"),
        ])];

        let outcomes = TestEngine::new(ExecutionOptions::sequential())
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
    }

    #[tokio::test]
    async fn test_timeout_reported_as_failure() {
        let suites = vec![TestSuite::new("s").with_case(
            sleeping("slow", 200).with_timeout(Duration::from_millis(50)),
        )];

        let outcomes = TestEngine::default()
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, TestStatus::Failed);
        assert_eq!(outcomes[0].error_kind, Some(ErrorKind::Timeout));
        assert!(outcomes[0].duration_ms >= 50);
        assert!(outcomes[0].duration_ms < 150);
    }

    #[tokio::test]
    async fn test_runs_are_idempotent() {
        let suites = vec![TestSuite::new("s").with_cases([
            passing("a"),
            failing("b"),
            passing("c").skip("later"),
        ])];
        let engine = TestEngine::default();

        let pairs = |outcomes: Vec<TestOutcome>| -> Vec<(String, String)> {
            let mut pairs: Vec<_> = outcomes
                .into_iter()
                .map(|o| (o.id.key, o.status.to_string()))
                .collect();
            pairs.sort();
            pairs
        };

        let first = engine
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap();
        let second = engine
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(pairs(first), pairs(second));
    }

    #[tokio::test]
    async fn test_parallel_results_sorted_by_id() {
        // Later units finish first
        let suites = vec![TestSuite::new("s").with_cases([
            sleeping("a", 80),
            sleeping("b", 60),
            sleeping("c", 40),
            sleeping("d", 5),
        ])];

        let engine = TestEngine::new(ExecutionOptions::default().with_max_concurrency(2));
        let outcomes = engine
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap();

        let keys: Vec<&str> = outcomes.iter().map(|o| o.id.key.as_str()).collect();
        assert_eq!(keys, vec!["s::a", "s::b", "s::c", "s::d"]);
        assert!(outcomes.iter().all(|o| o.status == TestStatus::Passed));
    }

    #[tokio::test]
    async fn test_invalid_concurrency_rejected() {
        let engine = TestEngine::new(ExecutionOptions::default().with_max_concurrency(0));
        let result = engine.execute(Vec::new(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(EngineError::InvalidOptions(_))));
    }

    #[tokio::test]
    async fn test_empty_run() {
        let run = assert_ok!(TestEngine::default().run(&[], &CancellationToken::new()).await);
        assert!(run.outcomes.is_empty());
        assert_eq!(run.summary.pass_rate, 0.0);
    }

    #[tokio::test]
    async fn test_caller_cancellation_propagates() {
        let suites = vec![TestSuite::new("s").with_cases([passing("quick"), sleeping("slow", 5_000)])];
        let token = CancellationToken::new();
        let trigger = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = assert_err!(
            TestEngine::new(ExecutionOptions::sequential())
                .execute(flatten(&suites), &token)
                .await
        );

        match err {
            EngineError::Cancelled { completed } => {
                // The abandoned unit has no outcome, not even a failed one
                assert_eq!(completed.len(), 1);
                assert_eq!(completed[0].id.key, "s::quick");
            }
            other => panic!("Expected Cancelled, got {other:?}"),
        }
    }

    /// Panics while building its future, before any await
    fn eager_panic(name: &str) -> TestCase {
        let fixtures: Vec<u32> = Vec::new();
        TestCase::simple(name, move |_| {
            let first = fixtures[0];
            async move {
                assert_eq!(first, 1);
                Ok(())
            }
        })
    }

    #[tokio::test]
    async fn test_eager_panic_yields_outcome_in_both_strategies() {
        let suites = vec![TestSuite::new("s").with_cases([passing("ok"), eager_panic("eager")])];

        for options in [
            ExecutionOptions::sequential(),
            ExecutionOptions::default().with_max_concurrency(2),
        ] {
            let outcomes = TestEngine::new(options)
                .execute(flatten(&suites), &CancellationToken::new())
                .await
                .unwrap();

            assert_eq!(outcomes.len(), 2);
            assert_eq!(outcomes[0].status, TestStatus::Passed);
            assert_eq!(outcomes[1].status, TestStatus::Failed);
            assert_eq!(outcomes[1].error_kind, Some(ErrorKind::UnexpectedException));
        }
    }

    #[tokio::test]
    async fn test_precancelled_run_over_skipped_units() {
        let suites = vec![TestSuite::new("s")
            .with_cases([passing("a").skip("later"), passing("b").skip("later")])];
        let token = CancellationToken::new();
        token.cancel();

        for options in [
            ExecutionOptions::sequential(),
            ExecutionOptions::default().with_max_concurrency(2),
        ] {
            let err = TestEngine::new(options)
                .execute(flatten(&suites), &token)
                .await
                .unwrap_err();

            assert!(matches!(err, EngineError::Cancelled { .. }));
            assert!(err.completed().is_empty());
        }
    }

    #[tokio::test]
    async fn test_global_timeout_aborts_run() {
        let suites = vec![TestSuite::new("s").with_cases([
            passing("quick"),
            sleeping("slow", 5_000),
            sleeping("slower", 5_000),
        ])];

        let engine = TestEngine::new(
            ExecutionOptions::default()
                .with_max_concurrency(2)
                .with_global_timeout(Duration::from_millis(50)),
        );
        let err = engine
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::GlobalTimeout { .. }));
        assert!(err.completed().iter().all(|o| o.status == TestStatus::Passed));
        assert!(err.completed().len() <= 1);
    }

    #[tokio::test]
    async fn test_listener_sees_every_outcome() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let suites = vec![TestSuite::new("s").with_cases([passing("a"), failing("b"), passing("c")])];

        let engine = TestEngine::default().with_listener(move |_: &TestOutcome| -> anyhow::Result<()> {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let outcomes = engine
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_listener_error_keeps_outcome() {
        let suites = vec![TestSuite::new("s").with_case(passing("a"))];
        let engine = TestEngine::default()
            .with_listener(|_: &TestOutcome| -> anyhow::Result<()> { anyhow::bail!("reporter offline") });

        let outcomes = engine
            .execute(flatten(&suites), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, TestStatus::Passed);
    }
}
