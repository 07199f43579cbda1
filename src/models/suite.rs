//! Suite and case descriptors
//!
//! Immutable data handed to the engine by whatever discovered the tests.

use chrono::Duration as TimeDelta;
use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::TestFailure;

/// Result type returned by every test body
pub type BodyResult = Result<(), TestFailure>;

/// Body of a simple case
pub type SimpleBody = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, BodyResult> + Send + Sync>;

/// Body of a parameterized case, called once per parameter set
pub type ParamBody =
    Arc<dyn Fn(Vec<Value>, CancellationToken) -> BoxFuture<'static, BodyResult> + Send + Sync>;

/// Secondary step run after a body settles
pub type CleanupHook = Arc<dyn Fn() -> BoxFuture<'static, BodyResult> + Send + Sync>;

/// A named group of test cases
#[derive(Clone, Debug)]
pub struct TestSuite {
    pub name: String,
    pub skip: bool,
    pub skip_reason: Option<String>,
    pub cases: Vec<TestCase>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            skip: false,
            skip_reason: None,
            cases: Vec::new(),
        }
    }

    pub fn with_case(mut self, case: TestCase) -> Self {
        self.cases.push(case);
        self
    }

    pub fn with_cases(mut self, cases: impl IntoIterator<Item = TestCase>) -> Self {
        self.cases.extend(cases);
        self
    }

    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.skip = true;
        self.skip_reason = Some(reason.into());
        self
    }
}

/// Attributes shared by both case variants
#[derive(Clone, Debug, Default)]
pub struct CaseInfo {
    pub name: String,
    pub display_name: Option<String>,
    pub skip: bool,
    pub skip_reason: Option<String>,
    /// Signed so that a negative value from a producer stays representable
    pub timeout: Option<TimeDelta>,
}

/// A single test definition
#[derive(Clone)]
pub enum TestCase {
    Simple {
        info: CaseInfo,
        body: SimpleBody,
        cleanup: Option<CleanupHook>,
    },
    Parameterized {
        info: CaseInfo,
        parameter_sets: Vec<ParameterSet>,
        body: ParamBody,
        cleanup: Option<CleanupHook>,
    },
}

impl TestCase {
    /// Create a simple case from an async closure
    pub fn simple<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        TestCase::Simple {
            info: CaseInfo {
                name: name.into(),
                ..Default::default()
            },
            body: Arc::new(move |token| body(token).boxed()),
            cleanup: None,
        }
    }

    /// Create a parameterized case from an async closure
    pub fn parameterized<F, Fut>(
        name: impl Into<String>,
        parameter_sets: Vec<ParameterSet>,
        body: F,
    ) -> Self
    where
        F: Fn(Vec<Value>, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        TestCase::Parameterized {
            info: CaseInfo {
                name: name.into(),
                ..Default::default()
            },
            parameter_sets,
            body: Arc::new(move |args, token| body(args, token).boxed()),
            cleanup: None,
        }
    }

    pub fn info(&self) -> &CaseInfo {
        match self {
            TestCase::Simple { info, .. } | TestCase::Parameterized { info, .. } => info,
        }
    }

    fn info_mut(&mut self) -> &mut CaseInfo {
        match self {
            TestCase::Simple { info, .. } | TestCase::Parameterized { info, .. } => info,
        }
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn cleanup(&self) -> Option<&CleanupHook> {
        match self {
            TestCase::Simple { cleanup, .. } | TestCase::Parameterized { cleanup, .. } => {
                cleanup.as_ref()
            }
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.info_mut().display_name = Some(display_name.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.info_mut().timeout = TimeDelta::from_std(timeout).ok();
        self
    }

    /// Set a signed timeout as received from a descriptor producer
    pub fn with_timeout_delta(mut self, timeout: TimeDelta) -> Self {
        self.info_mut().timeout = Some(timeout);
        self
    }

    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        let info = self.info_mut();
        info.skip = true;
        info.skip_reason = Some(reason.into());
        self
    }

    /// Run `hook` after the body settles, including after a timeout.
    ///
    /// The hook gets its own budget equal to the case timeout and its time
    /// counts toward the outcome's `duration_ms`. Without a case timeout it
    /// is unbounded.
    pub fn with_cleanup<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = BodyResult> + Send + 'static,
    {
        let hook: CleanupHook = Arc::new(move || hook().boxed());
        match &mut self {
            TestCase::Simple { cleanup, .. } | TestCase::Parameterized { cleanup, .. } => {
                *cleanup = Some(hook);
            }
        }
        self
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestCase::Simple { info, cleanup, .. } => f
                .debug_struct("Simple")
                .field("info", info)
                .field("cleanup", &cleanup.is_some())
                .finish_non_exhaustive(),
            TestCase::Parameterized {
                info,
                parameter_sets,
                cleanup,
                ..
            } => f
                .debug_struct("Parameterized")
                .field("info", info)
                .field("parameter_sets", parameter_sets)
                .field("cleanup", &cleanup.is_some())
                .finish_non_exhaustive(),
        }
    }
}

/// One concrete argument tuple for a parameterized case
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterSet {
    pub arguments: Vec<Value>,
    pub display_name: Option<String>,
    pub skip: bool,
    pub skip_reason: Option<String>,
}

impl ParameterSet {
    pub fn new(arguments: Vec<Value>) -> Self {
        Self {
            arguments,
            ..Default::default()
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        self.display_name = Some(display_name.into());
        self
    }

    pub fn skip(mut self, reason: impl Into<String>) -> Self {
        self.skip = true;
        self.skip_reason = Some(reason.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_suite_builder() {
        let suite = TestSuite::new("math")
            .with_case(TestCase::simple("adds", |_| async { Ok(()) }))
            .skip("not ready");

        assert_eq!(suite.cases.len(), 1);
        assert!(suite.skip);
        assert_eq!(suite.skip_reason.as_deref(), Some("not ready"));
    }

    #[test]
    fn test_case_builder() {
        let case = TestCase::simple("slow", |_| async { Ok(()) })
            .with_display_name("Slow case")
            .with_timeout(Duration::from_millis(250));

        assert_eq!(case.name(), "slow");
        assert_eq!(case.info().display_name.as_deref(), Some("Slow case"));
        assert_eq!(case.info().timeout, Some(TimeDelta::milliseconds(250)));
        assert!(case.cleanup().is_none());
    }

    #[test]
    fn test_parameterized_case() {
        let case = TestCase::parameterized(
            "square",
            vec![ParameterSet::new(vec![json!(2), json!(4)]).with_display_name("two")],
            |_, _| async { Ok(()) },
        )
        .with_cleanup(|| async { Ok(()) });

        match &case {
            TestCase::Parameterized { parameter_sets, .. } => {
                assert_eq!(parameter_sets.len(), 1);
                assert_eq!(parameter_sets[0].display_name.as_deref(), Some("two"));
            }
            _ => panic!("Expected parameterized case"),
        }
        assert!(case.cleanup().is_some());
    }
}
