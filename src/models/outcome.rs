//! Outcome models
//!
//! Defines unit identities, statuses and the recorded result of one unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::{FailureKind, TestFailure};

/// Stable identity of an execution unit.
///
/// Ordering follows suite position, then case position, then parameter-set
/// index, which is the flattened order of the input descriptors.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub suite_index: usize,
    pub case_index: usize,
    pub parameter_index: Option<usize>,
    pub key: String,
}

impl UnitId {
    pub fn new(
        suite_index: usize,
        suite_name: &str,
        case_index: usize,
        case_name: &str,
        parameter_index: Option<usize>,
    ) -> Self {
        let key = match parameter_index {
            Some(index) => format!("{suite_name}::{case_name}[{index}]"),
            None => format!("{suite_name}::{case_name}"),
        };
        Self {
            suite_index,
            case_index,
            parameter_index,
            key,
        }
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key)
    }
}

/// Final status of one unit
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
}

impl TestStatus {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestStatus::Passed => "✓",
            TestStatus::Failed => "✗",
            TestStatus::Skipped => "○",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestStatus::Passed)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestStatus::Passed => write!(f, "PASS"),
            TestStatus::Failed => write!(f, "FAIL"),
            TestStatus::Skipped => write!(f, "SKIP"),
        }
    }
}

/// Category of a failed outcome
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    AssertionFailure,
    UnexpectedException,
    Timeout,
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::AssertionFailure => "assertion-failure",
            ErrorKind::UnexpectedException => "unexpected-exception",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl From<FailureKind> for ErrorKind {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::Assertion => ErrorKind::AssertionFailure,
            // A cancellation nobody asked for is not something the body anticipated
            FailureKind::Unexpected | FailureKind::Cancelled => ErrorKind::UnexpectedException,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Recorded result of one execution unit
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestOutcome {
    pub id: UnitId,
    pub suite_name: String,
    pub case_name: String,
    pub display_name: Option<String>,
    pub status: TestStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: u64,
    pub error_message: Option<String>,
    pub error_kind: Option<ErrorKind>,
    pub stack_trace: Option<String>,
    pub skip_reason: Option<String>,
    pub arguments: Option<Vec<Value>>,
}

impl TestOutcome {
    /// Name shown to humans: display name if present, otherwise the id
    pub fn label(&self) -> String {
        self.display_name
            .clone()
            .unwrap_or_else(|| self.id.to_string())
    }

    pub fn is_failed(&self) -> bool {
        self.status == TestStatus::Failed
    }

    pub(crate) fn fail_with(mut self, kind: ErrorKind, failure: &TestFailure) -> Self {
        self.status = TestStatus::Failed;
        self.error_kind = Some(kind);
        self.error_message = Some(failure.message.clone());
        self.stack_trace = failure.stack_trace.clone();
        self
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}ms]",
            self.status.symbol(),
            self.label(),
            self.duration_ms
        )?;
        match self.status {
            TestStatus::Failed => {
                if let Some(msg) = &self.error_message {
                    write!(f, " - {msg}")?;
                }
            }
            TestStatus::Skipped => {
                if let Some(reason) = &self.skip_reason {
                    write!(f, " - {reason}")?;
                }
            }
            TestStatus::Passed => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_id_key() {
        assert_eq!(UnitId::new(0, "math", 1, "adds", None).key, "math::adds");
        assert_eq!(
            UnitId::new(0, "math", 1, "square", Some(2)).to_string(),
            "math::square[2]"
        );
    }

    #[test]
    fn test_unit_id_orders_by_position() {
        // "zeta" comes first in the input, so it sorts first despite its name
        let first = UnitId::new(0, "zeta", 0, "b", None);
        let second = UnitId::new(1, "alpha", 0, "a", None);
        let param0 = UnitId::new(1, "alpha", 1, "p", Some(0));
        let param1 = UnitId::new(1, "alpha", 1, "p", Some(1));

        let mut ids = vec![param1.clone(), second.clone(), first.clone(), param0.clone()];
        ids.sort();
        assert_eq!(ids, vec![first, second, param0, param1]);
    }

    #[test]
    fn test_error_kind_from_failure_kind() {
        assert_eq!(
            ErrorKind::from(FailureKind::Assertion),
            ErrorKind::AssertionFailure
        );
        assert_eq!(
            ErrorKind::from(FailureKind::Cancelled),
            ErrorKind::UnexpectedException
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TestStatus::Passed.to_string(), "PASS");
        assert_eq!(TestStatus::Skipped.symbol(), "○");
        assert!(TestStatus::Passed.is_success());
        assert!(!TestStatus::Failed.is_success());
    }
}
