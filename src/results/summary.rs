//! Outcome aggregation

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::models::{ErrorKind, TestOutcome, TestStatus};

/// Counters for a set of outcomes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total_duration_ms: u64,
    /// Fraction of all outcomes that passed, 0.0 - 1.0
    pub pass_rate: f64,
    pub all_passed: bool,
    pub failures_by_kind: BTreeMap<ErrorKind, usize>,
}

impl TestSummary {
    pub fn pass_rate_percent(&self) -> f64 {
        self.pass_rate * 100.0
    }

    /// Process exit code: 0 when nothing failed
    pub fn exit_code(&self) -> i32 {
        if self.all_passed {
            0
        } else {
            1
        }
    }
}

/// Reduce outcomes to a summary. Order independent.
pub fn summarize(outcomes: &[TestOutcome]) -> TestSummary {
    let total = outcomes.len();
    let mut passed = 0;
    let mut failed = 0;
    let mut skipped = 0;
    let mut failures_by_kind = BTreeMap::new();

    for outcome in outcomes {
        match outcome.status {
            TestStatus::Passed => passed += 1,
            TestStatus::Skipped => skipped += 1,
            TestStatus::Failed => {
                failed += 1;
                let kind = outcome.error_kind.unwrap_or(ErrorKind::UnexpectedException);
                *failures_by_kind.entry(kind).or_insert(0) += 1;
            }
        }
    }

    let pass_rate = if total == 0 {
        0.0
    } else {
        passed as f64 / total as f64
    };

    TestSummary {
        total,
        passed,
        failed,
        skipped,
        total_duration_ms: outcomes.iter().map(|o| o.duration_ms).sum(),
        pass_rate,
        all_passed: failed == 0,
        failures_by_kind,
    }
}

impl fmt::Display for TestSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Skip: {}",
            self.total, self.passed, self.failed, self.skipped
        )?;
        write!(
            f,
            "Pass Rate: {:.1}% | Duration: {}ms",
            self.pass_rate_percent(),
            self.total_duration_ms
        )?;
        if !self.failures_by_kind.is_empty() {
            let kinds: Vec<String> = self
                .failures_by_kind
                .iter()
                .map(|(kind, count)| format!("{kind}: {count}"))
                .collect();
            write!(f, "\nFailures: {}", kinds.join(", "))?;
        }
        Ok(())
    }
}
