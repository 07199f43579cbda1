//! Data models for the test engine
//!
//! Descriptors handed in by discovery, options, and the outcomes handed back.

mod failure;
mod options;
mod outcome;
mod suite;

pub use failure::{FailureKind, TestFailure};
pub use options::{available_cores, ExecutionOptions};
pub use outcome::{ErrorKind, TestOutcome, TestStatus, UnitId};
pub use suite::{
    BodyResult, CaseInfo, CleanupHook, ParamBody, ParameterSet, SimpleBody, TestCase, TestSuite,
};
