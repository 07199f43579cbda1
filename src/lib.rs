//! Suite Engine - test execution engine
//!
//! Runs suites of test cases, sequentially or with bounded parallelism,
//! and reports one structured outcome per execution unit.
//!
//! ## Features
//!
//! - Simple and parameterized cases, one unit per parameter set
//! - Skips at suite, case and parameter level
//! - Per-unit timeouts and an optional global deadline
//! - Stop-on-first-failure with cooperative cancellation
//! - Outcomes sorted by discovery position regardless of completion order
//!
//! ## Example
//!
//! ```no_run
//! use suite_engine::executor::TestEngine;
//! use suite_engine::models::{ExecutionOptions, TestCase, TestSuite};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let suite = TestSuite::new("math").with_case(TestCase::simple("adds", |_token| async {
//!     suite_engine::ensure_that!(1 + 1 == 2, "addition is broken");
//!     Ok(())
//! }));
//!
//! let engine = TestEngine::new(ExecutionOptions::default().with_max_concurrency(4));
//! let run = engine.run(&[suite], &CancellationToken::new()).await?;
//! assert!(run.summary.all_passed);
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod manifest;
pub mod models;
pub mod output;
pub mod results;
pub mod utils;

pub use error::{EngineError, EngineResult};
pub use executor::{TestEngine, TestRun};
pub use models::{ExecutionOptions, TestCase, TestFailure, TestOutcome, TestStatus, TestSuite};
pub use results::{summarize, TestSummary};
