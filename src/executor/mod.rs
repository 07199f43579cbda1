//! Test execution engine
//!
//! Flattens descriptors into units and runs them sequentially or with
//! bounded parallelism.

mod engine;
mod listener;
mod parallel;
mod runner;
mod unit;

pub use engine::{TestEngine, TestRun};
pub use listener::{LogListener, OutcomeListener};
pub use runner::{run_unit, Abandoned};
pub use unit::{flatten, ExecutionUnit, Invoke};
