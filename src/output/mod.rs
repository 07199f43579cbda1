//! Output formatting module
//!
//! Provides various output formats for test results.

mod formatter;

pub use formatter::{write_run_to_file, OutputFormat, ResultFormatter};
