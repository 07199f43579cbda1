//! Output formatters for test results
//!
//! Provides table, JSON, CSV, and summary output formats.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::models::{TestOutcome, TestStatus};
use crate::results::TestSummary;

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::JsonPretty => "json-pretty",
            OutputFormat::Csv => "csv",
            OutputFormat::Summary => "summary",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Ok(OutputFormat::JsonPretty),
            "csv" => Ok(OutputFormat::Csv),
            "summary" => Ok(OutputFormat::Summary),
            other => anyhow::bail!("Unknown output format: {other}"),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// JSON shape of a whole run
#[derive(Serialize)]
struct RunReport<'a> {
    summary: &'a TestSummary,
    outcomes: &'a [TestOutcome],
}

/// One CSV row per outcome
#[derive(Serialize)]
struct CsvRow<'a> {
    suite: &'a str,
    case: &'a str,
    key: &'a str,
    display_name: &'a str,
    status: TestStatus,
    duration_ms: u64,
    error_kind: &'a str,
    error_message: &'a str,
    skip_reason: &'a str,
    start_time: String,
}

impl<'a> From<&'a TestOutcome> for CsvRow<'a> {
    fn from(outcome: &'a TestOutcome) -> Self {
        Self {
            suite: &outcome.suite_name,
            case: &outcome.case_name,
            key: &outcome.id.key,
            display_name: outcome.display_name.as_deref().unwrap_or(""),
            status: outcome.status,
            duration_ms: outcome.duration_ms,
            error_kind: outcome.error_kind.map(|k| k.name()).unwrap_or(""),
            error_message: outcome.error_message.as_deref().unwrap_or(""),
            skip_reason: outcome.skip_reason.as_deref().unwrap_or(""),
            start_time: outcome.start_time.to_rfc3339(),
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    fn status_label(&self, status: TestStatus) -> String {
        let plain = format!("{} {}", status.symbol(), status);
        if !self.colorize {
            return plain;
        }
        let color = match status {
            TestStatus::Passed => "32",
            TestStatus::Failed => "31",
            TestStatus::Skipped => "33",
        };
        format!("\x1b[{color}m{plain}\x1b[0m")
    }

    fn outcome_row(&self, outcome: &TestOutcome) -> String {
        let mut row = format!(
            "{:<48} {} [{:>7}ms]",
            outcome.label(),
            self.status_label(outcome.status),
            outcome.duration_ms
        );
        match outcome.status {
            TestStatus::Failed => {
                if let (Some(kind), Some(msg)) = (outcome.error_kind, &outcome.error_message) {
                    row.push_str(&format!("\n      {kind}: {msg}"));
                }
            }
            TestStatus::Skipped => {
                if let Some(reason) = &outcome.skip_reason {
                    row.push_str(&format!("\n      skipped: {reason}"));
                }
            }
            TestStatus::Passed => {}
        }
        row
    }

    /// Format every outcome of a run followed by its summary
    pub fn format_run(&self, outcomes: &[TestOutcome], summary: &TestSummary) -> Result<String> {
        let report = RunReport { summary, outcomes };
        Ok(match self.format {
            OutputFormat::Table => self.run_table(outcomes, summary),
            OutputFormat::Json => serde_json::to_string(&report)?,
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
            OutputFormat::Csv => csv_rows(outcomes)?,
            OutputFormat::Summary => self.summary_line(summary),
        })
    }

    fn run_table(&self, outcomes: &[TestOutcome], summary: &TestSummary) -> String {
        let mut output = String::new();
        let mut current_suite: Option<&str> = None;

        for outcome in outcomes {
            if current_suite != Some(outcome.suite_name.as_str()) {
                output.push_str(&format!("\n{}\n", outcome.suite_name));
                output.push_str(&format!("{}\n", "─".repeat(outcome.suite_name.chars().count())));
                current_suite = Some(outcome.suite_name.as_str());
            }
            output.push_str("  ");
            output.push_str(&self.outcome_row(outcome));
            output.push('\n');
        }

        output.push('\n');
        output.push_str(&self.format_summary(summary));
        output
    }

    /// Format the aggregate counters only
    pub fn format_summary(&self, summary: &TestSummary) -> String {
        let mut output = String::new();
        output.push_str("══════════════════════════════════════════════════════════════\n");

        let fail_str = if self.colorize && summary.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.failed)
        } else {
            summary.failed.to_string()
        };
        output.push_str(&format!(
            " Total: {} | Pass: {} | Fail: {} | Skip: {}\n",
            summary.total, summary.passed, fail_str, summary.skipped
        ));
        output.push_str(&format!(
            " Pass Rate: {:.1}% | Duration: {}ms\n",
            summary.pass_rate_percent(),
            summary.total_duration_ms
        ));
        for (kind, count) in &summary.failures_by_kind {
            output.push_str(&format!("   {kind}: {count}\n"));
        }
        output.push_str("══════════════════════════════════════════════════════════════\n");
        output
    }

    fn summary_line(&self, summary: &TestSummary) -> String {
        let verdict = if summary.all_passed { "PASSED" } else { "FAILED" };
        format!(
            "{verdict}: {}/{} passed, {} failed, {} skipped ({:.1}%) in {}ms",
            summary.passed,
            summary.total,
            summary.failed,
            summary.skipped,
            summary.pass_rate_percent(),
            summary.total_duration_ms
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

fn csv_rows(outcomes: &[TestOutcome]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for outcome in outcomes {
        writer.serialize(CsvRow::from(outcome))?;
    }
    let bytes = writer.into_inner().context("Failed to flush CSV output")?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}

/// Write a whole run to a file without color codes
pub fn write_run_to_file(
    path: impl AsRef<Path>,
    outcomes: &[TestOutcome],
    summary: &TestSummary,
    format: OutputFormat,
) -> Result<()> {
    let path = path.as_ref();
    let content = ResultFormatter::new(format)
        .no_color()
        .format_run(outcomes, summary)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write results: {}", path.display()))
}
