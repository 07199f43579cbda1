//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::AppConfig;

/// Run suites of test cases described by a manifest
#[derive(Parser, Debug)]
#[command(name = "suite-engine")]
#[command(version)]
#[command(about = "Run test suites sequentially or in parallel and report structured outcomes")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to the standard search locations)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the suites of a manifest
    Run(RunArgs),

    /// List suites and cases of a manifest
    List(ListArgs),

    /// View stored run results
    Results(ResultsArgs),

    /// Manage configuration
    Config(ConfigArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Manifest file (YAML or JSON)
    pub manifest: PathBuf,

    /// Run one unit at a time
    #[arg(long)]
    pub sequential: bool,

    /// Maximum concurrent units (when parallel)
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Stop dispatching new units after the first failure
    #[arg(long)]
    pub stop_on_failure: bool,

    /// Deadline for the whole run in seconds
    #[arg(long)]
    pub global_timeout: Option<u64>,

    /// Timeout for cases that declare none, in milliseconds
    #[arg(long)]
    pub default_timeout_ms: Option<i64>,

    /// Output format (table, json, json-pretty, csv, summary)
    #[arg(short, long)]
    pub format: Option<String>,

    /// Only run cases whose `suite::case` contains this text
    #[arg(long)]
    pub filter: Option<String>,

    /// Named run profile (ci, debug, smoke, or one from the config file)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Store the run under the results directory
    #[arg(long)]
    pub save: bool,

    /// Also write formatted results to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Do not stream outcomes while the run is in progress
    #[arg(short, long)]
    pub quiet: bool,
}

impl RunArgs {
    /// Overlay flags given on the command line
    pub fn apply_to(&self, config: &mut AppConfig) {
        if self.sequential {
            config.parallel = false;
        }
        if let Some(max) = self.concurrency {
            config.max_concurrency = Some(max);
        }
        if self.stop_on_failure {
            config.stop_on_first_failure = true;
        }
        if let Some(secs) = self.global_timeout {
            config.global_timeout_secs = Some(secs);
        }
        if let Some(ms) = self.default_timeout_ms {
            config.default_timeout_ms = Some(ms);
        }
        if let Some(format) = &self.format {
            config.format = format.clone();
        }
        if let Some(filter) = &self.filter {
            config.filter = Some(filter.clone());
        }
    }
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Manifest file (YAML or JSON)
    pub manifest: PathBuf,

    /// Show commands, parameters and skip reasons
    #[arg(short, long)]
    pub detailed: bool,

    /// Only list cases whose `suite::case` contains this text
    #[arg(long)]
    pub filter: Option<String>,
}

/// Arguments for results command
#[derive(Parser, Debug)]
pub struct ResultsArgs {
    #[command(subcommand)]
    pub action: ResultsAction,
}

#[derive(Subcommand, Debug)]
pub enum ResultsAction {
    /// List stored runs
    List {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show a stored run
    Show {
        /// Run ID (defaults to the latest run)
        id: Option<String>,

        /// Output format
        #[arg(short, long, default_value = "table")]
        format: String,
    },

    /// Delete a stored run
    Delete {
        /// Run ID
        id: String,
    },
}

/// Arguments for config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Write an example configuration file
    Init {
        /// Output path
        #[arg(short, long, default_value = "suite-engine.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show {
        /// Also list environment variables
        #[arg(long)]
        env: bool,

        /// Apply a named profile
        #[arg(short, long)]
        profile: Option<String>,
    },

    /// Validate a configuration file
    Validate {
        /// File to validate
        file: PathBuf,
    },

    /// List available run profiles
    Profiles,
}
