//! suite-engine - run test suites described by a manifest
//!
//! ## Usage
//!
//! ```bash
//! # Run every suite in parallel
//! suite-engine run suites.yaml
//!
//! # One unit at a time, stop after the first failure
//! suite-engine run suites.yaml --sequential --stop-on-failure
//!
//! # Fail-fast CI run, stored for later inspection
//! suite-engine run suites.yaml --profile ci --save --format json
//!
//! # Inspect stored runs
//! suite-engine results list
//! suite-engine results show
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use suite_engine::cli::{
    Args, Command, ConfigAction, ConfigArgs, ListArgs, ResultsAction, ResultsArgs, RunArgs,
};
use suite_engine::config::{self, print_env_help, AppConfig, ConfigFile, EnvConfig, RunProfile};
use suite_engine::executor::{flatten, LogListener, TestEngine};
use suite_engine::manifest::Manifest;
use suite_engine::output::{write_run_to_file, OutputFormat, ResultFormatter};
use suite_engine::results::{summarize, ResultsStorage, StoredRun};
use suite_engine::utils::{init_logger, LogLevel};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let args = Args::parse();

    let env = EnvConfig::load();
    let file = load_config_file(args.config.as_deref(), &env)?;

    let profile = match &args.command {
        Command::Run(run_args) => run_args.profile.as_deref(),
        Command::Config(ConfigArgs {
            action: ConfigAction::Show { profile, .. },
        }) => profile.as_deref(),
        _ => None,
    };
    let mut app = config::resolve(&file, profile, &env)?;
    if let Command::Run(run_args) = &args.command {
        run_args.apply_to(&mut app);
    }

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        app.log_level.parse().unwrap_or(LogLevel::Info)
    };
    init_logger(level);

    match args.command {
        Command::Run(run_args) => run_suites(run_args, app).await,
        Command::List(list_args) => {
            list_cases(list_args)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Results(results_args) => {
            show_results(results_args, &app)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Config(config_args) => {
            manage_config(config_args, &file, &env, &app)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Explicit path first, then SUITE_ENGINE_CONFIG, then the search locations
fn load_config_file(explicit: Option<&Path>, env: &EnvConfig) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        return ConfigFile::load(path);
    }
    if let Some(path) = &env.config_file {
        return ConfigFile::load(path);
    }
    ConfigFile::load_default()
}

fn results_storage(app: &AppConfig) -> ResultsStorage {
    match &app.results_dir {
        Some(dir) => ResultsStorage::new(dir),
        None => ResultsStorage::default_dir(),
    }
}

async fn run_suites(args: RunArgs, app: AppConfig) -> Result<ExitCode> {
    let format: OutputFormat = app.format.parse()?;
    let formatter = ResultFormatter::new(format);

    let mut manifest = Manifest::load(&args.manifest)?;
    if let Some(pattern) = &app.filter {
        manifest.filter(pattern);
        info!("Filter '{}' kept {} case(s)", pattern, manifest.case_count());
    }
    if manifest.default_timeout_ms.is_none() {
        manifest.default_timeout_ms = app.default_timeout_ms;
    }
    let suites = manifest.to_suites();

    let options = app.execution_options();
    let mut engine = TestEngine::new(options.clone());
    if !args.quiet {
        engine = engine.with_listener(LogListener);
    }

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            interrupt.cancel();
        }
    });

    info!("Running {}", args.manifest.display());
    let started_at = Utc::now();

    let run = match engine.run(&suites, &cancel).await {
        Ok(run) => run,
        Err(err) => {
            // Show what settled before the abort, then report the abort itself
            let completed = err.completed();
            if !completed.is_empty() {
                let summary = summarize(completed);
                println!("{}", formatter.format_run(completed, &summary)?);
            }
            return Err(err.into());
        }
    };

    println!("{}", formatter.format_run(&run.outcomes, &run.summary)?);

    if let Some(path) = &args.output {
        write_run_to_file(path, &run.outcomes, &run.summary, format)?;
        info!("Results written to {}", path.display());
    }

    let exit_code = run.summary.exit_code();

    if args.save {
        let stored = StoredRun::new(
            args.manifest.display().to_string(),
            started_at,
            options,
            run.outcomes,
            run.summary,
        );
        let path = results_storage(&app).save(&stored)?;
        println!("Saved run {} to {}", stored.id, path.display());
    }

    Ok(ExitCode::from(exit_code as u8))
}

fn list_cases(args: ListArgs) -> Result<()> {
    let mut manifest = Manifest::load(&args.manifest)?;
    if let Some(pattern) = &args.filter {
        manifest.filter(pattern);
    }
    let units = flatten(&manifest.to_suites());

    println!(
        "\n{} suite(s), {} case(s), {} unit(s)\n",
        manifest.suites.len(),
        manifest.case_count(),
        units.len()
    );

    for suite in &manifest.suites {
        let suite_skip = if suite.skip { " [skipped]" } else { "" };
        println!("{}{}", suite.name, suite_skip);
        println!("──────────────────────────────────────────────────────────────────────");

        for case in &suite.cases {
            let case_skip = if case.skip { " [skipped]" } else { "" };
            println!("  {}{}", case.name, case_skip);

            if !args.detailed {
                continue;
            }
            if let Some(name) = &case.display_name {
                println!("      display:  {name}");
            }
            println!("      command:  {}", case.command.join(" "));
            if let Some(ms) = case.timeout_ms.or(manifest.default_timeout_ms) {
                println!("      timeout:  {ms}ms");
            }
            if let Some(reason) = case.skip_reason.as_ref().or(suite.skip_reason.as_ref()) {
                println!("      reason:   {reason}");
            }
            if let Some(parameters) = &case.parameters {
                println!("      parameter sets: {}", parameters.len());
            }
        }
        println!();
    }

    if args.detailed {
        println!("Units:");
        for unit in &units {
            let marker = if unit.skip { "○" } else { "•" };
            println!("  {} {}", marker, unit.id);
        }
        println!();
    }

    Ok(())
}

fn show_results(args: ResultsArgs, app: &AppConfig) -> Result<()> {
    let storage = results_storage(app);

    match args.action {
        ResultsAction::List { limit } => {
            let runs = storage.list_runs()?;
            if runs.is_empty() {
                println!("\nNo stored runs in {}", storage.base_dir().display());
                println!("   Store one with: suite-engine run <manifest> --save\n");
                return Ok(());
            }

            println!("\n┌──────────────────────┬──────────────────────┬───────┬─────────┐");
            println!("│ Run ID               │ Started              │ Units │ Passed  │");
            println!("├──────────────────────┼──────────────────────┼───────┼─────────┤");
            for run in runs.iter().take(limit) {
                println!(
                    "│ {:20} │ {:20} │ {:5} │ {:6.1}% │",
                    run.id,
                    run.started_at.format("%Y-%m-%d %H:%M:%S"),
                    run.total,
                    run.pass_rate * 100.0
                );
            }
            println!("└──────────────────────┴──────────────────────┴───────┴─────────┘\n");
        }
        ResultsAction::Show { id, format } => {
            let run = match id {
                Some(id) => storage.load(&id)?,
                None => storage
                    .latest()?
                    .context("No stored runs; store one with `run --save`")?,
            };
            let format: OutputFormat = format.parse()?;

            println!("Run {} ({})", run.id, run.source);
            println!(
                "Started {} on {}/{}",
                run.started_at.to_rfc3339(),
                run.environment.os,
                run.environment.arch
            );
            println!(
                "{}",
                ResultFormatter::new(format).format_run(&run.outcomes, &run.summary)?
            );
        }
        ResultsAction::Delete { id } => {
            storage.delete(&id)?;
            println!("Deleted run {id}");
        }
    }

    Ok(())
}

fn manage_config(
    args: ConfigArgs,
    file: &ConfigFile,
    env: &EnvConfig,
    app: &AppConfig,
) -> Result<()> {
    match args.action {
        ConfigAction::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists; use --force to overwrite",
                    output.display()
                );
            }
            ConfigFile::example().save(&output)?;
            println!("Wrote example configuration to {}", output.display());
        }
        ConfigAction::Show { env: show_env, .. } => {
            println!("{}", serde_yaml::to_string(app)?);
            if show_env {
                env.print_summary();
                println!();
                print_env_help();
            }
        }
        ConfigAction::Validate { file: path } => {
            let loaded = ConfigFile::load(&path)?;
            println!(
                "✓ {} is valid (version {}, {} profile(s))",
                path.display(),
                loaded.version,
                loaded.profiles.len()
            );
        }
        ConfigAction::Profiles => {
            println!("\nPredefined profiles:");
            for profile in RunProfile::predefined() {
                println!("  {:12} {}", profile.name, profile.description);
            }
            if !file.profiles.is_empty() {
                println!("\nFrom configuration file:");
                for profile in &file.profiles {
                    println!("  {:12} {}", profile.name, profile.description);
                }
            }
            println!();
        }
    }

    Ok(())
}
