//! Results storage and retrieval
//!
//! Provides persistent storage for completed runs in JSON format.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::TestSummary;
use crate::models::{ExecutionOptions, TestOutcome};

/// A completed run as written to disk
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoredRun {
    /// Unique run ID
    pub id: String,

    /// Manifest the suites were loaded from
    pub source: String,

    /// Timestamp when the run started
    pub started_at: DateTime<Utc>,

    /// Timestamp when the run completed
    pub completed_at: DateTime<Utc>,

    /// Options the run was executed with
    pub options: ExecutionOptions,

    /// Outcomes sorted by unit id
    pub outcomes: Vec<TestOutcome>,

    pub summary: TestSummary,

    /// Environment info
    pub environment: EnvironmentInfo,
}

/// Environment information
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    /// Operating system
    pub os: String,

    /// Architecture
    pub arch: String,

    /// Tool version
    pub tool_version: String,
}

impl Default for EnvironmentInfo {
    fn default() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl StoredRun {
    pub fn new(
        source: impl Into<String>,
        started_at: DateTime<Utc>,
        options: ExecutionOptions,
        outcomes: Vec<TestOutcome>,
        summary: TestSummary,
    ) -> Self {
        Self {
            id: generate_run_id(),
            source: source.into(),
            started_at,
            completed_at: Utc::now(),
            options,
            outcomes,
            summary,
            environment: EnvironmentInfo::default(),
        }
    }
}

/// Generate unique run ID
fn generate_run_id() -> String {
    let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
    let random: u32 = rand::random::<u32>() % 10000;
    format!("{timestamp}_{random:04}")
}

/// Brief run information
#[derive(Clone, Debug)]
pub struct RunInfo {
    pub id: String,
    pub source: String,
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub pass_rate: f64,
}

/// Results storage manager
pub struct ResultsStorage {
    base_dir: PathBuf,
}

impl ResultsStorage {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Storage under the platform data directory
    pub fn default_dir() -> Self {
        let base_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("suite-engine")
            .join("results");
        Self::new(base_dir)
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn run_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(format!("{run_id}.json"))
    }

    /// Save a run, returning the file it was written to
    pub fn save(&self, run: &StoredRun) -> Result<PathBuf> {
        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create results directory: {}",
                self.base_dir.display()
            )
        })?;

        let path = self.run_path(&run.id);
        let file = File::create(&path).context("Failed to create results file")?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, run).context("Failed to write results")?;

        info!("Saved run results to {}", path.display());
        Ok(path)
    }

    pub fn load(&self, run_id: &str) -> Result<StoredRun> {
        let path = self.run_path(run_id);
        let run = Self::load_from_path(&path)?;
        debug!("Loaded run results from {}", path.display());
        Ok(run)
    }

    pub fn load_from_path(path: &Path) -> Result<StoredRun> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open results file: {}", path.display()))?;
        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse results: {}", path.display()))
    }

    /// List stored runs, newest first
    pub fn list_runs(&self) -> Result<Vec<RunInfo>> {
        if !self.base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.base_dir)? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                match Self::load_from_path(&path) {
                    Ok(run) => runs.push(RunInfo {
                        id: run.id,
                        source: run.source,
                        started_at: run.started_at,
                        total: run.summary.total,
                        pass_rate: run.summary.pass_rate,
                    }),
                    Err(e) => debug!("Failed to load {}: {:#}", path.display(), e),
                }
            }
        }

        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }

    pub fn latest(&self) -> Result<Option<StoredRun>> {
        match self.list_runs()?.into_iter().next() {
            Some(info) => Ok(Some(self.load(&info.id)?)),
            None => Ok(None),
        }
    }

    pub fn delete(&self, run_id: &str) -> Result<()> {
        let path = self.run_path(run_id);
        if path.exists() {
            fs::remove_file(&path)?;
            info!("Deleted results: {}", path.display());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::summarize;
    use tempfile::tempdir;

    fn empty_run(source: &str) -> StoredRun {
        StoredRun::new(
            source,
            Utc::now(),
            ExecutionOptions::sequential(),
            Vec::new(),
            summarize(&[]),
        )
    }

    #[test]
    fn test_generate_run_id() {
        let id = generate_run_id();
        assert!(!id.is_empty());
        assert_eq!(id.len(), "20260101_120000_0000".len());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path());

        let run = empty_run("suites.yaml");
        let path = storage.save(&run).unwrap();
        assert!(path.exists());

        let loaded = storage.load(&run.id).unwrap();
        assert_eq!(loaded.id, run.id);
        assert_eq!(loaded.source, "suites.yaml");
        assert_eq!(loaded.options, run.options);
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempdir().unwrap();
        let storage = ResultsStorage::new(dir.path().join("results"));
        assert!(storage.list_runs().unwrap().is_empty());

        let run = empty_run("a.yaml");
        storage.save(&run).unwrap();

        let runs = storage.list_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].source, "a.yaml");
        assert_eq!(storage.latest().unwrap().map(|r| r.id), Some(run.id.clone()));

        storage.delete(&run.id).unwrap();
        assert!(storage.list_runs().unwrap().is_empty());
    }

    #[test]
    fn test_environment_info() {
        let env = EnvironmentInfo::default();
        assert!(!env.os.is_empty());
        assert_eq!(env.tool_version, env!("CARGO_PKG_VERSION"));
    }
}
