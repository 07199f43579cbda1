//! Suite manifests
//!
//! A YAML or JSON file describing suites whose cases run external commands.
//! This is the discovery side of the CLI: it produces plain [`TestSuite`]
//! values and has no influence on how they are scheduled.
//!
//! ```yaml
//! default_timeout_ms: 10000
//! suites:
//!   - name: smoke
//!     cases:
//!       - name: true-passes
//!         command: ["true"]
//!       - name: exit-codes
//!         command: ["sh", "-c", "exit $0"]
//!         parameters:
//!           - arguments: [0]
//!           - arguments: [1]
//!             display_name: expected-failure
//! ```

mod command;

use chrono::Duration as TimeDelta;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub use command::{argument_string, run_command, CommandSpec};

use crate::models::{ParameterSet, TestCase, TestSuite};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML manifest: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse JSON manifest: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid manifest: {0}")]
    Invalid(String),
}

/// Top-level manifest document
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Timeout for cases that do not set their own
    #[serde(default)]
    pub default_timeout_ms: Option<i64>,

    /// Environment added to every command
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub suites: Vec<SuiteSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SuiteSpec {
    pub name: String,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub skip_reason: Option<String>,
    #[serde(default)]
    pub cases: Vec<CaseSpec>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CaseSpec {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub skip_reason: Option<String>,
    /// May be negative; the flattener treats that as no timeout
    #[serde(default)]
    pub timeout_ms: Option<i64>,
    /// Program followed by its arguments
    pub command: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    /// Present (even empty) makes this a parameterized case
    #[serde(default)]
    pub parameters: Option<Vec<ParameterSpec>>,
    /// Command run after the main command settles
    #[serde(default)]
    pub cleanup: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub skip_reason: Option<String>,
}

impl Manifest {
    /// Load from a `.yaml`/`.yml` or JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let manifest = if is_yaml_file(path) {
            Self::from_yaml(&content)?
        } else {
            Self::from_json(&content)?
        };
        Ok(manifest)
    }

    pub fn from_yaml(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_yaml::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn from_json(content: &str) -> Result<Self, ManifestError> {
        let manifest: Self = serde_json::from_str(content)?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        let mut suite_names = HashSet::new();

        for suite in &self.suites {
            if suite.name.trim().is_empty() {
                return Err(ManifestError::Invalid("suite with empty name".to_string()));
            }
            if !suite_names.insert(suite.name.as_str()) {
                return Err(ManifestError::Invalid(format!(
                    "duplicate suite '{}'",
                    suite.name
                )));
            }
            if suite.skip && suite.skip_reason.is_none() {
                return Err(ManifestError::Invalid(format!(
                    "suite '{}' is skipped without a skip_reason",
                    suite.name
                )));
            }

            let mut case_names = HashSet::new();
            for case in &suite.cases {
                if !case_names.insert(case.name.as_str()) {
                    return Err(ManifestError::Invalid(format!(
                        "duplicate case '{}' in suite '{}'",
                        case.name, suite.name
                    )));
                }
                if case.command.is_empty() {
                    return Err(ManifestError::Invalid(format!(
                        "case '{}::{}' has an empty command",
                        suite.name, case.name
                    )));
                }
                if matches!(&case.cleanup, Some(cleanup) if cleanup.is_empty()) {
                    return Err(ManifestError::Invalid(format!(
                        "case '{}::{}' has an empty cleanup command",
                        suite.name, case.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Keep only cases whose `suite::case` key contains `pattern`
    pub fn filter(&mut self, pattern: &str) {
        for suite in &mut self.suites {
            let suite_name = suite.name.clone();
            suite
                .cases
                .retain(|case| format!("{}::{}", suite_name, case.name).contains(pattern));
        }
        self.suites.retain(|suite| !suite.cases.is_empty());
    }

    /// Number of cases across all suites
    pub fn case_count(&self) -> usize {
        self.suites.iter().map(|s| s.cases.len()).sum()
    }

    /// Convert into engine descriptors
    pub fn to_suites(&self) -> Vec<TestSuite> {
        self.suites
            .iter()
            .map(|suite| TestSuite {
                name: suite.name.clone(),
                skip: suite.skip,
                skip_reason: suite.skip_reason.clone(),
                cases: suite.cases.iter().map(|case| self.to_case(case)).collect(),
            })
            .collect()
    }

    fn to_case(&self, case: &CaseSpec) -> TestCase {
        let spec = Arc::new(self.command_spec(&case.command, case));

        let mut test_case = match &case.parameters {
            None => TestCase::simple(case.name.clone(), move |token| {
                let spec = spec.clone();
                async move { run_command(&spec, &[], token).await }
            }),
            Some(parameters) => TestCase::parameterized(
                case.name.clone(),
                parameters.iter().map(to_parameter_set).collect(),
                move |arguments, token| {
                    let spec = spec.clone();
                    async move { run_command(&spec, &arguments, token).await }
                },
            ),
        };

        if let Some(name) = &case.display_name {
            test_case = test_case.with_display_name(name.clone());
        }
        if case.skip {
            test_case = test_case.skip(
                case.skip_reason
                    .clone()
                    .unwrap_or_else(|| "skipped in manifest".to_string()),
            );
        }
        if let Some(ms) = case.timeout_ms.or(self.default_timeout_ms) {
            test_case = test_case.with_timeout_delta(TimeDelta::milliseconds(ms));
        }
        if let Some(cleanup) = &case.cleanup {
            let spec = Arc::new(self.command_spec(cleanup, case));
            test_case = test_case.with_cleanup(move || {
                let spec = spec.clone();
                // The engine bounds cleanup; dropping the future kills the child
                async move { run_command(&spec, &[], CancellationToken::new()).await }
            });
        }

        test_case
    }

    fn command_spec(&self, argv: &[String], case: &CaseSpec) -> CommandSpec {
        let mut spec = CommandSpec::from_argv(argv).unwrap_or_default();
        spec.env = self
            .env
            .iter()
            .chain(case.env.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        spec.working_dir = case.working_dir.clone();
        spec
    }
}

fn to_parameter_set(spec: &ParameterSpec) -> ParameterSet {
    ParameterSet {
        arguments: spec.arguments.clone(),
        display_name: spec.display_name.clone(),
        skip: spec.skip,
        skip_reason: spec.skip_reason.clone(),
    }
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}
