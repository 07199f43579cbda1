//! Configuration module
//!
//! Handles loading and layering configuration: defaults, config file,
//! profile, then environment. CLI flags are applied last by the binary.

mod env;
mod file;
mod profile;

pub use env::{print_env_help, EnvBuilder, EnvConfig, EnvGuard};
pub use file::ConfigFile;
pub use profile::RunProfile;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::{available_cores, ExecutionOptions};

/// Application configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Run units in parallel
    pub parallel: bool,

    /// Maximum concurrent units; `None` means one per available core
    pub max_concurrency: Option<usize>,

    /// Stop dispatching after the first failure
    pub stop_on_first_failure: bool,

    /// Deadline for the whole run in seconds
    pub global_timeout_secs: Option<u64>,

    /// Timeout applied to manifest cases without their own
    pub default_timeout_ms: Option<i64>,

    /// Output format (table, json, json-pretty, csv, summary)
    pub format: String,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Directory for stored runs; platform data dir when unset
    pub results_dir: Option<String>,

    /// Only run cases whose `suite::case` key contains this
    pub filter: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            max_concurrency: None,
            stop_on_first_failure: false,
            global_timeout_secs: None,
            default_timeout_ms: None,
            format: "table".to_string(),
            log_level: "info".to_string(),
            results_dir: None,
            filter: None,
        }
    }
}

impl AppConfig {
    /// Build engine options from this configuration
    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            parallel: self.parallel,
            max_concurrency: self.max_concurrency.unwrap_or_else(available_cores),
            stop_on_first_failure: self.stop_on_first_failure,
            global_timeout: self.global_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Overlay a profile's settings
    pub fn apply_profile(&mut self, profile: &RunProfile) {
        if let Some(parallel) = profile.parallel {
            self.parallel = parallel;
        }
        if let Some(max) = profile.max_concurrency {
            self.max_concurrency = Some(max);
        }
        if let Some(stop) = profile.stop_on_first_failure {
            self.stop_on_first_failure = stop;
        }
        if let Some(secs) = profile.global_timeout_secs {
            self.global_timeout_secs = Some(secs);
        }
        if let Some(ms) = profile.default_timeout_ms {
            self.default_timeout_ms = Some(ms);
        }
        if let Some(filter) = &profile.filter {
            self.filter = Some(filter.clone());
        }
    }

    /// Overlay environment variable settings
    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(parallel) = env.parallel {
            self.parallel = parallel;
        }
        if let Some(max) = env.concurrency {
            self.max_concurrency = Some(max);
        }
        if let Some(stop) = env.stop_on_failure {
            self.stop_on_first_failure = stop;
        }
        if let Some(secs) = env.global_timeout {
            self.global_timeout_secs = Some(secs);
        }
        if let Some(format) = &env.format {
            self.format = format.clone();
        }
        if let Some(level) = &env.log_level {
            self.log_level = level.clone();
        }
        if let Some(dir) = &env.results_dir {
            self.results_dir = Some(dir.clone());
        }
    }
}

/// Resolve settings from file, optional profile and environment
pub fn resolve(file: &ConfigFile, profile: Option<&str>, env: &EnvConfig) -> Result<AppConfig> {
    let mut config = file.app.clone();

    if let Some(name) = profile {
        let profile = file
            .profile(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown profile: {name}"))?;
        config.apply_profile(&profile);
    }

    config.apply_env(env);
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.parallel);
        assert_eq!(config.format, "table");
        assert!(config.max_concurrency.is_none());
    }

    #[test]
    fn test_execution_options() {
        let config = AppConfig {
            parallel: false,
            max_concurrency: Some(3),
            stop_on_first_failure: true,
            global_timeout_secs: Some(60),
            ..Default::default()
        };

        let options = config.execution_options();
        assert!(!options.parallel);
        assert_eq!(options.max_concurrency, 3);
        assert!(options.stop_on_first_failure);
        assert_eq!(options.global_timeout, Some(Duration::from_secs(60)));
    }

    #[test]
    fn test_resolve_precedence() {
        let mut file = ConfigFile::default();
        file.app.max_concurrency = Some(8);
        file.profiles.push(RunProfile::ci());

        let env = EnvConfig {
            concurrency: Some(2),
            ..Default::default()
        };

        let config = resolve(&file, Some("ci"), &env).unwrap();
        // Profile beats file, environment beats profile
        assert!(config.stop_on_first_failure);
        assert_eq!(config.max_concurrency, Some(2));
    }

    #[test]
    fn test_resolve_unknown_profile() {
        let result = resolve(&ConfigFile::default(), Some("nope"), &EnvConfig::default());
        assert!(result.is_err());
    }
}
