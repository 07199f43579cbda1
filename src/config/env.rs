//! Environment variable configuration
//!
//! Provides environment variable overrides for configuration.

use std::env;

/// Environment variable prefix
const ENV_PREFIX: &str = "SUITE_ENGINE";

/// Environment configuration from environment variables
#[derive(Clone, Debug, Default)]
pub struct EnvConfig {
    /// From SUITE_ENGINE_PARALLEL
    pub parallel: Option<bool>,
    /// From SUITE_ENGINE_CONCURRENCY
    pub concurrency: Option<usize>,
    /// From SUITE_ENGINE_STOP_ON_FAILURE
    pub stop_on_failure: Option<bool>,
    /// Seconds, from SUITE_ENGINE_GLOBAL_TIMEOUT
    pub global_timeout: Option<u64>,
    /// From SUITE_ENGINE_FORMAT
    pub format: Option<String>,
    /// From SUITE_ENGINE_LOG
    pub log_level: Option<String>,
    /// From SUITE_ENGINE_CONFIG
    pub config_file: Option<String>,
    /// From SUITE_ENGINE_RESULTS_DIR
    pub results_dir: Option<String>,
}

impl EnvConfig {
    /// Load configuration from environment variables
    pub fn load() -> Self {
        Self {
            parallel: get_env_bool("PARALLEL"),
            concurrency: get_env_parse("CONCURRENCY"),
            stop_on_failure: get_env_bool("STOP_ON_FAILURE"),
            global_timeout: get_env_parse("GLOBAL_TIMEOUT"),
            format: get_env("FORMAT"),
            log_level: get_env("LOG"),
            config_file: get_env("CONFIG"),
            results_dir: get_env("RESULTS_DIR"),
        }
    }

    /// Check if any environment variables are set
    pub fn has_any(&self) -> bool {
        self.parallel.is_some()
            || self.concurrency.is_some()
            || self.stop_on_failure.is_some()
            || self.global_timeout.is_some()
            || self.format.is_some()
            || self.log_level.is_some()
            || self.config_file.is_some()
            || self.results_dir.is_some()
    }

    /// Print current environment configuration
    pub fn print_summary(&self) {
        println!("Environment Configuration:");
        println!("  {ENV_PREFIX}_PARALLEL:        {:?}", self.parallel);
        println!("  {ENV_PREFIX}_CONCURRENCY:     {:?}", self.concurrency);
        println!("  {ENV_PREFIX}_STOP_ON_FAILURE: {:?}", self.stop_on_failure);
        println!("  {ENV_PREFIX}_GLOBAL_TIMEOUT:  {:?}", self.global_timeout);
        println!("  {ENV_PREFIX}_FORMAT:          {:?}", self.format);
        println!("  {ENV_PREFIX}_LOG:             {:?}", self.log_level);
        println!("  {ENV_PREFIX}_CONFIG:          {:?}", self.config_file);
        println!("  {ENV_PREFIX}_RESULTS_DIR:     {:?}", self.results_dir);
    }
}

/// Get environment variable with prefix
fn get_env(name: &str) -> Option<String> {
    env::var(format!("{ENV_PREFIX}_{name}")).ok()
}

/// Get environment variable and parse to type
fn get_env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    get_env(name).and_then(|v| v.trim().parse().ok())
}

/// Get environment variable as boolean
fn get_env_bool(name: &str) -> Option<bool> {
    get_env(name).map(|v| {
        matches!(
            v.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on" | "enabled"
        )
    })
}

/// Builder for setting environment variables in tests
pub struct EnvBuilder {
    vars: Vec<(String, String)>,
}

impl EnvBuilder {
    pub fn new() -> Self {
        Self { vars: Vec::new() }
    }

    fn var(mut self, name: &str, value: impl ToString) -> Self {
        self.vars
            .push((format!("{ENV_PREFIX}_{name}"), value.to_string()));
        self
    }

    pub fn parallel(self, parallel: bool) -> Self {
        self.var("PARALLEL", parallel)
    }

    pub fn concurrency(self, max: usize) -> Self {
        self.var("CONCURRENCY", max)
    }

    pub fn stop_on_failure(self, stop: bool) -> Self {
        self.var("STOP_ON_FAILURE", stop)
    }

    pub fn global_timeout(self, secs: u64) -> Self {
        self.var("GLOBAL_TIMEOUT", secs)
    }

    pub fn format(self, format: impl Into<String>) -> Self {
        self.var("FORMAT", format.into())
    }

    pub fn results_dir(self, dir: impl Into<String>) -> Self {
        self.var("RESULTS_DIR", dir.into())
    }

    /// Apply environment variables
    pub fn apply(self) {
        for (key, value) in self.vars {
            env::set_var(key, value);
        }
    }

    /// Apply and return guard that restores on drop
    pub fn apply_scoped(self) -> EnvGuard {
        let previous: Vec<_> = self
            .vars
            .iter()
            .map(|(k, _)| (k.clone(), env::var(k).ok()))
            .collect();

        self.apply();

        EnvGuard { previous }
    }
}

impl Default for EnvBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard that restores environment variables on drop
pub struct EnvGuard {
    previous: Vec<(String, Option<String>)>,
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, value) in &self.previous {
            match value {
                Some(v) => env::set_var(key, v),
                None => env::remove_var(key),
            }
        }
    }
}

/// Print all SUITE_ENGINE environment variables
pub fn print_env_help() {
    println!("Environment Variables:");
    println!();
    println!("  {ENV_PREFIX}_PARALLEL         Run units in parallel (true/false)");
    println!("  {ENV_PREFIX}_CONCURRENCY      Maximum concurrent units");
    println!("  {ENV_PREFIX}_STOP_ON_FAILURE  Stop dispatching after the first failure");
    println!("  {ENV_PREFIX}_GLOBAL_TIMEOUT   Deadline for the whole run in seconds");
    println!("  {ENV_PREFIX}_FORMAT           Output format (table, json, json-pretty, csv, summary)");
    println!("  {ENV_PREFIX}_LOG              Log level (trace, debug, info, warn, error)");
    println!("  {ENV_PREFIX}_CONFIG           Path to configuration file");
    println!("  {ENV_PREFIX}_RESULTS_DIR      Directory for stored runs");
    println!("  RUST_LOG                      Overrides the log filter entirely");
    println!();
    println!("Example:");
    println!("  export {ENV_PREFIX}_CONCURRENCY=4");
    println!("  suite-engine run suites.yaml");
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test touches its own variables; the test harness runs them concurrently.

    #[test]
    fn test_env_config_default() {
        let config = EnvConfig::default();
        assert!(config.parallel.is_none());
        assert!(config.concurrency.is_none());
    }

    #[test]
    fn test_env_builder() {
        let _guard = EnvBuilder::new()
            .concurrency(3)
            .global_timeout(90)
            .format("csv")
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.concurrency, Some(3));
        assert_eq!(config.global_timeout, Some(90));
        assert_eq!(config.format.as_deref(), Some("csv"));
    }

    #[test]
    fn test_env_bool_parsing() {
        let _guard = EnvBuilder::new()
            .parallel(false)
            .stop_on_failure(true)
            .apply_scoped();

        let config = EnvConfig::load();
        assert_eq!(config.parallel, Some(false));
        assert_eq!(config.stop_on_failure, Some(true));
    }

    #[test]
    fn test_guard_restores() {
        let key = format!("{ENV_PREFIX}_RESULTS_DIR");
        {
            let _guard = EnvBuilder::new().results_dir("/tmp/runs").apply_scoped();
            assert_eq!(env::var(&key).ok().as_deref(), Some("/tmp/runs"));
        }
        assert!(env::var(&key).is_err());
    }

    #[test]
    fn test_has_any() {
        assert!(!EnvConfig::default().has_any());

        let with_format = EnvConfig {
            format: Some("json".to_string()),
            ..Default::default()
        };
        assert!(with_format.has_any());
    }
}
