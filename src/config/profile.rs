//! Run profiles
//!
//! Named presets of execution settings, selectable with `--profile`.

use serde::{Deserialize, Serialize};

/// Preset overlaid on the application configuration. Unset fields leave the
/// underlying value alone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunProfile {
    /// Profile name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parallel: Option<bool>,
    #[serde(default)]
    pub max_concurrency: Option<usize>,
    #[serde(default)]
    pub stop_on_first_failure: Option<bool>,
    #[serde(default)]
    pub global_timeout_secs: Option<u64>,
    #[serde(default)]
    pub default_timeout_ms: Option<i64>,
    /// Substring filter on `suite::case`
    #[serde(default)]
    pub filter: Option<String>,
    /// Tags for filtering
    #[serde(default)]
    pub tags: Vec<String>,
}

impl RunProfile {
    /// Create an empty profile
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            parallel: None,
            max_concurrency: None,
            stop_on_first_failure: None,
            global_timeout_secs: None,
            default_timeout_ms: None,
            filter: None,
            tags: Vec::new(),
        }
    }

    /// Fail fast in parallel, bounded to 30 minutes
    pub fn ci() -> Self {
        Self::new("ci")
            .with_description("Parallel, stop dispatching on first failure")
            .parallel(true)
            .stop_on_first_failure(true)
            .with_global_timeout_secs(30 * 60)
            .with_tag("automation")
    }

    /// One unit at a time, deterministic stop
    pub fn debug() -> Self {
        Self::new("debug")
            .with_description("Sequential execution, stop right after the first failure")
            .parallel(false)
            .stop_on_first_failure(true)
            .with_tag("local")
    }

    /// Short per-case timeout for smoke runs
    pub fn smoke() -> Self {
        let mut profile = Self::new("smoke")
            .with_description("Parallel run with a 5s default case timeout")
            .parallel(true)
            .with_tag("quick");
        profile.default_timeout_ms = Some(5_000);
        profile
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = desc.into();
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn with_max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = Some(max);
        self
    }

    pub fn stop_on_first_failure(mut self, stop: bool) -> Self {
        self.stop_on_first_failure = Some(stop);
        self
    }

    pub fn with_global_timeout_secs(mut self, secs: u64) -> Self {
        self.global_timeout_secs = Some(secs);
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Get predefined profiles
    pub fn predefined() -> Vec<RunProfile> {
        vec![Self::ci(), Self::debug(), Self::smoke()]
    }

    /// Find predefined profile by name
    pub fn find(name: &str) -> Option<RunProfile> {
        Self::predefined().into_iter().find(|p| p.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ci_profile() {
        let profile = RunProfile::ci();
        assert_eq!(profile.parallel, Some(true));
        assert_eq!(profile.stop_on_first_failure, Some(true));
        assert_eq!(profile.global_timeout_secs, Some(1800));
    }

    #[test]
    fn test_debug_profile() {
        let profile = RunProfile::debug();
        assert_eq!(profile.parallel, Some(false));
        assert!(profile.max_concurrency.is_none());
    }

    #[test]
    fn test_find_profile() {
        assert_eq!(RunProfile::find("smoke").map(|p| p.name), Some("smoke".to_string()));
        assert!(RunProfile::find("missing").is_none());
    }

    #[test]
    fn test_builder() {
        let profile = RunProfile::new("nightly")
            .with_max_concurrency(16)
            .with_filter("integration::");
        assert_eq!(profile.max_concurrency, Some(16));
        assert_eq!(profile.filter.as_deref(), Some("integration::"));
    }
}
