//! Taint configuration: fully-qualified source/sink/sanitizer symbol lists.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{ConfigError, ConfigResult};

/// Three lists of fully-qualified symbols. Matching is exact on the
/// resolved callee name (after alias resolution) — spec §3.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaintConfig {
    pub sources: Vec<String>,
    pub sinks: Vec<String>,
    pub sanitizers: Vec<String>,
}

impl TaintConfig {
    pub fn new(sources: Vec<String>, sinks: Vec<String>, sanitizers: Vec<String>) -> Self {
        Self {
            sources,
            sinks,
            sanitizers,
        }
    }

    pub fn from_yaml(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: TaintConfig = serde_yaml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration error (fatal at orchestrator startup per spec §7):
    /// overlapping source/sink/sanitizer names are ambiguous and rejected.
    pub fn validate(&self) -> ConfigResult<()> {
        let sources: HashSet<&str> = self.sources.iter().map(String::as_str).collect();
        let sinks: HashSet<&str> = self.sinks.iter().map(String::as_str).collect();
        let sanitizers: HashSet<&str> = self.sanitizers.iter().map(String::as_str).collect();

        if let Some(overlap) = sources.intersection(&sinks).next() {
            return Err(ConfigError::InvalidTaintConfig(format!(
                "'{overlap}' listed as both source and sink"
            )));
        }
        if let Some(overlap) = sources.intersection(&sanitizers).next() {
            return Err(ConfigError::InvalidTaintConfig(format!(
                "'{overlap}' listed as both source and sanitizer"
            )));
        }
        if let Some(overlap) = sinks.intersection(&sanitizers).next() {
            return Err(ConfigError::InvalidTaintConfig(format!(
                "'{overlap}' listed as both sink and sanitizer"
            )));
        }
        Ok(())
    }

    pub fn is_source(&self, name: &str) -> bool {
        self.sources.iter().any(|s| s == name)
    }

    pub fn is_sink(&self, name: &str) -> bool {
        self.sinks.iter().any(|s| s == name)
    }

    pub fn is_sanitizer(&self, name: &str) -> bool {
        self.sanitizers.iter().any(|s| s == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_overlapping_source_and_sink() {
        let config = TaintConfig::new(vec!["input".into()], vec!["input".into()], vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn accepts_disjoint_lists() {
        let config = TaintConfig::new(vec!["input".into()], vec!["exec".into()], vec!["sanitize".into()]);
        assert!(config.validate().is_ok());
        assert!(config.is_source("input"));
        assert!(config.is_sink("exec"));
        assert!(config.is_sanitizer("sanitize"));
        assert!(!config.is_source("exec"));
    }
}
