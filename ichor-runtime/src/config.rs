//! Runtime configuration.
//!
//! Configuration is read from a TOML document. Every field has a default, so
//! an empty document is a valid configuration:
//!
//! ```toml
//! [evidence]
//! initial_capacity = 8
//! max_depth = 10000
//! use_index_hints = true
//!
//! [trace]
//! handlers = false
//! operations = false
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration of one execution context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Evidence vector settings.
    pub evidence: EvidenceConfig,

    /// Trace event settings.
    pub trace: TraceConfig,
}

/// Evidence vector settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvidenceConfig {
    /// Entries reserved up front. Rounded up to a power of two.
    pub initial_capacity: usize,

    /// Maximum number of installed handlers. Unlimited when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,

    /// Whether operations may use their precomputed evidence position.
    pub use_index_hints: bool,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            initial_capacity: 8,
            max_depth: None,
            use_index_hints: true,
        }
    }
}

/// Trace event settings.
///
/// Events are emitted at `TRACE` level under the `ichor_runtime` target and
/// still pass through the subscriber's filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Emit handler lifecycle transitions.
    pub handlers: bool,

    /// Emit one event per performed operation.
    pub operations: bool,
}

impl RuntimeConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_is_default() {
        let config = RuntimeConfig::from_toml_str("").unwrap();
        assert_eq!(config, RuntimeConfig::default());
        assert_eq!(config.evidence.initial_capacity, 8);
        assert!(config.evidence.use_index_hints);
    }

    #[test]
    fn test_partial_document_keeps_other_defaults() {
        let config = RuntimeConfig::from_toml_str(
            r#"
            [evidence]
            max_depth = 64

            [trace]
            operations = true
            "#,
        )
        .unwrap();
        assert_eq!(config.evidence.max_depth, Some(64));
        assert_eq!(config.evidence.initial_capacity, 8);
        assert!(config.trace.operations);
        assert!(!config.trace.handlers);
    }

    #[test]
    fn test_rejects_wrong_types() {
        let err = RuntimeConfig::from_toml_str("[evidence]\ninitial_capacity = \"big\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ichor.toml");
        std::fs::write(&path, "[trace]\nhandlers = true\n").unwrap();
        let config = RuntimeConfig::load(&path).unwrap();
        assert!(config.trace.handlers);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RuntimeConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }

    #[test]
    fn test_serialized_form_parses_back() {
        let config = RuntimeConfig {
            evidence: EvidenceConfig {
                max_depth: Some(3),
                ..EvidenceConfig::default()
            },
            ..RuntimeConfig::default()
        };
        let text = config.to_toml_string().unwrap();
        assert_eq!(RuntimeConfig::from_toml_str(&text).unwrap(), config);
    }
}
