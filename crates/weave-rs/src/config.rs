//! Configuration types for the [`Orchestrator`](crate::orchestrator::Orchestrator).
//!
//! Every numeric threshold the subsystem uses (node timeout, matching
//! acceptance threshold and weights, validation ceilings) lives here as a
//! knob with a sensible default. Override specific values through the
//! builder methods, set struct fields directly, or load a JSON settings
//! file where missing keys fall back to defaults.
//!
//! # Examples
//!
//! ```ignore
//! let config = OrchestratorConfig::default()
//!     .with_node_timeout(Duration::from_secs(10))
//!     .with_threshold(0.35)
//!     .with_strict_validation(true);
//! ```
//!
//! ```ignore
//! let config = OrchestratorConfig::load_or_default(Path::new("weave.json"))?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Default per-node timeout in seconds.
pub const DEFAULT_NODE_TIMEOUT_SECS: u64 = 30;

/// Default number of characters kept in trace input/output previews.
pub const DEFAULT_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse settings file: {0}")]
    Parse(#[from] serde_json::Error),
}

// ── Matching ─────────────────────────────────────────────────────

/// Relative weights of the four score components used by the matcher.
///
/// The defaults sum to 1.0 so the weighted score stays in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub keyword: f64,
    pub capability: f64,
    pub text: f64,
    pub category: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            keyword: 0.4,
            capability: 0.3,
            text: 0.2,
            category: 0.1,
        }
    }
}

impl ScoreWeights {
    pub fn total(&self) -> f64 {
        self.keyword + self.capability + self.text + self.category
    }
}

/// Matching engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    /// Minimum weighted score for a tool to be accepted for a requirement.
    pub threshold: f64,
    pub weights: ScoreWeights,
    /// Requirements used by `recommend_tools` when free text matches no
    /// keyword dictionary.
    pub default_requirements: Vec<String>,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            weights: ScoreWeights::default(),
            default_requirements: vec!["reasoning".into(), "search".into()],
        }
    }
}

// ── Validation ceilings ──────────────────────────────────────────

/// Ceilings applied by [`validate`](crate::spec::validate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecLimits {
    pub max_name_chars: usize,
    pub max_timeout_secs: i64,
    pub max_iterations: i64,
    pub max_tools: usize,
    pub max_knowledge_sources: usize,
    pub max_instruction_chars: usize,
}

impl Default for SpecLimits {
    fn default() -> Self {
        Self {
            max_name_chars: 100,
            max_timeout_secs: 3600,
            max_iterations: 100,
            max_tools: 50,
            max_knowledge_sources: 20,
            max_instruction_chars: 10_000,
        }
    }
}

// ── OrchestratorConfig ───────────────────────────────────────────

/// Top-level settings for an orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Per-node timeout when no incoming edge overrides it.
    pub node_timeout_secs: u64,
    /// Characters kept in trace input/output previews.
    pub preview_chars: usize,
    /// Reject configurations with validation violations instead of warning.
    pub strict_validation: bool,
    pub matching: MatchingConfig,
    pub limits: SpecLimits,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            node_timeout_secs: DEFAULT_NODE_TIMEOUT_SECS,
            preview_chars: DEFAULT_PREVIEW_CHARS,
            strict_validation: false,
            matching: MatchingConfig::default(),
            limits: SpecLimits::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        debug!("Loaded orchestrator settings from {}", path.display());
        Ok(config)
    }

    /// Load settings from `path` if it exists, otherwise return defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            debug!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// The per-node timeout as a [`Duration`].
    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_secs)
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout_secs = timeout.as_secs().max(1);
        self
    }

    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    pub fn with_strict_validation(mut self, strict: bool) -> Self {
        self.strict_validation = strict;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.matching.threshold = threshold;
        self
    }

    pub fn with_limits(mut self, limits: SpecLimits) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_constants() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.node_timeout(), Duration::from_secs(30));
        assert!((config.matching.threshold - 0.3).abs() < f64::EPSILON);
        assert!((config.matching.weights.total() - 1.0).abs() < 1e-9);
        assert_eq!(config.matching.default_requirements, vec!["reasoning", "search"]);
        assert!(!config.strict_validation);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"node_timeout_secs": 5, "matching": {{"threshold": 0.5}}}}"#
        )
        .unwrap();

        let config = OrchestratorConfig::from_file(file.path()).unwrap();
        assert_eq!(config.node_timeout_secs, 5);
        assert!((config.matching.threshold - 0.5).abs() < f64::EPSILON);
        assert!((config.matching.weights.keyword - 0.4).abs() < f64::EPSILON);
        assert_eq!(config.limits.max_tools, 50);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = OrchestratorConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config, OrchestratorConfig::default());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        let err = OrchestratorConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn builder_methods() {
        let config = OrchestratorConfig::default()
            .with_node_timeout(Duration::from_secs(3))
            .with_strict_validation(true)
            .with_threshold(0.4)
            .with_preview_chars(50);
        assert_eq!(config.node_timeout_secs, 3);
        assert!(config.strict_validation);
        assert_eq!(config.preview_chars, 50);
    }
}
