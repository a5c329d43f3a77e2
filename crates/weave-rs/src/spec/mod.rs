//! Configuration normalization: loosely structured caller documents in,
//! one canonical [`AgentSpecification`] out.
//!
//! Callers hand the orchestrator whatever shape their front end produced:
//! camelCase or snake_case keys, tool lists as comma-separated strings,
//! lists of objects, or `{id: bool}` maps, plus shorthand `modules`,
//! `workflow` and `capabilities` blocks. This module folds all of that into
//! a single strongly typed struct through one adapter function and a small
//! alias table per field.
//!
//! # Submodules
//!
//! - [`normalize`]: [`normalize()`](normalize::normalize), the alias tables
//!   and collection coercion.
//! - [`shorthand`]: fixed expansion tables for `modules`, `workflow` steps
//!   and `capabilities`.
//! - [`validate`]: [`validate()`](validate::validate), ceilings returned as
//!   [`Violation`] data, never errors.
//! - [`merge`]: [`merge()`](merge::merge) of a base specification with an
//!   override.

pub mod merge;
pub mod normalize;
pub mod shorthand;
pub mod validate;

pub use merge::merge;
pub use normalize::normalize;
pub use validate::{Violation, validate, validate_with};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name given to specifications that arrive without one.
pub const DEFAULT_AGENT_NAME: &str = "Unnamed Agent";

/// Default iteration cap.
pub const DEFAULT_MAX_ITERATIONS: i64 = 10;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: i64 = 300;

/// Key under [`AgentSpecification::custom`] holding an embedded graph.
pub const EXECUTION_GRAPH_KEY: &str = "execution_graph";

/// Role tag of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    #[default]
    Assistant,
    Researcher,
    Analyst,
    Coordinator,
    Specialist,
    Custom,
}

impl AgentRole {
    /// Parse a free-form role string. Unknown roles map to [`AgentRole::Custom`];
    /// blank strings map to the default.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "" | "assistant" => Self::Assistant,
            "researcher" | "research" => Self::Researcher,
            "analyst" | "analysis" => Self::Analyst,
            "coordinator" | "orchestrator" => Self::Coordinator,
            "specialist" | "expert" => Self::Specialist,
            _ => Self::Custom,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assistant => "assistant",
            Self::Researcher => "researcher",
            Self::Analyst => "analyst",
            Self::Coordinator => "coordinator",
            Self::Specialist => "specialist",
            Self::Custom => "custom",
        }
    }
}

/// Execution limits. Signed so that validation can report non-positive
/// values supplied by callers instead of silently clamping them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    pub max_iterations: i64,
    pub timeout_secs: i64,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Presentation hints passed through to the host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayFlags {
    pub show_reasoning: bool,
    pub stream: bool,
    pub verbose: bool,
}

/// Canonical caller intent, produced once per request by [`normalize()`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSpecification {
    pub name: String,
    pub role: AgentRole,
    pub description: String,
    pub instructions: Vec<String>,
    /// Model parameters (open map).
    pub model: Map<String, Value>,
    /// Ordered, deduplicated tool ids.
    pub tools: Vec<String>,
    pub knowledge_sources: Vec<String>,
    /// Memory parameters (open map).
    pub memory: Map<String, Value>,
    pub limits: ExecutionLimits,
    pub display: DisplayFlags,
    /// Open parameter map. May carry an embedded graph under
    /// [`EXECUTION_GRAPH_KEY`].
    pub custom: Map<String, Value>,
}

impl Default for AgentSpecification {
    fn default() -> Self {
        Self {
            name: DEFAULT_AGENT_NAME.to_string(),
            role: AgentRole::default(),
            description: String::new(),
            instructions: Vec::new(),
            model: Map::new(),
            tools: Vec::new(),
            knowledge_sources: Vec::new(),
            memory: Map::new(),
            limits: ExecutionLimits::default(),
            display: DisplayFlags::default(),
            custom: Map::new(),
        }
    }
}

impl AgentSpecification {
    /// The embedded execution-graph description, if any.
    pub fn execution_graph(&self) -> Option<&Value> {
        self.custom.get(EXECUTION_GRAPH_KEY).filter(|v| !v.is_null())
    }

    /// Free text describing the task: description followed by instructions.
    /// Used to recommend tools when none are listed.
    pub fn task_text(&self) -> String {
        let mut parts: Vec<&str> = Vec::with_capacity(self.instructions.len() + 1);
        if !self.description.trim().is_empty() {
            parts.push(self.description.trim());
        }
        parts.extend(self.instructions.iter().map(String::as_str));
        parts.join("\n")
    }

    /// Serialize to the canonical JSON document. Feeding this back through
    /// [`normalize()`] yields an equal specification.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Push `item` unless an equal entry is already present.
pub(crate) fn push_unique(list: &mut Vec<String>, item: impl Into<String>) {
    let item = item.into();
    if !item.is_empty() && !list.contains(&item) {
        list.push(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn role_parsing() {
        assert_eq!(AgentRole::parse("Researcher"), AgentRole::Researcher);
        assert_eq!(AgentRole::parse("  "), AgentRole::Assistant);
        assert_eq!(AgentRole::parse("pirate"), AgentRole::Custom);
        assert_eq!(AgentRole::parse("expert"), AgentRole::Specialist);
        assert_eq!(AgentRole::Coordinator.as_str(), "coordinator");
    }

    #[test]
    fn defaults() {
        let spec = AgentSpecification::default();
        assert_eq!(spec.name, DEFAULT_AGENT_NAME);
        assert_eq!(spec.role, AgentRole::Assistant);
        assert_eq!(spec.limits.max_iterations, 10);
        assert_eq!(spec.limits.timeout_secs, 300);
        assert!(spec.execution_graph().is_none());
    }

    #[test]
    fn task_text_joins_description_and_instructions() {
        let spec = AgentSpecification {
            description: "Find papers".into(),
            instructions: vec!["Be brief".into()],
            ..Default::default()
        };
        assert_eq!(spec.task_text(), "Find papers\nBe brief");
    }

    #[test]
    fn execution_graph_ignores_null() {
        let mut spec = AgentSpecification::default();
        spec.custom.insert(EXECUTION_GRAPH_KEY.into(), Value::Null);
        assert!(spec.execution_graph().is_none());
        spec.custom
            .insert(EXECUTION_GRAPH_KEY.into(), json!({"nodes": []}));
        assert!(spec.execution_graph().is_some());
    }

    #[test]
    fn push_unique_skips_duplicates_and_empty() {
        let mut list = vec!["a".to_string()];
        push_unique(&mut list, "a");
        push_unique(&mut list, "");
        push_unique(&mut list, "b");
        assert_eq!(list, vec!["a", "b"]);
    }
}
