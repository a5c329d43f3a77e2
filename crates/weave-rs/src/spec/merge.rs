//! Merging a base specification with an override.

use super::{AgentRole, AgentSpecification, DEFAULT_AGENT_NAME, ExecutionLimits};
use serde_json::{Map, Value};

/// Merge `over` onto `base`.
///
/// - Scalars take the override's value only when it is non-empty and not
///   the default, otherwise the base value is kept.
/// - Lists are unioned: base entries first, then override entries not
///   already present.
/// - Maps are shallow-merged with override entries winning on collision.
///
/// Merging with a default specification returns `base` unchanged.
pub fn merge(base: &AgentSpecification, over: &AgentSpecification) -> AgentSpecification {
    let defaults = ExecutionLimits::default();

    AgentSpecification {
        name: if over.name.trim().is_empty() || over.name == DEFAULT_AGENT_NAME {
            base.name.clone()
        } else {
            over.name.clone()
        },
        role: if over.role == AgentRole::default() {
            base.role
        } else {
            over.role
        },
        description: if over.description.trim().is_empty() {
            base.description.clone()
        } else {
            over.description.clone()
        },
        instructions: union(&base.instructions, &over.instructions),
        model: shallow_merge(&base.model, &over.model),
        tools: union(&base.tools, &over.tools),
        knowledge_sources: union(&base.knowledge_sources, &over.knowledge_sources),
        memory: shallow_merge(&base.memory, &over.memory),
        limits: ExecutionLimits {
            max_iterations: if over.limits.max_iterations == defaults.max_iterations {
                base.limits.max_iterations
            } else {
                over.limits.max_iterations
            },
            timeout_secs: if over.limits.timeout_secs == defaults.timeout_secs {
                base.limits.timeout_secs
            } else {
                over.limits.timeout_secs
            },
        },
        display: super::DisplayFlags {
            show_reasoning: base.display.show_reasoning || over.display.show_reasoning,
            stream: base.display.stream || over.display.stream,
            verbose: base.display.verbose || over.display.verbose,
        },
        custom: shallow_merge(&base.custom, &over.custom),
    }
}

fn union(base: &[String], over: &[String]) -> Vec<String> {
    let mut out = base.to_vec();
    for item in over {
        if !out.contains(item) {
            out.push(item.clone());
        }
    }
    out
}

fn shallow_merge(base: &Map<String, Value>, over: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();
    for (key, value) in over {
        out.insert(key.clone(), value.clone());
    }
    out
}
