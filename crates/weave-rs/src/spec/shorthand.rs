//! Shorthand expansion tables.
//!
//! Three shorthand shapes are accepted alongside explicit tool lists:
//!
//! - `modules`: functional areas (`"research"`, `{"name": "planning"}`),
//!   each contributing fixed tool ids and one instruction sentence.
//! - `workflow`: ordered steps, each naming the tools it needs, contributing
//!   those tools and a `Step N: ...` instruction.
//! - `capabilities`: a flat list of capability words mapped to tool ids.
//!
//! Expansion is purely additive and order-preserving.

use super::push_unique;
use crate::tools::names::*;
use serde_json::{Map, Value};
use tracing::debug;

/// What a module name expands to.
struct ModuleExpansion {
    names: &'static [&'static str],
    tools: &'static [&'static str],
    instruction: &'static str,
}

const MODULE_TABLE: &[ModuleExpansion] = &[
    ModuleExpansion {
        names: &["research"],
        tools: &[SEARCH_TOOL, KNOWLEDGE_BASE],
        instruction: "Research the topic using search and the knowledge base before answering.",
    },
    ModuleExpansion {
        names: &["analysis", "reasoning"],
        tools: &[REASONING_TOOL],
        instruction: "Reason step by step and state conclusions explicitly.",
    },
    ModuleExpansion {
        names: &["planning"],
        tools: &[REASONING_MANAGER],
        instruction: "Break the task into a plan before executing it.",
    },
    ModuleExpansion {
        names: &["knowledge"],
        tools: &[KNOWLEDGE_BASE],
        instruction: "Ground answers in the configured knowledge sources.",
    },
    ModuleExpansion {
        names: &["documents", "document_processing"],
        tools: &[TEXT_CHUNKER, FILE_INSPECTOR],
        instruction: "Split long documents into chunks and inspect file metadata before use.",
    },
    ModuleExpansion {
        names: &["monitoring"],
        tools: &[SYSTEM_MONITOR],
        instruction: "Report system status when asked about health or uptime.",
    },
];

const CAPABILITY_TABLE: &[(&str, &str)] = &[
    ("search", SEARCH_TOOL),
    ("reasoning", REASONING_TOOL),
    ("knowledge", KNOWLEDGE_BASE),
    ("retrieval", KNOWLEDGE_BASE),
    ("chunking", TEXT_CHUNKER),
    ("files", FILE_INSPECTOR),
    ("file-management", FILE_INSPECTOR),
    ("file_management", FILE_INSPECTOR),
    ("monitoring", SYSTEM_MONITOR),
    ("system", SYSTEM_MONITOR),
    ("planning", REASONING_MANAGER),
];

/// Tool ids and instructions contributed by shorthand blocks.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Contribution {
    pub tools: Vec<String>,
    pub instructions: Vec<String>,
}

/// Expand the `modules`, `workflow` and `capabilities` blocks of `doc`.
pub fn expand(doc: &Map<String, Value>) -> Contribution {
    let mut out = Contribution::default();
    if let Some(modules) = doc.get("modules") {
        expand_modules(modules, &mut out);
    }
    if let Some(workflow) = doc.get("workflow") {
        expand_workflow(workflow, &mut out);
    }
    if let Some(capabilities) = doc.get("capabilities") {
        expand_capabilities(capabilities, &mut out);
    }
    out
}

fn expand_modules(modules: &Value, out: &mut Contribution) {
    let entries: Vec<&Value> = match modules {
        Value::Array(items) => items.iter().collect(),
        Value::String(_) => vec![modules],
        _ => return,
    };

    for entry in entries {
        let name = match entry {
            Value::String(s) => s.as_str(),
            Value::Object(obj) => {
                if obj.get("enabled").and_then(Value::as_bool) == Some(false) {
                    continue;
                }
                match ["name", "type", "id"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_str))
                {
                    Some(n) => n,
                    None => continue,
                }
            }
            _ => continue,
        };

        let key = name.trim().to_lowercase();
        match MODULE_TABLE.iter().find(|m| m.names.contains(&key.as_str())) {
            Some(expansion) => {
                for tool in expansion.tools {
                    push_unique(&mut out.tools, *tool);
                }
                push_unique(&mut out.instructions, expansion.instruction);
            }
            None => debug!("No expansion for module '{name}'"),
        }
    }
}

fn expand_workflow(workflow: &Value, out: &mut Contribution) {
    let steps = match workflow {
        Value::Object(obj) => match obj.get("steps").and_then(Value::as_array) {
            Some(steps) => steps,
            None => return,
        },
        Value::Array(steps) => steps,
        _ => return,
    };

    for (index, step) in steps.iter().enumerate() {
        let Some(obj) = step.as_object() else {
            if let Some(name) = step.as_str() {
                push_unique(&mut out.instructions, format!("Step {}: {name}", index + 1));
            }
            continue;
        };

        for key in ["tools", "required_tools", "requiredTools"] {
            if let Some(tools) = obj.get(key) {
                for tool in super::normalize::coerce_ids(tools) {
                    push_unique(&mut out.tools, tool);
                }
            }
        }

        let label = ["description", "name", "title"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|s| !s.is_empty());
        if let Some(label) = label {
            push_unique(&mut out.instructions, format!("Step {}: {label}", index + 1));
        }
    }
}

fn expand_capabilities(capabilities: &Value, out: &mut Contribution) {
    for capability in super::normalize::coerce_ids(capabilities) {
        let key = capability.to_lowercase();
        match CAPABILITY_TABLE.iter().find(|(name, _)| *name == key) {
            Some((_, tool)) => push_unique(&mut out.tools, *tool),
            None => debug!("No tool mapped for capability '{capability}'"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expand_json(value: Value) -> Contribution {
        expand(value.as_object().unwrap())
    }

    #[test]
    fn modules_expand_in_order() {
        let out = expand_json(json!({
            "modules": ["research", {"name": "Planning"}, {"name": "analysis", "enabled": false}]
        }));
        assert_eq!(out.tools, vec![SEARCH_TOOL, KNOWLEDGE_BASE, REASONING_MANAGER]);
        assert_eq!(out.instructions.len(), 2);
        assert!(out.instructions[0].starts_with("Research"));
    }

    #[test]
    fn unknown_module_contributes_nothing() {
        let out = expand_json(json!({"modules": ["astrology"]}));
        assert_eq!(out, Contribution::default());
    }

    #[test]
    fn workflow_steps_contribute_tools_and_instructions() {
        let out = expand_json(json!({
            "workflow": {
                "steps": [
                    {"name": "gather", "description": "Gather sources", "tools": ["search-tool"]},
                    {"name": "summarize", "required_tools": "reasoning-tool, search-tool"}
                ]
            }
        }));
        assert_eq!(out.tools, vec![SEARCH_TOOL, REASONING_TOOL]);
        assert_eq!(
            out.instructions,
            vec!["Step 1: Gather sources", "Step 2: summarize"]
        );
    }

    #[test]
    fn bare_step_list_is_accepted() {
        let out = expand_json(json!({"workflow": ["collect", {"title": "report"}]}));
        assert_eq!(out.instructions, vec!["Step 1: collect", "Step 2: report"]);
    }

    #[test]
    fn capabilities_map_to_tools() {
        let out = expand_json(json!({"capabilities": ["Search", "chunking", "teleport", "retrieval", "knowledge"]}));
        assert_eq!(out.tools, vec![SEARCH_TOOL, TEXT_CHUNKER, KNOWLEDGE_BASE]);
        assert!(out.instructions.is_empty());
    }
}
