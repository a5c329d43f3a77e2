//! The single adapter from raw configuration documents to
//! [`AgentSpecification`].
//!
//! Each canonical field has a fixed, ordered alias list; the first present
//! non-null key wins. Malformed input never fails; unresolvable fields fall
//! back to the documented defaults.

use super::{
    AgentRole, AgentSpecification, DisplayFlags, EXECUTION_GRAPH_KEY, ExecutionLimits,
    push_unique, shorthand,
};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const NAME_KEYS: &[&str] = &["name", "agent_name", "agentName", "title"];
const ROLE_KEYS: &[&str] = &["role", "agent_role", "agentRole", "type"];
const DESCRIPTION_KEYS: &[&str] = &["description", "desc", "summary"];
const INSTRUCTION_KEYS: &[&str] = &[
    "instructions",
    "system_prompt",
    "systemPrompt",
    "prompt",
    "prompts",
];
const MODEL_KEYS: &[&str] = &["model", "model_config", "modelConfig", "llm", "llm_config"];
const TOOL_KEYS: &[&str] = &[
    "tools",
    "tool_ids",
    "toolIds",
    "tool_list",
    "toolList",
    "enabled_tools",
];
const KNOWLEDGE_KEYS: &[&str] = &[
    "knowledge_sources",
    "knowledgeSources",
    "knowledge_bases",
    "knowledgeBases",
    "knowledge",
    "kb_ids",
];
const MEMORY_KEYS: &[&str] = &["memory", "memory_config", "memoryConfig"];
const LIMIT_CONTAINER_KEYS: &[&str] = &["limits", "execution", "execution_limits"];
const ITERATION_KEYS: &[&str] = &["max_iterations", "maxIterations", "max_iter", "iterations"];
const TIMEOUT_KEYS: &[&str] = &["timeout_secs", "timeout", "timeoutSeconds", "timeout_seconds"];
const SHOW_REASONING_KEYS: &[&str] = &["show_reasoning", "showReasoning"];
const STREAM_KEYS: &[&str] = &["stream", "streaming"];
const VERBOSE_KEYS: &[&str] = &["verbose"];
const CUSTOM_KEYS: &[&str] = &[
    "custom",
    "custom_params",
    "customParameters",
    "parameters",
    "extra",
];
const GRAPH_KEYS: &[&str] = &[
    EXECUTION_GRAPH_KEY,
    "executionGraph",
    "graph",
    "workflow_graph",
    "flow",
];

/// Model parameters that may appear at the top level of a document and are
/// folded into the model map: (accepted key, canonical key).
const MODEL_PARAM_KEYS: &[(&str, &str)] = &[
    ("temperature", "temperature"),
    ("max_tokens", "max_tokens"),
    ("maxTokens", "max_tokens"),
    ("top_p", "top_p"),
];

/// Normalize a raw configuration document into an [`AgentSpecification`].
///
/// Never fails and never blocks. Non-object input yields the default
/// specification.
pub fn normalize(raw: &Value) -> AgentSpecification {
    let Some(doc) = raw.as_object() else {
        if !raw.is_null() {
            warn!("Configuration is not an object ({}), using defaults", kind_of(raw));
        }
        return AgentSpecification::default();
    };

    let mut spec = AgentSpecification::default();

    if let Some(name) = first_present(doc, NAME_KEYS).and_then(scalar_string)
        && !name.trim().is_empty()
    {
        spec.name = name.trim().to_string();
    }

    if let Some(role) = first_present(doc, ROLE_KEYS).and_then(Value::as_str) {
        spec.role = AgentRole::parse(role);
    }

    if let Some(description) = first_present(doc, DESCRIPTION_KEYS).and_then(scalar_string) {
        spec.description = description.trim().to_string();
    }

    if let Some(instructions) = first_present(doc, INSTRUCTION_KEYS) {
        for line in coerce_instructions(instructions) {
            push_unique(&mut spec.instructions, line);
        }
    }

    spec.model = resolve_model(doc);

    if let Some(tools) = first_present(doc, TOOL_KEYS) {
        for id in coerce_ids(tools) {
            push_unique(&mut spec.tools, id);
        }
    }

    if let Some(sources) = first_present(doc, KNOWLEDGE_KEYS) {
        for id in coerce_ids(sources) {
            push_unique(&mut spec.knowledge_sources, id);
        }
    }

    spec.memory = match first_present(doc, MEMORY_KEYS) {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::Bool(enabled)) => single("enabled", Value::Bool(*enabled)),
        Some(Value::String(kind)) => single("type", Value::String(kind.clone())),
        _ => Map::new(),
    };

    spec.limits = resolve_limits(doc);
    spec.display = resolve_display(doc);

    if let Some(Value::Object(custom)) = first_present(doc, CUSTOM_KEYS) {
        spec.custom = custom.clone();
    }
    if !spec.custom.contains_key(EXECUTION_GRAPH_KEY)
        && let Some(graph) = first_present(doc, GRAPH_KEYS).filter(|g| g.is_object())
    {
        spec.custom
            .insert(EXECUTION_GRAPH_KEY.to_string(), graph.clone());
    }

    let contribution = shorthand::expand(doc);
    for tool in contribution.tools {
        push_unique(&mut spec.tools, tool);
    }
    for instruction in contribution.instructions {
        push_unique(&mut spec.instructions, instruction);
    }

    debug!(
        "Normalized agent '{}' ({} tools, {} instructions)",
        spec.name,
        spec.tools.len(),
        spec.instructions.len()
    );
    spec
}

// ── Field resolution ─────────────────────────────────────────────

fn resolve_model(doc: &Map<String, Value>) -> Map<String, Value> {
    let mut model = match first_present(doc, MODEL_KEYS) {
        Some(Value::Object(map)) => map.clone(),
        Some(Value::String(name)) if !name.trim().is_empty() => {
            single("name", Value::String(name.trim().to_string()))
        }
        _ => Map::new(),
    };
    for (key, canonical) in MODEL_PARAM_KEYS {
        if let Some(value) = doc.get(*key).filter(|v| !v.is_null())
            && !model.contains_key(*canonical)
        {
            model.insert((*canonical).to_string(), value.clone());
        }
    }
    model
}

fn resolve_limits(doc: &Map<String, Value>) -> ExecutionLimits {
    let nested = first_present(doc, LIMIT_CONTAINER_KEYS).and_then(Value::as_object);
    let lookup = |keys: &[&str]| {
        nested
            .and_then(|n| first_present(n, keys))
            .or_else(|| first_present(doc, keys))
            .and_then(coerce_i64)
    };

    let defaults = ExecutionLimits::default();
    ExecutionLimits {
        max_iterations: lookup(ITERATION_KEYS).unwrap_or(defaults.max_iterations),
        timeout_secs: lookup(TIMEOUT_KEYS).unwrap_or(defaults.timeout_secs),
    }
}

fn resolve_display(doc: &Map<String, Value>) -> DisplayFlags {
    let nested = doc.get("display").and_then(Value::as_object);
    let lookup = |keys: &[&str]| {
        nested
            .and_then(|n| first_present(n, keys))
            .or_else(|| first_present(doc, keys))
            .and_then(coerce_bool)
            .unwrap_or(false)
    };
    DisplayFlags {
        show_reasoning: lookup(SHOW_REASONING_KEYS),
        stream: lookup(STREAM_KEYS),
        verbose: lookup(VERBOSE_KEYS),
    }
}

// ── Coercion helpers ─────────────────────────────────────────────

/// The first key of `keys` present in `map` with a non-null value.
pub(crate) fn first_present<'a>(map: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|k| map.get(*k).filter(|v| !v.is_null()))
}

/// Coerce a collection-valued field into a list of ids.
///
/// - a string is split on `,`, `;` and newlines;
/// - a list of strings is taken as-is; a list of objects yields each
///   object's `id`/`name`/`tool_id`, skipping `enabled: false` entries;
/// - a map yields the keys whose value is `true` or an object not marked
///   `enabled: false`.
pub fn coerce_ids(value: &Value) -> Vec<String> {
    let mut out = Vec::new();
    match value {
        Value::String(s) => {
            for part in s.split([',', ';', '\n']) {
                push_unique(&mut out, part.trim());
            }
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Object(obj) => {
                        if is_disabled(obj) {
                            continue;
                        }
                        if let Some(id) = ["id", "name", "tool_id"]
                            .iter()
                            .find_map(|k| obj.get(*k).and_then(scalar_string))
                        {
                            push_unique(&mut out, id.trim());
                        }
                    }
                    other => {
                        if let Some(s) = scalar_string(other) {
                            push_unique(&mut out, s.trim());
                        }
                    }
                }
            }
        }
        Value::Object(map) => {
            for (key, flag) in map {
                let include = match flag {
                    Value::Bool(b) => *b,
                    Value::Object(obj) => !is_disabled(obj),
                    _ => false,
                };
                if include {
                    push_unique(&mut out, key.trim());
                }
            }
        }
        _ => {}
    }
    out
}

fn coerce_instructions(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Object(obj) => ["text", "content", "instruction"]
                    .iter()
                    .find_map(|k| obj.get(*k).and_then(Value::as_str))
                    .map(String::from),
                other => scalar_string(other),
            })
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}

fn is_disabled(obj: &Map<String, Value>) -> bool {
    obj.get("enabled").and_then(coerce_bool) == Some(false)
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub(crate) fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

pub(crate) fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Some(true),
            "false" | "no" | "off" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::DEFAULT_AGENT_NAME;
    use crate::tools::names::*;
    use serde_json::json;

    #[test]
    fn list_of_objects_respects_enabled_flag() {
        let spec = normalize(&json!({
            "agentName": "X",
            "tool_list": [{"id": "t1", "enabled": true}, {"id": "t2", "enabled": false}]
        }));
        assert_eq!(spec.name, "X");
        assert_eq!(spec.tools, vec!["t1"]);
    }

    #[test]
    fn first_alias_wins() {
        let spec = normalize(&json!({"title": "later", "name": "first"}));
        assert_eq!(spec.name, "first");
    }

    #[test]
    fn blank_name_falls_back_to_default() {
        let spec = normalize(&json!({"name": "   "}));
        assert_eq!(spec.name, DEFAULT_AGENT_NAME);
    }

    #[test]
    fn string_tool_list_is_split() {
        let spec = normalize(&json!({"tools": "a, b;c\n a"}));
        assert_eq!(spec.tools, vec!["a", "b", "c"]);
    }

    #[test]
    fn map_tool_list_takes_true_keys() {
        let spec = normalize(&json!({
            "toolIds": {"alpha": true, "beta": false, "gamma": {"enabled": true}, "delta": {"enabled": false}}
        }));
        assert_eq!(spec.tools, vec!["alpha", "gamma"]);
    }

    #[test]
    fn object_ids_try_name_and_tool_id() {
        let spec = normalize(&json!({
            "tools": [{"name": "by-name"}, {"tool_id": "by-tool-id"}, {"other": 1}, 7]
        }));
        assert_eq!(spec.tools, vec!["by-name", "by-tool-id", "7"]);
    }

    #[test]
    fn non_object_input_yields_defaults() {
        assert_eq!(normalize(&json!("hello")), AgentSpecification::default());
        assert_eq!(normalize(&Value::Null), AgentSpecification::default());
        assert_eq!(normalize(&json!([1, 2])), AgentSpecification::default());
    }

    #[test]
    fn role_and_description() {
        let spec = normalize(&json!({"agentRole": "Analyst", "desc": "  crunch numbers "}));
        assert_eq!(spec.role, AgentRole::Analyst);
        assert_eq!(spec.description, "crunch numbers");

        let spec = normalize(&json!({}));
        assert_eq!(spec.role, AgentRole::Assistant);
        assert!(spec.tools.is_empty());
    }

    #[test]
    fn instructions_from_string_and_objects() {
        let spec = normalize(&json!({"system_prompt": "line one\n\nline two"}));
        assert_eq!(spec.instructions, vec!["line one", "line two"]);

        let spec = normalize(&json!({"instructions": [{"text": "a"}, "b", {"content": " c "}]}));
        assert_eq!(spec.instructions, vec!["a", "b", "c"]);
    }

    #[test]
    fn model_string_and_top_level_params() {
        let spec = normalize(&json!({"model": "gpt-x", "temperature": 0.2, "maxTokens": 512}));
        assert_eq!(spec.model["name"], "gpt-x");
        assert_eq!(spec.model["temperature"], 0.2);
        assert_eq!(spec.model["max_tokens"], 512);

        let spec = normalize(&json!({"llm": {"name": "m", "temperature": 0.9}, "temperature": 0.1}));
        assert_eq!(spec.model["temperature"], 0.9);
    }

    #[test]
    fn limits_from_nested_and_strings() {
        let spec = normalize(&json!({"execution": {"maxIterations": "25"}, "timeout": 60.7}));
        assert_eq!(spec.limits.max_iterations, 25);
        assert_eq!(spec.limits.timeout_secs, 60);

        let spec = normalize(&json!({"timeout": "soon"}));
        assert_eq!(spec.limits.timeout_secs, crate::spec::DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn negative_limits_are_preserved_for_validation() {
        let spec = normalize(&json!({"max_iterations": -3}));
        assert_eq!(spec.limits.max_iterations, -3);
    }

    #[test]
    fn display_flags() {
        let spec = normalize(&json!({"showReasoning": "yes", "display": {"stream": true}}));
        assert!(spec.display.show_reasoning);
        assert!(spec.display.stream);
        assert!(!spec.display.verbose);
    }

    #[test]
    fn memory_shapes() {
        assert_eq!(normalize(&json!({"memory": true})).memory["enabled"], true);
        assert_eq!(
            normalize(&json!({"memoryConfig": "buffer"})).memory["type"],
            "buffer"
        );
        assert!(normalize(&json!({"memory": 3})).memory.is_empty());
    }

    #[test]
    fn embedded_graph_moves_into_custom() {
        let graph = json!({"nodes": [{"id": "a", "type": "processor"}], "edges": []});
        let spec = normalize(&json!({"graph": graph, "customParameters": {"k": 1}}));
        assert_eq!(spec.custom["k"], 1);
        assert_eq!(spec.execution_graph(), Some(&graph));
    }

    #[test]
    fn shorthand_blocks_are_appended() {
        let spec = normalize(&json!({
            "tools": ["custom-tool", "search-tool"],
            "instructions": "Be precise",
            "modules": ["research"],
            "capabilities": ["chunking"]
        }));
        assert_eq!(
            spec.tools,
            vec!["custom-tool", SEARCH_TOOL, KNOWLEDGE_BASE, TEXT_CHUNKER]
        );
        assert_eq!(spec.instructions[0], "Be precise");
        assert_eq!(spec.instructions.len(), 2);
    }

    #[test]
    fn idempotent_on_canonical_output() {
        let inputs = [
            json!({}),
            json!({"agentName": "X", "tool_list": [{"id": "t1"}]}),
            json!({
                "name": "Researcher",
                "role": "researcher",
                "description": "digs",
                "instructions": "one\ntwo",
                "model": "m",
                "temperature": 0.3,
                "knowledgeBases": "kb1,kb2",
                "memory": true,
                "limits": {"max_iterations": 4, "timeout": 30},
                "verbose": true,
                "modules": ["research", "planning"],
                "workflow": {"steps": [{"name": "collect", "tools": ["x"]}]},
                "graph": {"nodes": [{"id": "a"}], "edges": []},
                "extra": {"team": "blue"}
            }),
        ];
        for raw in inputs {
            let once = normalize(&raw);
            let twice = normalize(&once.to_value());
            assert_eq!(once, twice, "normalize not idempotent for {raw}");
        }
    }

    #[test]
    fn coerce_bool_variants() {
        assert_eq!(coerce_bool(&json!("Off")), Some(false));
        assert_eq!(coerce_bool(&json!(2)), Some(true));
        assert_eq!(coerce_bool(&json!("maybe")), None);
    }
}
