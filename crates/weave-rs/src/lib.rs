//! Dynamic capability orchestration: turn a loosely-shaped agent
//! configuration into a validated tool chain and run it as a DAG.
//!
//! `weave-rs` accepts agent configurations in whatever shape callers send
//! them (aliased keys, comma-separated tool lists, shorthand module names,
//! embedded graphs), normalizes them into one canonical
//! [`AgentSpecification`](spec::AgentSpecification), matches free-text
//! tasks against a registry of pluggable tools, and executes the resulting
//! graph node by node with per-node timeouts, guarded edges and a full
//! execution trace. The core entry point is the
//! [`Orchestrator`](orchestrator::Orchestrator).
//!
//! # Getting started
//!
//! ```ignore
//! use weave_rs::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() {
//!     let orchestrator = Orchestrator::new(OrchestratorConfig::default());
//!
//!     let config = json!({
//!         "agent_name": "Researcher",
//!         "description": "Search the notes for ownership rules",
//!         "custom": {
//!             "tool_configs": {
//!                 "search-tool": {"documents": ["ownership rules in rust", "borrowing"]}
//!             }
//!         }
//!     });
//!
//!     let result = orchestrator
//!         .run(&config, serde_json::Value::Null, RequestContext::new())
//!         .await;
//!
//!     println!("{} in {}ms", result.status, result.duration_ms);
//!     println!("{}", result.result);
//! }
//! ```
//!
//! # Where to find things
//!
//! If you're looking for how to...
//!
//! - **Accept messy configuration:** see [`spec::normalize()`] and
//!   [`spec::validate_with()`]. [`spec::merge()`] overlays two documents.
//!
//! - **Add a capability:** implement [`Tool`](tools::Tool) (or
//!   [`DescribedTool`](tools::DescribedTool) for a typed config) and register
//!   it through a [`ToolProvider`](tools::ToolProvider) on a
//!   [`ToolRegistry`](tools::ToolRegistry). Instances are cached per
//!   configuration fingerprint and created exactly once.
//!
//! - **Pick tools for a task:** [`ToolMatcher`](matching::ToolMatcher)
//!   scores descriptors against requirements;
//!   [`optimize_chain`](matching::optimize_chain) orders and prunes the
//!   result.
//!
//! - **Describe and run a graph:** build an
//!   [`ExecutionGraph`](graph::ExecutionGraph) (or parse one with
//!   [`ExecutionGraph::from_value`](graph::ExecutionGraph::from_value)) and
//!   hand it to a [`GraphExecutor`](graph::GraphExecutor). Use
//!   [`execute_stream`](graph::GraphExecutor::execute_stream) to observe
//!   nodes as they finish.
//!
//! - **Add a node type:** implement [`NodeProcessor`](graph::NodeProcessor)
//!   or wrap a closure in [`FnProcessor`](graph::FnProcessor), then register
//!   it on the executor's [`ProcessorTable`](graph::ProcessorTable).
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`spec`] | Canonical agent specification, normalization, validation, merge |
//! | [`tools`] | [`Tool`](tools::Tool) trait, descriptors, providers, [`ToolRegistry`](tools::ToolRegistry), built-in tools |
//! | [`matching`] | Requirement scoring, task recommendation, chain optimization |
//! | [`graph`] | Graph model, guard conditions, compilation, node processors, executor |
//! | [`orchestrator`] | End-to-end pipeline from raw configuration to result |
//! | [`config`] | [`OrchestratorConfig`](config::OrchestratorConfig) and its JSON loader |
//! | [`error`] | Error types and the stable [`ErrorKind`](error::ErrorKind) codes |
//!
//! # Design principles
//!
//! 1. **Be liberal in what you accept.** Normalization never fails. Unknown
//!    keys survive in `custom`, bad values fall back to defaults, and
//!    validation reports problems instead of raising them.
//!
//! 2. **Failures are data.** Every run ends in an
//!    [`OrchestrationResult`](graph::OrchestrationResult) with a status, an
//!    [`ErrorKind`](error::ErrorKind) and the trace up to the failure.
//!
//! 3. **Reject graphs before running them.** Cycles, dangling edges and
//!    unparsable guards are found at compile time; no node runs for a graph
//!    that does not compile.

pub mod config;
pub mod error;
pub mod graph;
pub mod matching;
pub mod orchestrator;
pub mod prelude;
pub mod spec;
pub mod tools;

use schemars::JsonSchema;

// Re-export schemars for downstream tool crates.
pub use schemars;

// ── Schema generation ──────────────────────────────────────────────

/// Generate a JSON Schema `serde_json::Value` from a type that implements
/// `schemars::JsonSchema`. Tool descriptors carry this as their
/// `config_schema`, and [`validate_config`](tools::validate_config) checks
/// instantiation configs against it.
///
/// # Example
///
/// ```
/// use weave_rs::json_schema_for;
/// use schemars::JsonSchema;
/// use serde::Deserialize;
///
/// #[derive(Deserialize, JsonSchema)]
/// struct ChunkerConfig {
///     chunk_size: usize,
///     #[serde(default)]
///     overlap: Option<usize>,
/// }
///
/// let schema = json_schema_for::<ChunkerConfig>();
/// assert_eq!(schema["type"], "object");
/// assert!(schema["required"].as_array().unwrap().contains(&"chunk_size".into()));
/// ```
pub fn json_schema_for<T: JsonSchema>() -> serde_json::Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({"type": "object", "properties": {}}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, JsonSchema)]
    #[allow(dead_code)]
    struct SearchArgs {
        query: String,
        #[serde(default)]
        limit: Option<u32>,
    }

    #[test]
    fn schema_lists_required_fields() {
        let schema = json_schema_for::<SearchArgs>();
        assert_eq!(schema["type"], "object");
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&"query".into()));
        assert!(!required.contains(&"limit".into()));
        assert!(schema["properties"]["limit"].is_object());
    }
}
