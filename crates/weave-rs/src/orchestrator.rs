//! End-to-end orchestration: raw configuration and payload in, structured
//! result out.
//!
//! ```text
//! raw config -> normalize/validate -> tool ids (listed, or recommended)
//!            -> optimize_chain -> graph (embedded, or tool chain + formatter)
//!            -> GraphExecutor -> OrchestrationResult
//! ```
//!
//! Nothing raised inside crosses [`Orchestrator::run`]: configuration
//! rejections, graph errors and node failures all come back as a failed
//! [`OrchestrationResult`].

use crate::config::OrchestratorConfig;
use crate::error::ErrorKind;
use crate::graph::{
    ExecutionGraph, ExecutionNode, GraphEvent, GraphExecutor, NodeProcessor, OrchestrationResult,
    RequestContext,
};
use crate::matching::{RecommendContext, ToolMatcher, optimize_chain};
use crate::spec::{AgentSpecification, Violation, normalize, validate_with};
use crate::tools::ToolRegistry;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Key in the specification's custom parameters holding per-tool
/// instantiation configs (`{tool_id: config}`) for the default graph.
pub const TOOL_CONFIGS_KEY: &str = "tool_configs";

/// Id of the formatter node closing the default graph.
pub const OUTPUT_NODE: &str = "output";

/// Where a plan's graph came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphSource {
    /// Described in the configuration under `execution_graph`.
    Embedded,
    /// One `tool` node per chained tool, then a formatter.
    ToolChain,
}

/// Everything decided before execution starts.
#[derive(Debug, Clone)]
pub struct Plan {
    pub spec: AgentSpecification,
    pub violations: Vec<Violation>,
    /// The optimized tool chain.
    pub tools: Vec<String>,
    /// Whether the tools were recommended from the task text rather than
    /// listed in the configuration.
    pub recommended: bool,
    pub graph: ExecutionGraph,
    pub source: GraphSource,
}

impl Plan {
    /// Bound the request by the specification's timeout.
    fn request(&self, request: RequestContext) -> RequestContext {
        match u64::try_from(self.spec.limits.timeout_secs) {
            Ok(secs) if secs > 0 => request.with_timeout(Duration::from_secs(secs)),
            _ => request,
        }
    }

    /// A null payload becomes `{"input": <task text>}`.
    fn payload(&self, payload: Value) -> Value {
        if payload.is_null() {
            json!({"input": self.spec.task_text()})
        } else {
            payload
        }
    }

    fn annotate(&self, result: OrchestrationResult) -> OrchestrationResult {
        result
            .with_metadata("agent", json!(self.spec.name))
            .with_metadata("tools", json!(self.tools))
            .with_metadata("recommended_tools", json!(self.recommended))
            .with_metadata("graph_source", json!(self.source))
            .with_metadata("violations", violation_list(&self.violations))
    }
}

/// A configuration refused before planning finished.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct Rejection {
    pub kind: ErrorKind,
    pub message: String,
    pub agent: String,
    pub violations: Vec<Violation>,
}

impl Rejection {
    pub fn into_result(self, request_id: &str) -> OrchestrationResult {
        OrchestrationResult::rejected(request_id, self.kind, self.message)
            .with_metadata("agent", json!(self.agent))
            .with_metadata("violations", violation_list(&self.violations))
    }
}

fn violation_list(violations: &[Violation]) -> Value {
    json!(violations.iter().map(ToString::to_string).collect::<Vec<_>>())
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Wires the normalizer, registry, matcher and graph executor together.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<ToolRegistry>,
    matcher: ToolMatcher,
    executor: GraphExecutor,
}

impl Orchestrator {
    /// An orchestrator over the built-in tools.
    pub fn new(config: OrchestratorConfig) -> Self {
        Self::with_registry(config, Arc::new(ToolRegistry::builtin()))
    }

    /// An orchestrator over `registry`. Discovery runs now if it has not.
    pub fn with_registry(config: OrchestratorConfig, registry: Arc<ToolRegistry>) -> Self {
        registry.ensure_discovered();
        let executor = GraphExecutor::from_config(&config).with_tools(Arc::clone(&registry));
        let matcher = ToolMatcher::new(config.matching.clone());
        Self {
            config,
            registry,
            matcher,
            executor,
        }
    }

    /// Register an extra node type for embedded graphs.
    pub fn with_processor(mut self, kind: &str, processor: impl NodeProcessor + 'static) -> Self {
        self.executor = self.executor.with_processor(kind, processor);
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    pub fn matcher(&self) -> &ToolMatcher {
        &self.matcher
    }

    pub fn executor(&self) -> &GraphExecutor {
        &self.executor
    }

    /// Normalize, validate, pick tools and build the graph, without running
    /// anything.
    pub fn plan(&self, raw: &Value) -> Result<Plan, Rejection> {
        let spec = normalize(raw);
        let violations = validate_with(&spec, &self.config.limits);
        if !violations.is_empty() {
            if self.config.strict_validation {
                let summary: Vec<String> = violations.iter().map(ToString::to_string).collect();
                warn!(agent = %spec.name, count = violations.len(), "Rejecting invalid configuration");
                return Err(Rejection {
                    kind: ErrorKind::InvalidConfiguration,
                    message: format!("invalid configuration: {}", summary.join("; ")),
                    agent: spec.name.clone(),
                    violations,
                });
            }
            for violation in &violations {
                warn!(agent = %spec.name, %violation, "Configuration violation");
            }
        }

        let recommended = spec.tools.is_empty();
        let candidates = if recommended {
            self.matcher
                .recommend_tools(&spec.task_text(), &self.registry, &RecommendContext::default())
        } else {
            spec.tools.clone()
        };
        let tools = optimize_chain(&candidates, &self.registry);

        let (graph, source) = match spec.execution_graph() {
            Some(description) => match ExecutionGraph::from_value(description) {
                Ok(graph) => (graph, GraphSource::Embedded),
                Err(err) => {
                    warn!(agent = %spec.name, error = %err, "Embedded graph rejected");
                    return Err(Rejection {
                        kind: ErrorKind::from(&err),
                        message: err.to_string(),
                        agent: spec.name.clone(),
                        violations,
                    });
                }
            },
            None => (tool_chain_graph(&spec, &tools), GraphSource::ToolChain),
        };

        info!(
            agent = %spec.name,
            tools = ?tools,
            recommended,
            source = ?source,
            nodes = graph.nodes.len(),
            "Prepared orchestration"
        );
        Ok(Plan {
            spec,
            violations,
            tools,
            recommended,
            graph,
            source,
        })
    }

    /// Plan and execute. A null `payload` is replaced by the task text.
    pub async fn run(&self, raw: &Value, payload: Value, request: RequestContext) -> OrchestrationResult {
        let plan = match self.plan(raw) {
            Ok(plan) => plan,
            Err(rejection) => return rejection.into_result(&request.request_id),
        };
        let request = plan.request(request);
        let payload = plan.payload(payload);
        let result = self.executor.execute(&plan.graph, payload, request).await;
        plan.annotate(result)
    }

    /// Streaming counterpart of [`run`](Self::run). A rejected
    /// configuration yields a single `Finished` event.
    pub fn run_stream<'a>(
        &'a self,
        raw: &Value,
        payload: Value,
        request: RequestContext,
    ) -> BoxStream<'a, GraphEvent> {
        let plan = match self.plan(raw) {
            Ok(plan) => plan,
            Err(rejection) => {
                let result = rejection.into_result(&request.request_id);
                return stream::once(async move { GraphEvent::Finished(result) }).boxed();
            }
        };
        let request = plan.request(request);
        let payload = plan.payload(payload);
        self.executor
            .execute_stream(&plan.graph, payload, request)
            .map(move |event| match event {
                GraphEvent::Finished(result) => GraphEvent::Finished(plan.annotate(result)),
                other => other,
            })
            .boxed()
    }
}

/// One `tool` node per tool, in chain order, then an `output` formatter.
/// Per-tool configs come from `custom.tool_configs`.
fn tool_chain_graph(spec: &AgentSpecification, tools: &[String]) -> ExecutionGraph {
    let configs = spec.custom.get(TOOL_CONFIGS_KEY).and_then(Value::as_object);
    let mut nodes: Vec<ExecutionNode> = tools
        .iter()
        .map(|id| {
            let mut config = json!({"tool": id});
            if let Some(tool_config) = configs.and_then(|c| c.get(id)) {
                config["tool_config"] = tool_config.clone();
            }
            ExecutionNode::new(id.clone(), "tool").with_config(config)
        })
        .collect();

    let mut output = OUTPUT_NODE.to_string();
    while tools.contains(&output) {
        output.push('_');
    }
    nodes.push(ExecutionNode::new(output, "formatter"));
    ExecutionGraph::linear(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::RunStatus;
    use crate::tools::names::*;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(OrchestratorConfig::default())
    }

    #[test]
    fn listed_tools_become_a_linear_graph() {
        let plan = orchestrator()
            .plan(&json!({"name": "Librarian", "tools": "system-monitor, knowledge-base"}))
            .unwrap();
        assert!(!plan.recommended);
        assert_eq!(plan.source, GraphSource::ToolChain);
        assert_eq!(plan.tools, vec![KNOWLEDGE_BASE, SYSTEM_MONITOR]);
        let ids: Vec<&str> = plan.graph.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec![KNOWLEDGE_BASE, SYSTEM_MONITOR, OUTPUT_NODE]);
        assert_eq!(plan.graph.edges.len(), 2);
        assert_eq!(plan.graph.nodes[0].config["tool"], KNOWLEDGE_BASE);
    }

    #[test]
    fn missing_tools_are_recommended() {
        let plan = orchestrator()
            .plan(&json!({"description": "Search the web for sources"}))
            .unwrap();
        assert!(plan.recommended);
        assert_eq!(plan.tools, vec![SEARCH_TOOL]);
    }

    #[test]
    fn output_node_avoids_tool_ids() {
        let spec = AgentSpecification::default();
        let graph = tool_chain_graph(&spec, &["output".to_string()]);
        assert_eq!(graph.nodes[1].id, "output_");
    }

    #[tokio::test]
    async fn out_of_range_timeout_runs_without_deadline() {
        let raw = json!({"name": "x", "tools": ["search-tool"], "timeout": 9223372036854775807i64});
        let plan = orchestrator().plan(&raw).unwrap();
        assert_eq!(plan.spec.limits.timeout_secs, i64::MAX);
        assert_eq!(plan.request(RequestContext::new()).deadline(), None);

        let result = orchestrator().run(&raw, json!({"input": "q"}), RequestContext::new()).await;
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.status, RunStatus::Completed);
        assert!(
            result
                .metadata_list("violations")
                .iter()
                .any(|v| v.starts_with("limits.timeout_secs"))
        );
    }

    #[tokio::test]
    async fn strict_mode_rejects_violations() {
        let strict = Orchestrator::new(OrchestratorConfig::default().with_strict_validation(true));
        let raw = json!({"name": "x".repeat(500), "tools": ["search-tool"]});
        let result = strict.run(&raw, json!({}), RequestContext::new()).await;
        assert!(!result.success);
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidConfiguration));
        assert!(result.trace.is_empty());
        assert!(!result.metadata_list("violations").is_empty());

        let lenient = orchestrator().run(&raw, json!({}), RequestContext::new()).await;
        assert!(lenient.success);
        assert!(!lenient.metadata_list("violations").is_empty());
    }

    #[tokio::test]
    async fn malformed_embedded_graph_is_rejected() {
        let raw = json!({"name": "g", "execution_graph": {"nodes": "nope"}});
        let result = orchestrator().run(&raw, json!({}), RequestContext::new()).await;
        assert_eq!(result.error_kind, Some(ErrorKind::InvalidGraph));
        assert_eq!(result.metadata["agent"], "g");
    }

    #[tokio::test]
    async fn null_payload_uses_task_text() {
        let raw = json!({
            "name": "Searcher",
            "description": "rust ownership",
            "tools": ["search-tool"],
            "custom": {"tool_configs": {"search-tool": {"documents": ["rust ownership rules", "go"]}}}
        });
        let result = orchestrator().run(&raw, Value::Null, RequestContext::new()).await;
        assert_eq!(result.status, RunStatus::Completed);
        let text = result.result.as_str().unwrap();
        assert!(text.contains("rust ownership rules"));
        assert!(!text.contains("\"go\""));
        assert_eq!(result.metadata["agent"], "Searcher");
        assert_eq!(result.metadata["graph_source"], "tool_chain");
    }
}
