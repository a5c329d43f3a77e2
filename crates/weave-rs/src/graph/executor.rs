//! Graph execution.
//!
//! A run walks the compiled order one node at a time. Before each node it
//! checks cancellation and the request deadline, then the node's incoming
//! guards; a node whose guard fails is skipped and the payload is left as
//! is. A node that errors or outlives its timeout is recorded as failed
//! and ends the run. Independent branches are not run in parallel.
//!
//! [`GraphExecutor::execute_stream`] exposes the run as a stream of
//! [`GraphEvent`]s; [`GraphExecutor::execute`] drains the same stream and
//! returns only the final [`OrchestrationResult`].

use super::compile::{CompiledGraph, compile};
use super::context::{
    ExecutionContext, NodeStatus, RequestContext, RunStatus, TraceEntry, preview,
};
use super::model::ExecutionGraph;
use super::nodes::{NodeProcessor, ProcessorTable};
use crate::config::{DEFAULT_NODE_TIMEOUT_SECS, DEFAULT_PREVIEW_CHARS, OrchestratorConfig};
use crate::error::{ErrorKind, GraphError, NodeError, ProcessError};
use crate::tools::ToolRegistry;
use chrono::Utc;
use futures::StreamExt;
use futures::stream::{self, BoxStream};
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

/// Payload fields preferred as the run's result, in order.
pub const RESULT_FIELDS: [&str; 2] = ["formatted", "generated"];

// ── Results and events ─────────────────────────────────────────────

/// Final outcome of a run. Failures carry the partial trace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrchestrationResult {
    pub request_id: String,
    pub success: bool,
    pub status: RunStatus,
    pub result: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub duration_ms: u64,
    pub trace: Vec<TraceEntry>,
    pub metadata: Map<String, Value>,
}

impl OrchestrationResult {
    /// A failed result for a request rejected before any node ran.
    pub fn rejected(request_id: impl Into<String>, kind: ErrorKind, message: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("status".into(), json!(RunStatus::Failed));
        metadata.insert("error_kind".into(), json!(kind));
        Self {
            request_id: request_id.into(),
            success: false,
            status: RunStatus::Failed,
            result: Value::Null,
            error: Some(message.into()),
            error_kind: Some(kind),
            duration_ms: 0,
            trace: Vec::new(),
            metadata,
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Ids of nodes in the trace, in execution order.
    pub fn traced_nodes(&self) -> Vec<&str> {
        self.trace.iter().map(|e| e.node_id.as_str()).collect()
    }

    /// A string list from metadata, e.g. `skipped_nodes`.
    pub fn metadata_list(&self, key: &str) -> Vec<&str> {
        self.metadata
            .get(key)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .collect()
    }
}

/// Progress of a streamed run: one event per executed node, then exactly
/// one `Finished`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GraphEvent {
    NodeCompleted(TraceEntry),
    NodeFailed { entry: TraceEntry, error: String },
    Finished(OrchestrationResult),
}

impl GraphEvent {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }

    pub fn into_result(self) -> Option<OrchestrationResult> {
        match self {
            Self::Finished(result) => Some(result),
            _ => None,
        }
    }
}

/// The value reported as a run's result: the first of [`RESULT_FIELDS`]
/// present in the payload, else the payload itself.
pub fn select_result(payload: &Value) -> Value {
    RESULT_FIELDS
        .iter()
        .find_map(|key| payload.get(*key).filter(|v| !v.is_null()))
        .unwrap_or(payload)
        .clone()
}

// ── Executor ───────────────────────────────────────────────────────

/// Runs graphs against payloads.
///
/// Holds the processor table and, for `tool` and `retriever` nodes, the
/// tool registry. One executor serves any number of concurrent runs.
#[derive(Debug, Clone)]
pub struct GraphExecutor {
    processors: ProcessorTable,
    tools: Option<Arc<ToolRegistry>>,
    node_timeout: Duration,
    preview_chars: usize,
}

impl Default for GraphExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphExecutor {
    /// Built-in processors, no tool registry, default timeout and preview
    /// length.
    pub fn new() -> Self {
        Self {
            processors: ProcessorTable::builtin(),
            tools: None,
            node_timeout: Duration::from_secs(DEFAULT_NODE_TIMEOUT_SECS),
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self::new()
            .with_node_timeout(config.node_timeout())
            .with_preview_chars(config.preview_chars)
    }

    pub fn with_tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_processors(mut self, processors: ProcessorTable) -> Self {
        self.processors = processors;
        self
    }

    pub fn with_processor(mut self, kind: &str, processor: impl NodeProcessor + 'static) -> Self {
        self.processors.register(kind, processor);
        self
    }

    /// Default per-node timeout, used when no incoming edge overrides it.
    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }

    pub fn with_preview_chars(mut self, chars: usize) -> Self {
        self.preview_chars = chars;
        self
    }

    pub fn processors(&self) -> &ProcessorTable {
        &self.processors
    }

    pub fn compile(&self, graph: &ExecutionGraph) -> Result<CompiledGraph, GraphError> {
        compile(graph)
    }

    /// Run `graph` to completion.
    pub async fn execute(
        &self,
        graph: &ExecutionGraph,
        payload: Value,
        request: RequestContext,
    ) -> OrchestrationResult {
        let request_id = request.request_id.clone();
        let mut events = self.execute_stream(graph, payload, request);
        while let Some(event) = events.next().await {
            if let Some(result) = event.into_result() {
                return result;
            }
        }
        OrchestrationResult::rejected(request_id, ErrorKind::InvalidGraph, "run ended without a result")
    }

    /// Run `graph`, yielding an event per executed node and a final
    /// [`GraphEvent::Finished`]. Compilation happens before the first
    /// event; a graph that does not compile yields only `Finished`.
    pub fn execute_stream<'a>(
        &'a self,
        graph: &ExecutionGraph,
        payload: Value,
        request: RequestContext,
    ) -> BoxStream<'a, GraphEvent> {
        let run = Run::new(self, graph, payload, request);
        stream::unfold(Some(run), |state| async move {
            let mut run = state?;
            match run.step().await {
                Step::Node(event) => Some((event, Some(run))),
                Step::Done(result) => Some((GraphEvent::Finished(*result), None)),
            }
        })
        .boxed()
    }
}

// ── Run state machine ──────────────────────────────────────────────

/// Why a run stopped early.
struct Halt {
    status: RunStatus,
    kind: ErrorKind,
    message: String,
}

impl Halt {
    fn node(status: RunStatus, err: &NodeError) -> Self {
        Self {
            status,
            kind: ErrorKind::from(err),
            message: err.to_string(),
        }
    }

    fn graph(err: &GraphError) -> Self {
        Self {
            status: RunStatus::Failed,
            kind: ErrorKind::from(err),
            message: err.to_string(),
        }
    }
}

enum Step {
    Node(GraphEvent),
    Done(Box<OrchestrationResult>),
}

struct Run<'a> {
    executor: &'a GraphExecutor,
    compiled: Option<Arc<CompiledGraph>>,
    context: ExecutionContext,
    payload: Value,
    cursor: usize,
    node_count: usize,
    edge_count: usize,
    executed: Vec<String>,
    skipped: Vec<String>,
    halted: Option<Halt>,
}

impl<'a> Run<'a> {
    fn new(
        executor: &'a GraphExecutor,
        graph: &ExecutionGraph,
        payload: Value,
        request: RequestContext,
    ) -> Self {
        let mut context = ExecutionContext::new(request);
        let (compiled, halted) = match compile(graph) {
            Ok(compiled) => {
                context.start();
                debug!(
                    request_id = %context.request_id(),
                    nodes = compiled.len(),
                    "Starting graph run"
                );
                (Some(Arc::new(compiled)), None)
            }
            Err(err) => {
                warn!(request_id = %context.request_id(), error = %err, "Graph rejected before execution");
                (None, Some(Halt::graph(&err)))
            }
        };
        Self {
            executor,
            compiled,
            context,
            payload,
            cursor: 0,
            node_count: graph.nodes.len(),
            edge_count: graph.edges.len(),
            executed: Vec::new(),
            skipped: Vec::new(),
            halted,
        }
    }

    /// Advance to the next executed node, or to the end of the run.
    async fn step(&mut self) -> Step {
        loop {
            if let Some(halt) = self.halted.take() {
                return Step::Done(Box::new(self.finish(Some(halt))));
            }
            let Some(compiled) = self.compiled.clone() else {
                return Step::Done(Box::new(self.finish(None)));
            };
            let Some(&index) = compiled.order().get(self.cursor) else {
                return Step::Done(Box::new(self.finish(None)));
            };
            let node = compiled.node(index);

            if self.context.request().is_cancelled() {
                info!(request_id = %self.context.request_id(), node_id = %node.id, "Run cancelled");
                let err = NodeError::Cancelled(node.id.clone());
                return Step::Done(Box::new(self.finish(Some(Halt::node(RunStatus::Cancelled, &err)))));
            }
            if self.context.request().deadline_passed() {
                warn!(request_id = %self.context.request_id(), node_id = %node.id, "Request deadline exceeded");
                let err = NodeError::DeadlineExceeded(node.id.clone());
                return Step::Done(Box::new(self.finish(Some(Halt::node(RunStatus::Timeout, &err)))));
            }
            self.cursor += 1;

            if let Some(guard) = compiled.blocking_guard(index, &self.payload) {
                debug!(node_id = %node.id, guard = %guard, "Guard not satisfied, skipping node");
                self.skipped.push(node.id.clone());
                continue;
            }

            return Step::Node(self.run_node(&compiled, index).await);
        }
    }

    async fn run_node(&mut self, compiled: &CompiledGraph, index: usize) -> GraphEvent {
        let executor = self.executor;
        let node = compiled.node(index);
        let (processor, known) = executor.processors.resolve(&node.node_type);
        if !known {
            warn!(node_id = %node.id, node_type = %node.node_type, "Unknown node type, passing payload through");
        }
        let timeout = compiled.node_timeout(index, executor.node_timeout);

        let input_preview = preview(&self.payload, executor.preview_chars);
        debug!(node_id = %node.id, node_type = %node.node_type, ?timeout, "Running node");
        trace!(node_id = %node.id, input = %input_preview, "Node input");

        let timestamp = Utc::now();
        let started = Instant::now();
        let outcome = tokio::time::timeout(
            timeout,
            processor.process(node, self.payload.clone(), executor.tools.as_deref()),
        )
        .await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(ProcessError::Registry(source))) => Err(NodeError::Tool {
                node_id: node.id.clone(),
                source,
            }),
            Ok(Err(ProcessError::Failed(message))) => Err(NodeError::Execution {
                node_id: node.id.clone(),
                message,
            }),
            Err(_) => Err(NodeError::Timeout {
                node_id: node.id.clone(),
                timeout,
            }),
        };

        let mut entry = TraceEntry {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            input_preview,
            output_preview: String::new(),
            duration_ms,
            timestamp,
            status: NodeStatus::Completed,
            error: None,
        };
        self.executed.push(node.id.clone());

        match result {
            Ok(output) => {
                entry.output_preview = preview(&output, executor.preview_chars);
                debug!(node_id = %node.id, duration_ms, "Node completed");
                trace!(node_id = %node.id, output = %entry.output_preview, "Node output");
                self.payload = output;
                self.context.record(entry.clone());
                GraphEvent::NodeCompleted(entry)
            }
            Err(err) => {
                warn!(node_id = %node.id, error = %err, "Node failed, halting run");
                let error = err.to_string();
                entry.status = NodeStatus::Failed;
                entry.error = Some(error.clone());
                self.context.record(entry.clone());
                let status = match err {
                    NodeError::Timeout { .. } => RunStatus::Timeout,
                    _ => RunStatus::Failed,
                };
                self.halted = Some(Halt::node(status, &err));
                GraphEvent::NodeFailed { entry, error }
            }
        }
    }

    fn finish(&mut self, halt: Option<Halt>) -> OrchestrationResult {
        let (status, error, error_kind) = match halt {
            Some(halt) => (halt.status, Some(halt.message), Some(halt.kind)),
            None => (RunStatus::Completed, None, None),
        };
        self.context.finish(status);
        let duration_ms = self.context.elapsed().as_millis() as u64;

        let order = self
            .compiled
            .as_ref()
            .map(|c| c.order_ids())
            .unwrap_or_default();
        let mut metadata = Map::new();
        metadata.insert("execution_order".into(), json!(order));
        metadata.insert("executed_nodes".into(), json!(self.executed));
        metadata.insert("skipped_nodes".into(), json!(self.skipped));
        metadata.insert("node_count".into(), json!(self.node_count));
        metadata.insert("edge_count".into(), json!(self.edge_count));
        metadata.insert("status".into(), json!(status));
        if let Some(kind) = error_kind {
            metadata.insert("error_kind".into(), json!(kind));
        }

        info!(
            request_id = %self.context.request_id(),
            %status,
            executed = self.executed.len(),
            skipped = self.skipped.len(),
            duration_ms,
            "Graph run finished"
        );

        OrchestrationResult {
            request_id: self.context.request_id().to_string(),
            success: status == RunStatus::Completed,
            status,
            result: select_result(&self.payload),
            error,
            error_kind,
            duration_ms,
            trace: self.context.trace().to_vec(),
            metadata,
        }
    }
}
