//! Node processors and the type-keyed strategy table.
//!
//! Every node type maps to a [`NodeProcessor`] in a [`ProcessorTable`].
//! A processor receives the node (for its `config`), the current payload,
//! and optionally the tool registry, and returns the next payload. Types
//! missing from the table resolve to [`Passthrough`]; the executor logs
//! them.
//!
//! | type | effect |
//! |------|--------|
//! | `processor`, `transformer` | merge `config.set`, mark `processed: true` |
//! | `classifier` | `category` and `score` from keyword labels |
//! | `retriever` | `retrieved` from `config.documents` or a registry tool |
//! | `generator` | `generated` from `config.template` or a summary |
//! | `formatter` | `formatted` as text, markdown or JSON |
//! | `tool` | run a registry tool and merge its output |
//! | `passthrough` | identity |

use super::condition::lookup;
use super::model::{ExecutionNode, PASSTHROUGH};
use crate::error::ProcessError;
use crate::tools::core::words;
use crate::tools::names::KNOWLEDGE_BASE;
use crate::tools::{ToolRegistry, input_text};
use serde_json::{Map, Value, json};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Boxed future returned by [`NodeProcessor::process`]. Registry errors
/// become [`NodeError::Tool`](crate::error::NodeError::Tool), messages
/// become [`NodeError::Execution`](crate::error::NodeError::Execution).
pub type NodeFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, ProcessError>> + Send + 'a>>;

pub trait NodeProcessor: Send + Sync {
    /// Turn `payload` into the payload seen by downstream nodes.
    fn process<'a>(
        &'a self,
        node: &'a ExecutionNode,
        payload: Value,
        tools: Option<&'a ToolRegistry>,
    ) -> NodeFuture<'a>;
}

// ── Strategy table ─────────────────────────────────────────────────

/// Node-type tag to processor, with [`Passthrough`] for unknown types.
#[derive(Clone)]
pub struct ProcessorTable {
    processors: HashMap<String, Arc<dyn NodeProcessor>>,
    fallback: Arc<dyn NodeProcessor>,
}

impl Default for ProcessorTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProcessorTable {
    /// A table with no registered types; everything passes through.
    pub fn empty() -> Self {
        Self {
            processors: HashMap::new(),
            fallback: Arc::new(Passthrough),
        }
    }

    pub fn builtin() -> Self {
        let transformer: Arc<dyn NodeProcessor> = Arc::new(Transformer);
        let mut table = Self::empty();
        table.register_shared("processor", Arc::clone(&transformer));
        table.register_shared("transformer", transformer);
        table.register("classifier", Classifier);
        table.register("retriever", Retriever);
        table.register("generator", Generator);
        table.register("formatter", Formatter);
        table.register("tool", ToolNode);
        table.register(PASSTHROUGH, Passthrough);
        table
    }

    /// Register (or replace) the processor for `kind`. Kinds are
    /// case-insensitive.
    pub fn register(&mut self, kind: &str, processor: impl NodeProcessor + 'static) {
        self.register_shared(kind, Arc::new(processor));
    }

    pub fn register_shared(&mut self, kind: &str, processor: Arc<dyn NodeProcessor>) {
        self.processors.insert(kind.to_lowercase(), processor);
    }

    pub fn with_processor(mut self, kind: &str, processor: impl NodeProcessor + 'static) -> Self {
        self.register(kind, processor);
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.processors.contains_key(&kind.to_lowercase())
    }

    /// The processor for `kind` and whether it was registered (`false`
    /// means the pass-through fallback was returned).
    pub fn resolve(&self, kind: &str) -> (Arc<dyn NodeProcessor>, bool) {
        match self.processors.get(&kind.to_lowercase()) {
            Some(processor) => (Arc::clone(processor), true),
            None => (Arc::clone(&self.fallback), false),
        }
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.processors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }
}

impl fmt::Debug for ProcessorTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorTable")
            .field("kinds", &self.kinds())
            .finish_non_exhaustive()
    }
}

// ── FnProcessor ────────────────────────────────────────────────────

type ErasedNodeHandler =
    Box<dyn Fn(Value) -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> + Send + Sync>;

/// A closure-based processor that only sees the payload.
///
/// ```ignore
/// let table = ProcessorTable::builtin().with_processor(
///     "score",
///     FnProcessor::new(|mut payload: Value| async move {
///         payload["score"] = json!(0.95);
///         Ok(payload)
///     }),
/// );
/// ```
pub struct FnProcessor {
    handler: ErasedNodeHandler,
}

impl FnProcessor {
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, String>> + Send + 'static,
    {
        let erased = move |payload: Value| -> Pin<Box<dyn Future<Output = Result<Value, String>> + Send>> {
            Box::pin(handler(payload))
        };
        Self {
            handler: Box::new(erased),
        }
    }
}

impl NodeProcessor for FnProcessor {
    fn process<'a>(
        &'a self,
        _node: &'a ExecutionNode,
        payload: Value,
        _tools: Option<&'a ToolRegistry>,
    ) -> NodeFuture<'a> {
        let pending = (self.handler)(payload);
        Box::pin(async move { pending.await.map_err(ProcessError::Failed) })
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// The payload as an object. Null becomes empty; any other non-object is
/// kept under `input`.
fn into_object(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => {
            let mut map = Map::new();
            map.insert("input".into(), other);
            map
        }
    }
}

/// Plain text of a value: strings as-is, null as empty, else compact JSON.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn config_usize(node: &ExecutionNode, key: &str, default: usize) -> usize {
    node.config
        .get(key)
        .and_then(Value::as_u64)
        .map_or(default, |n| n as usize)
}

/// Text a node should read: `config.<field_key>` names a payload field,
/// otherwise the usual text fields are tried.
fn source_text(node: &ExecutionNode, payload: &Value, field_key: &str) -> String {
    match node.config_str(field_key) {
        Some(field) => lookup(payload, &field.split('.').collect::<Vec<_>>())
            .map(plain)
            .unwrap_or_default(),
        None => input_text(payload),
    }
}

fn required_tools<'a>(tools: Option<&'a ToolRegistry>, tool_id: &str) -> Result<&'a ToolRegistry, String> {
    tools.ok_or_else(|| format!("no tool registry available to run '{tool_id}'"))
}

// ── Processors ─────────────────────────────────────────────────────

/// Identity. Also the fallback for unregistered node types.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl NodeProcessor for Passthrough {
    fn process<'a>(
        &'a self,
        _node: &'a ExecutionNode,
        payload: Value,
        _tools: Option<&'a ToolRegistry>,
    ) -> NodeFuture<'a> {
        Box::pin(async move { Ok(payload) })
    }
}

/// Merges `config.set` into the payload and marks it `processed`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Transformer;

impl NodeProcessor for Transformer {
    fn process<'a>(
        &'a self,
        node: &'a ExecutionNode,
        payload: Value,
        _tools: Option<&'a ToolRegistry>,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let mut map = into_object(payload);
            if let Some(Value::Object(set)) = node.config.get("set") {
                map.extend(set.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            map.insert("processed".into(), Value::Bool(true));
            Ok(Value::Object(map))
        })
    }
}

/// Keyword classifier.
///
/// `config.labels` maps each label to its keywords. The label with the
/// largest share of its keywords present in the input wins; `score` is
/// that share. With no hits the category is `config.default_label`
/// (default `general`) and the score 0.
#[derive(Debug, Clone, Copy, Default)]
pub struct Classifier;

impl NodeProcessor for Classifier {
    fn process<'a>(
        &'a self,
        node: &'a ExecutionNode,
        payload: Value,
        _tools: Option<&'a ToolRegistry>,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let text = match node.config_str("input_field") {
                Some(_) => source_text(node, &payload, "input_field"),
                None => payload
                    .get("input")
                    .map(plain)
                    .unwrap_or_else(|| input_text(&payload)),
            }
            .to_lowercase();

            let mut best: Option<(&str, f64)> = None;
            if let Some(Value::Object(labels)) = node.config.get("labels") {
                for (label, keywords) in labels {
                    let keywords: Vec<String> = match keywords {
                        Value::String(s) => vec![s.to_lowercase()],
                        Value::Array(items) => items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_lowercase)
                            .collect(),
                        _ => Vec::new(),
                    };
                    if keywords.is_empty() {
                        continue;
                    }
                    let hits = keywords.iter().filter(|k| text.contains(k.as_str())).count();
                    let score = hits as f64 / keywords.len() as f64;
                    if hits > 0 && best.is_none_or(|(_, s)| score > s) {
                        best = Some((label.as_str(), score));
                    }
                }
            }

            let (category, score) = best.unwrap_or((
                node.config_str("default_label").unwrap_or("general"),
                0.0,
            ));
            debug!(node_id = %node.id, category, score, "Classified payload");

            let mut map = into_object(payload);
            map.insert("category".into(), json!(category));
            map.insert("score".into(), json!(score));
            Ok(Value::Object(map))
        })
    }
}

/// Writes the top `config.top_k` (default 3) matches for the payload's
/// query into `retrieved`.
///
/// With `config.documents` the documents are ranked by query-word overlap
/// in place. Otherwise the registry tool `config.tool` (default
/// `knowledge-base`, configured by `config.tool_config`) is queried and its
/// `results` are used.
#[derive(Debug, Clone, Copy, Default)]
pub struct Retriever;

impl NodeProcessor for Retriever {
    fn process<'a>(
        &'a self,
        node: &'a ExecutionNode,
        payload: Value,
        tools: Option<&'a ToolRegistry>,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let top_k = config_usize(node, "top_k", 3);
            let query = source_text(node, &payload, "query_field");

            let mut retrieved: Vec<Value> = match node.config.get("documents") {
                Some(Value::Array(documents)) => rank_documents(&query, documents),
                _ => {
                    let tool_id = node.config_str("tool").unwrap_or(KNOWLEDGE_BASE);
                    let registry = required_tools(tools, tool_id)?;
                    let instance = registry
                        .create_instance(tool_id, node.config.get("tool_config"))?;
                    let output = instance
                        .execute(json!({"query": query, "top_k": top_k}))
                        .await?;
                    match output {
                        Value::Array(items) => items,
                        Value::Object(mut obj) => match obj.remove("results") {
                            Some(Value::Array(items)) => items,
                            _ => Vec::new(),
                        },
                        _ => Vec::new(),
                    }
                }
            };
            retrieved.truncate(top_k);
            debug!(node_id = %node.id, count = retrieved.len(), "Retrieved items");

            let mut map = into_object(payload);
            map.insert("retrieved".into(), Value::Array(retrieved));
            Ok(Value::Object(map))
        })
    }
}

/// Rank documents (strings, or objects with `text`/`content`) by the
/// number of distinct query words they contain. Zero-score documents are
/// dropped; ties keep document order.
fn rank_documents(query: &str, documents: &[Value]) -> Vec<Value> {
    let terms: HashSet<String> = words(query).into_iter().collect();
    let mut scored: Vec<(String, usize)> = documents
        .iter()
        .filter_map(|doc| match doc {
            Value::String(s) => Some(s.clone()),
            Value::Object(obj) => ["text", "content"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))
                .map(str::to_string),
            _ => None,
        })
        .filter_map(|text| {
            let present: HashSet<String> = words(&text).into_iter().collect();
            let score = terms.intersection(&present).count();
            (score > 0).then_some((text, score))
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored
        .into_iter()
        .map(|(text, score)| json!({"text": text, "score": score}))
        .collect()
}

/// Writes `generated`: `config.template` with `{field}` placeholders
/// filled from the payload, or a short summary of the input and any
/// retrieved items.
#[derive(Debug, Clone, Copy, Default)]
pub struct Generator;

impl NodeProcessor for Generator {
    fn process<'a>(
        &'a self,
        node: &'a ExecutionNode,
        payload: Value,
        _tools: Option<&'a ToolRegistry>,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let generated = match node.config_str("template") {
                Some(template) => render_template(template, &payload),
                None => summarize(&payload),
            };
            let mut map = into_object(payload);
            map.insert("generated".into(), Value::String(generated));
            Ok(Value::Object(map))
        })
    }
}

/// Replace `{path}` placeholders with payload values. Missing fields render
/// empty; braces around anything that is not a field path are kept.
pub fn render_template(template: &str, payload: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars();
    while let Some(c) = chars.next() {
        if c != '{' {
            out.push(c);
            continue;
        }
        let mut name = String::new();
        let mut closed = false;
        for n in chars.by_ref() {
            if n == '}' {
                closed = true;
                break;
            }
            name.push(n);
        }
        let is_path = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if closed && is_path {
            let path: Vec<&str> = name.split('.').collect();
            out.push_str(&lookup(payload, &path).map(plain).unwrap_or_default());
        } else {
            out.push('{');
            out.push_str(&name);
            if closed {
                out.push('}');
            }
        }
    }
    out
}

fn summarize(payload: &Value) -> String {
    let input = input_text(payload);
    let mut text = if input.trim().is_empty() {
        "No input provided.".to_string()
    } else {
        format!("Response to: {}", input.trim())
    };
    if let Some(category) = payload.get("category").and_then(Value::as_str) {
        text.push_str(&format!("\nCategory: {category}"));
    }
    let sources: Vec<String> = payload
        .get("retrieved")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|item| match item.get("text") {
            Some(t) => plain(t),
            None => plain(item),
        })
        .filter(|s| !s.is_empty())
        .collect();
    if !sources.is_empty() {
        text.push_str(&format!("\n\nBased on {} source(s):", sources.len()));
        for source in sources {
            text.push_str("\n- ");
            text.push_str(&source);
        }
    }
    text
}

/// Writes `formatted`: `generated` (or the whole payload) rendered per
/// `config.format` (`text`, `markdown`, `json`; default `text`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Formatter;

impl NodeProcessor for Formatter {
    fn process<'a>(
        &'a self,
        node: &'a ExecutionNode,
        payload: Value,
        _tools: Option<&'a ToolRegistry>,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let source = match payload.get("generated") {
                Some(generated) if !generated.is_null() => generated.clone(),
                _ => payload.clone(),
            };
            let body = match &source {
                Value::String(s) => s.clone(),
                other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
            };

            let format = node.config_str("format").unwrap_or("text").to_lowercase();
            let formatted = match format.as_str() {
                "markdown" | "md" => {
                    let title = node.config_str("title").unwrap_or("Result");
                    format!("## {title}\n\n{body}")
                }
                "json" => serde_json::to_string_pretty(&json!({"result": source}))
                    .map_err(|e| format!("failed to render JSON: {e}"))?,
                "text" => body,
                other => {
                    warn!(node_id = %node.id, format = other, "Unknown output format, using text");
                    body
                }
            };

            let mut map = into_object(payload);
            map.insert("formatted".into(), Value::String(formatted));
            Ok(Value::Object(map))
        })
    }
}

/// Runs the registry tool named by `config.tool` on the payload.
///
/// An object result is merged into the payload; any other result is
/// stored under `config.output_field` (default `tool_output`).
/// `config.tool_config` selects the tool instance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolNode;

impl NodeProcessor for ToolNode {
    fn process<'a>(
        &'a self,
        node: &'a ExecutionNode,
        payload: Value,
        tools: Option<&'a ToolRegistry>,
    ) -> NodeFuture<'a> {
        Box::pin(async move {
            let tool_id = node
                .config_str("tool")
                .ok_or_else(|| "tool node has no 'tool' in its config".to_string())?;
            let registry = required_tools(tools, tool_id)?;
            let instance = registry.create_instance(tool_id, node.config.get("tool_config"))?;

            let output = instance.execute(payload.clone()).await?;
            debug!(node_id = %node.id, tool = %tool_id, uses = instance.usage_count(), "Tool finished");

            let mut map = into_object(payload);
            match output {
                Value::Object(obj) => map.extend(obj),
                other => {
                    let field = node.config_str("output_field").unwrap_or("tool_output");
                    map.insert(field.to_string(), other);
                }
            }
            Ok(Value::Object(map))
        })
    }
}
