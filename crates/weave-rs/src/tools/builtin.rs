//! Built-in tools and the providers that register them.
//!
//! All built-ins are deterministic functions of their JSON input and
//! configuration (the system monitor aside, which reports the clock). None
//! touch the network or persistent storage: search and knowledge lookups run
//! over documents supplied in configuration or in the payload itself.

use super::core::{DescribedTool, Tool, ToolFuture, ToolRegistration, input_text, words};
use super::descriptor::{ToolCategory, ToolDescriptor};
use super::names::*;
use super::provider::{StaticProvider, ToolProvider};
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::path::Path;
use std::time::Instant;

/// Every built-in provider, one per functional area. Provider names become
/// the descriptors' `framework` on discovery.
pub fn providers() -> Vec<Box<dyn ToolProvider>> {
    vec![
        Box::new(StaticProvider::new("reasoning", reasoning_tools)),
        Box::new(StaticProvider::new("search", search_tools)),
        Box::new(StaticProvider::new("knowledge", knowledge_tools)),
        Box::new(StaticProvider::new("chunking", chunking_tools)),
        Box::new(StaticProvider::new("file-management", file_tools)),
        Box::new(StaticProvider::new("system", system_tools)),
    ]
}

fn reasoning_tools() -> Result<Vec<ToolRegistration>, String> {
    Ok(vec![
        ToolRegistration::of::<ReasoningTool>(),
        ToolRegistration::of::<ReasoningManager>(),
    ])
}

fn search_tools() -> Result<Vec<ToolRegistration>, String> {
    Ok(vec![ToolRegistration::of::<SearchTool>()])
}

fn knowledge_tools() -> Result<Vec<ToolRegistration>, String> {
    Ok(vec![ToolRegistration::of::<KnowledgeBase>()])
}

fn chunking_tools() -> Result<Vec<ToolRegistration>, String> {
    Ok(vec![ToolRegistration::of::<TextChunker>()])
}

fn file_tools() -> Result<Vec<ToolRegistration>, String> {
    Ok(vec![ToolRegistration::of::<FileInspector>()])
}

fn system_tools() -> Result<Vec<ToolRegistration>, String> {
    Ok(vec![ToolRegistration::of::<SystemMonitor>()])
}

/// Split text into trimmed, non-empty clauses.
fn clauses(text: &str) -> Vec<String> {
    text.split(['.', '?', '!', ';', '\n', '。', '？', '！', '；'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Number of distinct query words present in `text`.
fn overlap(query: &HashSet<String>, text: &str) -> usize {
    let present: HashSet<String> = words(text).into_iter().collect();
    query.intersection(&present).count()
}

// ── Reasoning ──────────────────────────────────────────────────────

/// Configuration for [`ReasoningTool`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ReasoningConfig {
    /// Maximum number of reasoning steps emitted.
    pub max_steps: usize,
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self { max_steps: 5 }
    }
}

/// Breaks the input into clauses and reasons over them one step at a time.
#[derive(Debug)]
pub struct ReasoningTool {
    max_steps: usize,
}

impl ReasoningTool {
    fn reason(&self, text: &str) -> Value {
        let points: Vec<String> = clauses(text).into_iter().take(self.max_steps).collect();
        let steps: Vec<String> = points
            .iter()
            .enumerate()
            .map(|(i, point)| format!("Step {}: consider \"{point}\"", i + 1))
            .collect();
        let conclusion = match points.last() {
            Some(last) => format!("Considered {} point(s); concluding from \"{last}\"", points.len()),
            None => "No input to reason about".to_string(),
        };
        json!({"steps": steps, "conclusion": conclusion})
    }
}

impl Tool for ReasoningTool {
    fn execute(&self, input: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let text = input_text(&input);
            Ok(json!({"reasoning": self.reason(&text)}))
        })
    }
}

impl DescribedTool for ReasoningTool {
    type Config = ReasoningConfig;

    fn describe() -> ToolDescriptor {
        ToolDescriptor::builder(REASONING_TOOL)
            .name("Reasoning Tool")
            .description("Step-by-step reasoning and analysis of the input text")
            .category(ToolCategory::Reasoning)
            .capabilities(&["reasoning", "analysis"])
            .build()
    }

    fn build(config: ReasoningConfig) -> Result<Self, String> {
        if config.max_steps == 0 {
            return Err("max_steps must be at least 1".into());
        }
        Ok(Self {
            max_steps: config.max_steps,
        })
    }
}

/// Configuration for [`ReasoningManager`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ReasoningManagerConfig {
    /// Maximum number of reasoning steps emitted.
    pub max_steps: usize,
    /// Prepend a plan to the reasoning output.
    pub include_plan: bool,
}

impl Default for ReasoningManagerConfig {
    fn default() -> Self {
        Self {
            max_steps: 5,
            include_plan: true,
        }
    }
}

/// Umbrella over planning and step-by-step reasoning.
#[derive(Debug)]
pub struct ReasoningManager {
    reasoner: ReasoningTool,
    include_plan: bool,
}

impl Tool for ReasoningManager {
    fn execute(&self, input: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let text = input_text(&input);
            let mut out = json!({"reasoning": self.reasoner.reason(&text)});
            if self.include_plan {
                let subject = clauses(&text).into_iter().next().unwrap_or_default();
                out["plan"] = json!([
                    format!("Understand the task: {subject}"),
                    "Gather the relevant information",
                    "Analyze the information step by step",
                    "State the conclusion",
                ]);
            }
            Ok(out)
        })
    }
}

impl DescribedTool for ReasoningManager {
    type Config = ReasoningManagerConfig;

    fn describe() -> ToolDescriptor {
        ToolDescriptor::builder(REASONING_MANAGER)
            .name("Reasoning Manager")
            .description("Plans a task and coordinates step-by-step reasoning over it")
            .category(ToolCategory::Reasoning)
            .capabilities(&["reasoning", "planning", "analysis"])
            .manager(true)
            .build()
    }

    fn build(config: ReasoningManagerConfig) -> Result<Self, String> {
        let reasoner = ReasoningTool::build(ReasoningConfig {
            max_steps: config.max_steps,
        })?;
        Ok(Self {
            reasoner,
            include_plan: config.include_plan,
        })
    }
}

// ── Search ─────────────────────────────────────────────────────────

/// Configuration for [`SearchTool`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    /// Documents searched in addition to any `documents` in the payload.
    pub documents: Vec<String>,
    /// Maximum number of results returned.
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            documents: Vec::new(),
            max_results: 5,
        }
    }
}

/// One ranked search hit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub text: String,
    pub score: usize,
}

/// Keyword search over configured and payload-supplied documents.
#[derive(Debug)]
pub struct SearchTool {
    config: SearchConfig,
}

impl Tool for SearchTool {
    fn execute(&self, input: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let query = input_text(&input);
            let terms: HashSet<String> = words(&query).into_iter().collect();

            let supplied = input
                .get("documents")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str);
            let mut hits: Vec<SearchHit> = self
                .config
                .documents
                .iter()
                .map(String::as_str)
                .chain(supplied)
                .filter_map(|doc| {
                    let score = overlap(&terms, doc);
                    (score > 0).then(|| SearchHit {
                        text: doc.to_string(),
                        score,
                    })
                })
                .collect();
            hits.sort_by(|a, b| b.score.cmp(&a.score));
            let total = hits.len();
            hits.truncate(self.config.max_results);

            Ok(json!({"query": query, "results": hits, "total": total}))
        })
    }
}

impl DescribedTool for SearchTool {
    type Config = SearchConfig;

    fn describe() -> ToolDescriptor {
        ToolDescriptor::builder(SEARCH_TOOL)
            .name("Search Tool")
            .description("Keyword search over supplied documents, returning ranked matches")
            .category(ToolCategory::Search)
            .capabilities(&["search", "retrieval"])
            .build()
    }

    fn build(config: SearchConfig) -> Result<Self, String> {
        Ok(Self { config })
    }
}

// ── Knowledge ──────────────────────────────────────────────────────

/// One knowledge-base entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct KnowledgeEntry {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub content: String,
}

/// Configuration for [`KnowledgeBase`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct KnowledgeConfig {
    pub entries: Vec<KnowledgeEntry>,
    /// Default number of entries returned; a payload `top_k` overrides it.
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            top_k: 3,
        }
    }
}

/// Looks up entries whose title or content mention the query. Title hits
/// count double.
#[derive(Debug)]
pub struct KnowledgeBase {
    config: KnowledgeConfig,
}

impl Tool for KnowledgeBase {
    fn execute(&self, input: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let query = input_text(&input);
            let terms: HashSet<String> = words(&query).into_iter().collect();
            let top_k = input
                .get("top_k")
                .and_then(Value::as_u64)
                .map_or(self.config.top_k, |k| k as usize);

            let mut scored: Vec<(&KnowledgeEntry, usize)> = self
                .config
                .entries
                .iter()
                .map(|e| (e, 2 * overlap(&terms, &e.title) + overlap(&terms, &e.content)))
                .filter(|(_, score)| *score > 0)
                .collect();
            scored.sort_by(|a, b| b.1.cmp(&a.1));

            let results: Vec<Value> = scored
                .into_iter()
                .take(top_k)
                .map(|(entry, score)| {
                    json!({
                        "id": entry.id,
                        "title": entry.title,
                        "text": entry.content,
                        "score": score,
                    })
                })
                .collect();
            Ok(json!({"query": query, "results": results}))
        })
    }
}

impl DescribedTool for KnowledgeBase {
    type Config = KnowledgeConfig;

    fn describe() -> ToolDescriptor {
        ToolDescriptor::builder(KNOWLEDGE_BASE)
            .name("Knowledge Base")
            .description("Retrieves knowledge entries relevant to a question")
            .category(ToolCategory::Knowledge)
            .capabilities(&["knowledge", "retrieval"])
            .build()
    }

    fn build(config: KnowledgeConfig) -> Result<Self, String> {
        Ok(Self { config })
    }
}

// ── Chunking ───────────────────────────────────────────────────────

/// Configuration for [`TextChunker`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ChunkerConfig {
    /// Characters per chunk.
    pub chunk_size: usize,
    /// Characters shared by consecutive chunks. Must be below `chunk_size`.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            overlap: 50,
        }
    }
}

/// Splits text into overlapping fixed-size character windows.
#[derive(Debug)]
pub struct TextChunker {
    config: ChunkerConfig,
}

impl TextChunker {
    fn chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let step = self.config.chunk_size - self.config.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.config.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }
}

impl Tool for TextChunker {
    fn execute(&self, input: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let text = match input.get("text").and_then(Value::as_str) {
                Some(text) => text.to_string(),
                None => input_text(&input),
            };
            let chunks = self.chunk(&text);
            Ok(json!({"chunk_count": chunks.len(), "chunks": chunks}))
        })
    }
}

impl DescribedTool for TextChunker {
    type Config = ChunkerConfig;

    fn describe() -> ToolDescriptor {
        ToolDescriptor::builder(TEXT_CHUNKER)
            .name("Text Chunker")
            .description("Splits long documents into overlapping text chunks")
            .category(ToolCategory::Chunking)
            .capabilities(&["chunking", "text-splitting"])
            .asynchronous(false)
            .build()
    }

    fn build(config: ChunkerConfig) -> Result<Self, String> {
        if config.chunk_size == 0 {
            return Err("chunk_size must be at least 1".into());
        }
        if config.overlap >= config.chunk_size {
            return Err(format!(
                "overlap ({}) must be smaller than chunk_size ({})",
                config.overlap, config.chunk_size
            ));
        }
        Ok(Self { config })
    }
}

// ── File management ────────────────────────────────────────────────

/// Configuration for [`FileInspector`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct FileInspectorConfig {
    /// Maximum number of files described per call.
    pub max_files: usize,
}

impl Default for FileInspectorConfig {
    fn default() -> Self {
        Self { max_files: 100 }
    }
}

/// Describes file references in the payload: name, extension, kind and
/// (when content is inline) size. Never reads the filesystem.
#[derive(Debug)]
pub struct FileInspector {
    max_files: usize,
}

fn file_kind(extension: &str) -> &'static str {
    match extension {
        "md" | "txt" | "pdf" | "doc" | "docx" | "rtf" | "html" => "document",
        "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" => "image",
        "rs" | "py" | "js" | "ts" | "go" | "java" | "c" | "cpp" | "h" => "code",
        "csv" | "json" | "xml" | "yaml" | "yml" | "toml" => "data",
        _ => "other",
    }
}

fn describe_file(entry: &Value) -> Option<Value> {
    let (name, content, size) = match entry {
        Value::String(name) => (name.as_str(), None, None),
        Value::Object(obj) => {
            let name = ["name", "filename", "path"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str))?;
            (
                name,
                obj.get("content").and_then(Value::as_str),
                obj.get("size").and_then(Value::as_u64),
            )
        }
        _ => return None,
    };
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    let size = size.or_else(|| content.map(|c| c.len() as u64));
    Some(json!({
        "name": name,
        "extension": extension,
        "kind": file_kind(&extension),
        "size": size,
    }))
}

impl Tool for FileInspector {
    fn execute(&self, input: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let entries: Vec<Value> = match input.get("files") {
                Some(Value::Array(files)) => files.clone(),
                _ => ["file", "filename", "path"]
                    .iter()
                    .find_map(|k| input.get(*k).cloned())
                    .into_iter()
                    .collect(),
            };
            let files: Vec<Value> = entries
                .iter()
                .filter_map(describe_file)
                .take(self.max_files)
                .collect();
            Ok(json!({"count": files.len(), "files": files}))
        })
    }
}

impl DescribedTool for FileInspector {
    type Config = FileInspectorConfig;

    fn describe() -> ToolDescriptor {
        ToolDescriptor::builder(FILE_INSPECTOR)
            .name("File Inspector")
            .description("Reports file metadata such as type, extension and size")
            .category(ToolCategory::FileManagement)
            .capabilities(&["file-management", "metadata"])
            .asynchronous(false)
            .build()
    }

    fn build(config: FileInspectorConfig) -> Result<Self, String> {
        Ok(Self {
            max_files: config.max_files,
        })
    }
}

// ── System ─────────────────────────────────────────────────────────

/// Configuration for [`SystemMonitor`].
#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SystemMonitorConfig {
    /// Include milliseconds since the instance was constructed.
    pub include_uptime: bool,
}

impl Default for SystemMonitorConfig {
    fn default() -> Self {
        Self {
            include_uptime: true,
        }
    }
}

/// Reports health, crate version and instance uptime.
#[derive(Debug)]
pub struct SystemMonitor {
    started: Instant,
    include_uptime: bool,
}

impl Tool for SystemMonitor {
    fn execute(&self, _input: Value) -> ToolFuture<'_> {
        Box::pin(async move {
            let mut out = json!({
                "status": "ok",
                "version": env!("CARGO_PKG_VERSION"),
                "timestamp": Utc::now().to_rfc3339(),
            });
            if self.include_uptime {
                out["uptime_ms"] = json!(self.started.elapsed().as_millis() as u64);
            }
            Ok(out)
        })
    }
}

impl DescribedTool for SystemMonitor {
    type Config = SystemMonitorConfig;

    fn describe() -> ToolDescriptor {
        ToolDescriptor::builder(SYSTEM_MONITOR)
            .name("System Monitor")
            .description("Reports system status, health and uptime")
            .category(ToolCategory::System)
            .capabilities(&["system", "monitoring"])
            .asynchronous(false)
            .build()
    }

    fn build(config: SystemMonitorConfig) -> Result<Self, String> {
        Ok(Self {
            started: Instant::now(),
            include_uptime: config.include_uptime,
        })
    }
}
