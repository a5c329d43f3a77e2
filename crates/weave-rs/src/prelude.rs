//! Convenience re-exports for common `weave-rs` types.
//!
//! Meant to be glob-imported by programs that embed the orchestrator:
//!
//! ```ignore
//! use weave_rs::prelude::*;
//! ```
//!
//! This pulls in the [`Orchestrator`] and its config, the specification
//! pipeline, the registry and [`Tool`] trait, and the graph types needed to
//! build and run a graph by hand. Lower-level pieces (guard parsing,
//! compiled schedules, keyword tables) stay in their modules.

// ── Core types ──────────────────────────────────────────────────────
pub use crate::config::OrchestratorConfig;
pub use crate::error::{ErrorKind, GraphError, NodeError, ProcessError, RegistryError};
pub use crate::json_schema_for;
pub use crate::orchestrator::{GraphSource, Orchestrator, Plan, Rejection};

// ── Specification ───────────────────────────────────────────────────
pub use crate::spec::{AgentSpecification, Violation, merge, normalize, validate, validate_with};

// ── Tools ───────────────────────────────────────────────────────────
pub use crate::tools::{
    DescribedTool, FnTool, StaticProvider, Tool, ToolCategory, ToolDescriptor, ToolFuture,
    ToolProvider, ToolRegistration, ToolRegistry,
};

// ── Matching ────────────────────────────────────────────────────────
pub use crate::matching::{RecommendContext, ToolMatcher, optimize_chain};

// ── Graph ───────────────────────────────────────────────────────────
pub use crate::graph::{
    ExecutionEdge, ExecutionGraph, ExecutionNode, FnProcessor, GraphEvent, GraphExecutor,
    GraphView, NodeProcessor, OrchestrationResult, RequestContext, RunStatus, TraceEntry,
};
