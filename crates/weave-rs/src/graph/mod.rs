//! Execution graph engine.
//!
//! A graph description ([`ExecutionGraph`]) is compiled into a topological
//! schedule ([`CompiledGraph`]) and run node by node against a JSON payload
//! by a [`GraphExecutor`]. Each node's output becomes the payload for the
//! nodes after it.
//!
//! # Submodules
//!
//! - [`model`]: nodes, guarded edges, parsing from loosely-shaped JSON.
//! - [`condition`]: the guard predicate language.
//! - [`compile`](mod@compile): validation and Kahn ordering. Cycles and
//!   dangling edges are rejected before any node runs.
//! - [`nodes`]: [`NodeProcessor`] and the type-keyed [`ProcessorTable`].
//! - [`context`]: [`RequestContext`], [`ExecutionContext`], [`TraceEntry`].
//! - [`executor`]: [`GraphExecutor`], [`GraphEvent`], [`OrchestrationResult`].
//! - [`visualize`]: [`GraphView`] and Mermaid output.

pub mod compile;
pub mod condition;
pub mod context;
pub mod executor;
pub mod model;
pub mod nodes;
pub mod visualize;

pub use compile::{CompiledGraph, compile};
pub use condition::Guard;
pub use context::{ExecutionContext, NodeStatus, RequestContext, RunStatus, TraceEntry};
pub use executor::{GraphEvent, GraphExecutor, OrchestrationResult, select_result};
pub use model::{ExecutionEdge, ExecutionGraph, ExecutionNode, PASSTHROUGH};
pub use nodes::{FnProcessor, NodeFuture, NodeProcessor, ProcessorTable};
pub use visualize::GraphView;
