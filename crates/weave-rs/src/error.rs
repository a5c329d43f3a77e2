//! Error taxonomy for the orchestration subsystem.
//!
//! Each stage owns its error type. Discovery and matching recover locally
//! and only log; graph compilation errors are fatal before execution;
//! node errors are fatal to the run that raised them. None of these cross
//! the [`Orchestrator`](crate::orchestrator::Orchestrator) boundary raw;
//! they are folded into an [`OrchestrationResult`](crate::graph::OrchestrationResult)
//! as an [`ErrorKind`] plus a message.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by the [`ToolRegistry`](crate::tools::ToolRegistry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("unknown tool '{0}'")]
    NotFound(String),
    #[error("failed to instantiate tool '{id}': {reason}")]
    InstantiationFailure { id: String, reason: String },
    #[error("tool '{0}' is disabled")]
    Disabled(String),
}

/// Errors raised while compiling an [`ExecutionGraph`](crate::graph::ExecutionGraph).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("dependency cycle detected: {} of {total} nodes could not be ordered ({})", unresolved.len(), unresolved.join(", "))]
    Cyclic {
        unresolved: Vec<String>,
        total: usize,
    },
    #[error("duplicate node id '{0}'")]
    DuplicateNode(String),
    #[error("edge {from} -> {to} references unknown node '{missing}'")]
    UnknownEdgeEndpoint {
        from: String,
        to: String,
        missing: String,
    },
    #[error("invalid guard condition '{condition}': {reason}")]
    InvalidCondition { condition: String, reason: String },
    #[error("malformed graph description: {0}")]
    Malformed(String),
}

/// Failure returned by a [`NodeProcessor`](crate::graph::NodeProcessor).
///
/// Registry failures keep their type so the run reports them as
/// `not_found`, `tool_disabled` or `instantiation_failure`; everything else
/// is a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    Failed(String),
}

impl From<String> for ProcessError {
    fn from(message: String) -> Self {
        Self::Failed(message)
    }
}

impl From<&str> for ProcessError {
    fn from(message: &str) -> Self {
        Self::Failed(message.to_string())
    }
}

/// Errors that end a graph run at a node boundary or inside a node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    #[error("node '{node_id}' timed out after {:.1}s", timeout.as_secs_f64())]
    Timeout { node_id: String, timeout: Duration },
    #[error("node '{node_id}' failed: {message}")]
    Execution { node_id: String, message: String },
    #[error("node '{node_id}' failed: {source}")]
    Tool {
        node_id: String,
        source: RegistryError,
    },
    #[error("run cancelled before node '{0}'")]
    Cancelled(String),
    #[error("request deadline exceeded before node '{0}'")]
    DeadlineExceeded(String),
}

/// Serializable classification of a failed run, carried in
/// [`OrchestrationResult::error_kind`](crate::graph::OrchestrationResult::error_kind).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    ToolDisabled,
    InstantiationFailure,
    CyclicGraph,
    InvalidGraph,
    NodeTimeout,
    NodeExecutionFailure,
    InvalidConfiguration,
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::ToolDisabled => "tool_disabled",
            Self::InstantiationFailure => "instantiation_failure",
            Self::CyclicGraph => "cyclic_graph",
            Self::InvalidGraph => "invalid_graph",
            Self::NodeTimeout => "node_timeout",
            Self::NodeExecutionFailure => "node_execution_failure",
            Self::InvalidConfiguration => "invalid_configuration",
            Self::Cancelled => "cancelled",
        }
    }
}

impl From<&RegistryError> for ErrorKind {
    fn from(err: &RegistryError) -> Self {
        match err {
            RegistryError::NotFound(_) => Self::NotFound,
            RegistryError::Disabled(_) => Self::ToolDisabled,
            RegistryError::InstantiationFailure { .. } => Self::InstantiationFailure,
        }
    }
}

impl From<&GraphError> for ErrorKind {
    fn from(err: &GraphError) -> Self {
        match err {
            GraphError::Cyclic { .. } => Self::CyclicGraph,
            _ => Self::InvalidGraph,
        }
    }
}

impl From<&NodeError> for ErrorKind {
    fn from(err: &NodeError) -> Self {
        match err {
            NodeError::Timeout { .. } | NodeError::DeadlineExceeded(_) => Self::NodeTimeout,
            NodeError::Execution { .. } => Self::NodeExecutionFailure,
            NodeError::Tool { source, .. } => Self::from(source),
            NodeError::Cancelled(_) => Self::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cyclic_error_lists_unresolved_nodes() {
        let err = GraphError::Cyclic {
            unresolved: vec!["a".into(), "b".into()],
            total: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("cycle"));
        assert!(msg.contains("2 of 2"));
        assert!(msg.contains("a, b"));
        assert_eq!(ErrorKind::from(&err), ErrorKind::CyclicGraph);
    }

    #[test]
    fn node_errors_classify() {
        let timeout = NodeError::Timeout {
            node_id: "n".into(),
            timeout: Duration::from_secs(30),
        };
        assert_eq!(ErrorKind::from(&timeout), ErrorKind::NodeTimeout);
        assert!(timeout.to_string().contains("30.0s"));

        let failed = NodeError::Execution {
            node_id: "n".into(),
            message: "boom".into(),
        };
        assert_eq!(ErrorKind::from(&failed), ErrorKind::NodeExecutionFailure);
    }

    #[test]
    fn disabled_tool_has_its_own_kind() {
        let disabled = RegistryError::Disabled("stamp".into());
        assert_eq!(ErrorKind::from(&disabled), ErrorKind::ToolDisabled);
        assert_eq!(
            ErrorKind::from(&RegistryError::NotFound("stamp".into())),
            ErrorKind::NotFound
        );

        let failed = NodeError::Tool {
            node_id: "n".into(),
            source: disabled,
        };
        assert_eq!(ErrorKind::from(&failed), ErrorKind::ToolDisabled);
        assert!(failed.to_string().contains("'stamp' is disabled"));
        assert_eq!(ErrorKind::ToolDisabled.as_str(), "tool_disabled");
    }

    #[test]
    fn error_kind_serializes_snake_case() {
        let json = serde_json::to_value(ErrorKind::InvalidConfiguration).unwrap();
        assert_eq!(json, "invalid_configuration");
        assert_eq!(ErrorKind::CyclicGraph.as_str(), "cyclic_graph");
    }
}
