//! Renderable views of a graph. Pure data transforms; nothing here runs
//! nodes.

use super::compile::compile;
use super::model::ExecutionGraph;
use crate::error::GraphError;
use serde::Serialize;
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewNode {
    pub id: String,
    pub node_type: String,
    /// Longest distance from a root; nodes on one level do not depend on
    /// each other.
    pub level: usize,
    /// Position in execution order.
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewEdge {
    pub from: String,
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub weight: f64,
}

/// Nodes in execution order with their levels, and labelled edges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<ViewNode>,
    pub edges: Vec<ViewEdge>,
    /// Number of distinct levels.
    pub depth: usize,
}

impl GraphView {
    /// Build a view. The graph must compile.
    pub fn from_graph(graph: &ExecutionGraph) -> Result<Self, GraphError> {
        let compiled = compile(graph)?;
        let nodes: Vec<ViewNode> = compiled
            .order()
            .iter()
            .enumerate()
            .map(|(position, &index)| {
                let node = compiled.node(index);
                ViewNode {
                    id: node.id.clone(),
                    node_type: node.node_type.clone(),
                    level: compiled.level(index),
                    position,
                }
            })
            .collect();
        let depth = nodes.iter().map(|n| n.level + 1).max().unwrap_or(0);
        let edges = graph
            .edges
            .iter()
            .map(|edge| ViewEdge {
                from: edge.from.clone(),
                to: edge.to.clone(),
                label: edge
                    .condition
                    .as_deref()
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string),
                weight: edge.weight,
            })
            .collect();
        Ok(Self { nodes, edges, depth })
    }

    /// Mermaid flowchart, top to bottom. Guarded edges carry their
    /// condition as the label.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("flowchart TD\n");
        for node in &self.nodes {
            let _ = writeln!(
                out,
                "    {}[\"{}<br/><i>{}</i>\"]",
                mermaid_id(&node.id),
                escape(&node.id),
                escape(&node.node_type)
            );
        }
        for edge in &self.edges {
            let from = mermaid_id(&edge.from);
            let to = mermaid_id(&edge.to);
            let _ = match &edge.label {
                Some(label) => writeln!(out, "    {from} -->|\"{}\"| {to}", escape(label)),
                None => writeln!(out, "    {from} --> {to}"),
            };
        }
        out
    }
}

/// Mermaid-safe identifier: alphanumerics and `_` only, prefixed so it
/// never collides with keywords such as `end`.
fn mermaid_id(id: &str) -> String {
    let body: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("n_{body}")
}

fn escape(text: &str) -> String {
    text.replace('"', "#quot;")
        .replace('<', "#lt;")
        .replace('>', "#gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{ExecutionEdge, ExecutionNode};

    fn diamond() -> ExecutionGraph {
        ExecutionGraph::new()
            .with_node(ExecutionNode::new("start", "processor"))
            .with_node(ExecutionNode::new("left", "classifier"))
            .with_node(ExecutionNode::new("right", "retriever"))
            .with_node(ExecutionNode::new("end", "formatter"))
            .with_edge(ExecutionEdge::new("start", "left"))
            .with_edge(ExecutionEdge::new("start", "right"))
            .with_edge(ExecutionEdge::new("left", "end").when("score >= 0.5"))
            .with_edge(ExecutionEdge::new("right", "end"))
    }

    #[test]
    fn levels_follow_longest_path() {
        let view = GraphView::from_graph(&diamond()).unwrap();
        let levels: Vec<(&str, usize)> = view.nodes.iter().map(|n| (n.id.as_str(), n.level)).collect();
        assert_eq!(levels, vec![("start", 0), ("left", 1), ("right", 1), ("end", 2)]);
        assert_eq!(view.depth, 3);
        assert_eq!(view.edges[2].label.as_deref(), Some("score >= 0.5"));
        assert_eq!(view.edges[0].label, None);
    }

    #[test]
    fn mermaid_output() {
        let mermaid = GraphView::from_graph(&diamond()).unwrap().to_mermaid();
        assert!(mermaid.starts_with("flowchart TD\n"));
        assert!(mermaid.contains("    n_start[\"start<br/><i>processor</i>\"]"));
        assert!(mermaid.contains("    n_left -->|\"score #gt;= 0.5\"| n_end"));
        assert!(mermaid.contains("    n_start --> n_right"));
    }

    #[test]
    fn cyclic_graph_has_no_view() {
        let graph = ExecutionGraph::new()
            .with_node(ExecutionNode::new("a", "processor"))
            .with_node(ExecutionNode::new("b", "processor"))
            .with_edge(ExecutionEdge::new("a", "b"))
            .with_edge(ExecutionEdge::new("b", "a"));
        assert!(matches!(GraphView::from_graph(&graph), Err(GraphError::Cyclic { .. })));
    }

    #[test]
    fn ids_are_sanitized() {
        assert_eq!(mermaid_id("step 1.a"), "n_step_1_a");
    }
}
