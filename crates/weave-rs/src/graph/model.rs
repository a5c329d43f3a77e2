//! Graph description: nodes, guarded edges, and parsing from JSON.

use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Node type used when a description omits one.
pub const PASSTHROUGH: &str = "passthrough";

/// One unit of work in a graph. `node_type` selects the processor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub config: Map<String, Value>,
}

impl ExecutionNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            config: Map::new(),
        }
    }

    /// Replace the node configuration. Non-object values are ignored.
    pub fn with_config(mut self, config: Value) -> Self {
        if let Value::Object(map) = config {
            self.config = map;
        }
        self
    }

    /// String value of a configuration key.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(Value::as_str)
    }
}

/// A dependency `from -> to`, optionally gated by a guard condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEdge {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Timeout override for the destination node, in seconds.
    #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,
}

fn default_weight() -> f64 {
    1.0
}

impl ExecutionEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            condition: None,
            weight: default_weight(),
            timeout_secs: None,
        }
    }

    /// Gate the destination node on `condition`.
    pub fn when(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    /// The timeout override, if it is a usable duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }
}

/// Nodes and edges as described by the caller. Not yet checked for
/// cycles; see [`compile`](super::compile::compile).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionGraph {
    pub nodes: Vec<ExecutionNode>,
    #[serde(default)]
    pub edges: Vec<ExecutionEdge>,
}

impl ExecutionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_node(mut self, node: ExecutionNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: ExecutionEdge) -> Self {
        self.edges.push(edge);
        self
    }

    /// A chain of nodes joined by unconditional edges, in the given order.
    pub fn linear(nodes: Vec<ExecutionNode>) -> Self {
        let edges = nodes
            .windows(2)
            .map(|pair| ExecutionEdge::new(pair[0].id.clone(), pair[1].id.clone()))
            .collect();
        Self { nodes, edges }
    }

    pub fn node(&self, id: &str) -> Option<&ExecutionNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Parse a loosely-shaped graph description.
    ///
    /// Nodes are objects with `id`, `type` (or `node_type`) and `config`;
    /// a bare string is a pass-through node with that id. Edges are objects
    /// with `from`/`source`, `to`/`target`, `condition`/`guard`, `weight`
    /// and `timeout` (seconds), or two-element `[from, to]` arrays.
    pub fn from_value(value: &Value) -> Result<Self, GraphError> {
        let obj = value
            .as_object()
            .ok_or_else(|| GraphError::Malformed("graph description must be an object".into()))?;

        let nodes = match obj.get("nodes") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_node(i, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(GraphError::Malformed("'nodes' must be a list".into())),
            None => return Err(GraphError::Malformed("missing 'nodes'".into())),
        };

        let edges = match obj.get("edges") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(i, item)| parse_edge(i, item))
                .collect::<Result<Vec<_>, _>>()?,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err(GraphError::Malformed("'edges' must be a list".into())),
        };

        Ok(Self { nodes, edges })
    }
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn parse_node(index: usize, item: &Value) -> Result<ExecutionNode, GraphError> {
    match item {
        Value::String(id) if !id.trim().is_empty() => Ok(ExecutionNode::new(id.trim(), PASSTHROUGH)),
        Value::Object(obj) => {
            let id = first_str(obj, &["id", "name"])
                .ok_or_else(|| GraphError::Malformed(format!("node {index} has no id")))?;
            let node_type = first_str(obj, &["type", "node_type", "nodeType"]).unwrap_or(PASSTHROUGH);
            let config = match obj.get("config") {
                Some(Value::Object(map)) => map.clone(),
                Some(Value::Null) | None => Map::new(),
                Some(_) => {
                    return Err(GraphError::Malformed(format!(
                        "config of node '{id}' must be an object"
                    )));
                }
            };
            Ok(ExecutionNode {
                id: id.to_string(),
                node_type: node_type.to_lowercase(),
                config,
            })
        }
        other => Err(GraphError::Malformed(format!("node {index} is not an object: {other}"))),
    }
}

fn parse_edge(index: usize, item: &Value) -> Result<ExecutionEdge, GraphError> {
    if let Some([from, to]) = item.as_array().map(Vec::as_slice)
        && let (Some(from), Some(to)) = (from.as_str(), to.as_str())
    {
        return Ok(ExecutionEdge::new(from, to));
    }

    let obj = item
        .as_object()
        .ok_or_else(|| GraphError::Malformed(format!("edge {index} is not an object")))?;
    let from = first_str(obj, &["from", "source"])
        .ok_or_else(|| GraphError::Malformed(format!("edge {index} has no source")))?;
    let to = first_str(obj, &["to", "target"])
        .ok_or_else(|| GraphError::Malformed(format!("edge {index} has no target")))?;

    let mut edge = ExecutionEdge::new(from, to);
    edge.condition = first_str(obj, &["condition", "guard"]).map(str::to_string);
    if let Some(weight) = obj.get("weight").and_then(number) {
        edge.weight = weight;
    }
    if let Some(raw) = obj.get("timeout").filter(|v| !v.is_null()) {
        match number(raw) {
            Some(secs) if secs > 0.0 && secs.is_finite() => edge.timeout_secs = Some(secs),
            _ => {
                return Err(GraphError::Malformed(format!(
                    "edge {from} -> {to} has invalid timeout {raw}"
                )));
            }
        }
    }
    Ok(edge)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_aliases_and_defaults() {
        let graph = ExecutionGraph::from_value(&json!({
            "nodes": [
                {"id": "a", "type": "Processor", "config": {"set": {"x": 1}}},
                {"id": "b", "node_type": "classifier"},
                {"id": "c"},
                "d"
            ],
            "edges": [
                {"from": "a", "to": "b"},
                {"source": "b", "target": "c", "guard": "score >= 0.9", "weight": 2, "timeout": "5"},
                ["c", "d"]
            ]
        }))
        .unwrap();

        assert_eq!(graph.nodes.len(), 4);
        assert_eq!(graph.nodes[0].node_type, "processor");
        assert_eq!(graph.nodes[0].config["set"]["x"], 1);
        assert_eq!(graph.nodes[1].node_type, "classifier");
        assert_eq!(graph.nodes[2].node_type, PASSTHROUGH);
        assert_eq!(graph.nodes[3].id, "d");

        assert_eq!(graph.edges[0].weight, 1.0);
        assert_eq!(graph.edges[0].condition, None);
        assert_eq!(graph.edges[1].condition.as_deref(), Some("score >= 0.9"));
        assert_eq!(graph.edges[1].weight, 2.0);
        assert_eq!(graph.edges[1].timeout(), Some(Duration::from_secs(5)));
        assert_eq!(graph.edges[2], ExecutionEdge::new("c", "d"));
    }

    #[test]
    fn rejects_malformed_descriptions() {
        for bad in [
            json!([]),
            json!({}),
            json!({"nodes": "a"}),
            json!({"nodes": [{"type": "processor"}]}),
            json!({"nodes": ["a"], "edges": [{"from": "a"}]}),
            json!({"nodes": ["a", "b"], "edges": [{"from": "a", "to": "b", "timeout": -1}]}),
            json!({"nodes": [{"id": "a", "config": 3}]}),
        ] {
            assert!(
                matches!(ExecutionGraph::from_value(&bad), Err(GraphError::Malformed(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn serializes_back_to_description() {
        let graph = ExecutionGraph::new()
            .with_node(ExecutionNode::new("a", "processor"))
            .with_node(ExecutionNode::new("b", "formatter").with_config(json!({"format": "text"})))
            .with_edge(ExecutionEdge::new("a", "b").when("ok").with_timeout(Duration::from_secs(2)));

        let value = graph.to_value();
        assert_eq!(value["nodes"][0]["type"], "processor");
        assert_eq!(value["edges"][0]["timeout"], 2.0);
        assert_eq!(ExecutionGraph::from_value(&value).unwrap(), graph);
    }

    #[test]
    fn linear_chains_nodes() {
        let graph = ExecutionGraph::linear(vec![
            ExecutionNode::new("a", PASSTHROUGH),
            ExecutionNode::new("b", PASSTHROUGH),
            ExecutionNode::new("c", PASSTHROUGH),
        ]);
        assert_eq!(graph.edges, vec![ExecutionEdge::new("a", "b"), ExecutionEdge::new("b", "c")]);
    }
}
