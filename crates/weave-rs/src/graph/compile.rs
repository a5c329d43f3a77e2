//! Graph compilation: validation plus a topological schedule.
//!
//! Everything that can make a graph unrunnable (duplicate ids, dangling
//! edges, unparseable guards, cycles) is rejected here, so a graph either
//! compiles or runs zero nodes.

use super::condition::Guard;
use super::model::{ExecutionEdge, ExecutionGraph, ExecutionNode};
use crate::error::GraphError;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::debug;

/// A validated graph with its execution order.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    graph: ExecutionGraph,
    /// Node indices in execution order.
    order: Vec<usize>,
    /// Longest distance from a root, per node index.
    levels: Vec<usize>,
    /// Incoming edge indices, per node index.
    incoming: Vec<Vec<usize>>,
    /// Parsed guard, per edge index.
    guards: Vec<Option<Guard>>,
}

/// Validate `graph` and order its nodes with Kahn's algorithm.
///
/// Roots are seeded and released in declaration order, so the same
/// description always compiles to the same order. If fewer nodes come out
/// than went in, the remainder sits on a cycle and compilation fails.
pub fn compile(graph: &ExecutionGraph) -> Result<CompiledGraph, GraphError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(graph.nodes.len());
    for (i, node) in graph.nodes.iter().enumerate() {
        if index.insert(node.id.as_str(), i).is_some() {
            return Err(GraphError::DuplicateNode(node.id.clone()));
        }
    }

    let total = graph.nodes.len();
    let mut in_degree = vec![0usize; total];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); total];
    let mut incoming: Vec<Vec<usize>> = vec![Vec::new(); total];
    let mut guards = Vec::with_capacity(graph.edges.len());

    for (e, edge) in graph.edges.iter().enumerate() {
        let endpoint = |id: &str| {
            index
                .get(id)
                .copied()
                .ok_or_else(|| GraphError::UnknownEdgeEndpoint {
                    from: edge.from.clone(),
                    to: edge.to.clone(),
                    missing: id.to_string(),
                })
        };
        let from = endpoint(&edge.from)?;
        let to = endpoint(&edge.to)?;

        let guard = match edge.condition.as_deref().map(str::trim) {
            Some(condition) if !condition.is_empty() => Some(Guard::parse(condition).map_err(
                |reason| GraphError::InvalidCondition {
                    condition: condition.to_string(),
                    reason,
                },
            )?),
            _ => None,
        };
        guards.push(guard);

        in_degree[to] += 1;
        dependents[from].push(to);
        incoming[to].push(e);
    }

    // Kahn's algorithm. Seed with roots in declaration order.
    let mut queue: VecDeque<usize> = (0..total).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(total);
    let mut levels = vec![0usize; total];

    while let Some(current) = queue.pop_front() {
        order.push(current);
        for &next in &dependents[current] {
            levels[next] = levels[next].max(levels[current] + 1);
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < total {
        let unresolved = (0..total)
            .filter(|&i| in_degree[i] > 0)
            .map(|i| graph.nodes[i].id.clone())
            .collect();
        return Err(GraphError::Cyclic { unresolved, total });
    }

    debug!(
        nodes = total,
        edges = graph.edges.len(),
        order = ?order.iter().map(|&i| graph.nodes[i].id.as_str()).collect::<Vec<_>>(),
        "Compiled graph"
    );

    Ok(CompiledGraph {
        graph: graph.clone(),
        order,
        levels,
        incoming,
        guards,
    })
}

impl CompiledGraph {
    pub fn graph(&self) -> &ExecutionGraph {
        &self.graph
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Node indices in execution order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Node ids in execution order.
    pub fn order_ids(&self) -> Vec<String> {
        self.order
            .iter()
            .map(|&i| self.graph.nodes[i].id.clone())
            .collect()
    }

    pub fn node(&self, index: usize) -> &ExecutionNode {
        &self.graph.nodes[index]
    }

    /// Longest path length from any root to the node.
    pub fn level(&self, index: usize) -> usize {
        self.levels[index]
    }

    /// Incoming edges of a node together with their parsed guards.
    pub fn incoming(&self, index: usize) -> impl Iterator<Item = (&ExecutionEdge, Option<&Guard>)> {
        self.incoming[index]
            .iter()
            .map(|&e| (&self.graph.edges[e], self.guards[e].as_ref()))
    }

    /// First incoming guard that rejects `payload`, if any. Nodes without
    /// incoming edges always pass.
    pub fn blocking_guard(&self, index: usize, payload: &serde_json::Value) -> Option<&Guard> {
        self.incoming(index)
            .filter_map(|(_, guard)| guard)
            .find(|guard| !guard.evaluate(payload))
    }

    /// The smallest timeout override among incoming edges, else `default`.
    pub fn node_timeout(&self, index: usize, default: Duration) -> Duration {
        self.incoming(index)
            .filter_map(|(edge, _)| edge.timeout())
            .min()
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::model::{ExecutionEdge, ExecutionNode, PASSTHROUGH};
    use serde_json::json;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> ExecutionGraph {
        ExecutionGraph {
            nodes: nodes.iter().map(|id| ExecutionNode::new(*id, PASSTHROUGH)).collect(),
            edges: edges.iter().map(|(a, b)| ExecutionEdge::new(*a, *b)).collect(),
        }
    }

    fn position(order: &[String], id: &str) -> usize {
        order.iter().position(|n| n == id).unwrap()
    }

    #[test]
    fn no_edges_keeps_declaration_order() {
        let compiled = compile(&graph(&["c", "a", "b"], &[])).unwrap();
        assert_eq!(compiled.order_ids(), vec!["c", "a", "b"]);
        assert!((0..3).all(|i| compiled.level(i) == 0));
    }

    #[test]
    fn every_edge_points_forward() {
        let edges = [
            ("a", "b"),
            ("a", "c"),
            ("b", "d"),
            ("c", "d"),
            ("e", "c"),
            ("d", "f"),
        ];
        let compiled = compile(&graph(&["f", "d", "c", "b", "a", "e"], &edges)).unwrap();
        let order = compiled.order_ids();
        assert_eq!(order.len(), 6);
        for (from, to) in edges {
            assert!(position(&order, from) < position(&order, to), "{from} -> {to}");
        }
        let d = compiled.graph().nodes.iter().position(|n| n.id == "d").unwrap();
        assert_eq!(compiled.level(d), 2);
    }

    #[test]
    fn two_node_cycle_is_rejected() {
        let err = compile(&graph(&["A", "B"], &[("A", "B"), ("B", "A")])).unwrap_err();
        assert_eq!(err, GraphError::Cyclic {
            unresolved: vec!["A".into(), "B".into()],
            total: 2,
        });
    }

    #[test]
    fn cycle_reports_only_stuck_nodes() {
        let err = compile(&graph(&["root", "x", "y", "z"], &[
            ("root", "x"),
            ("x", "y"),
            ("y", "x"),
            ("y", "z"),
        ]))
        .unwrap_err();
        match err {
            GraphError::Cyclic { unresolved, total } => {
                assert_eq!(unresolved, vec!["x", "y", "z"]);
                assert_eq!(total, 4);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_loop_is_a_cycle() {
        assert!(matches!(
            compile(&graph(&["a"], &[("a", "a")])),
            Err(GraphError::Cyclic { .. })
        ));
    }

    #[test]
    fn structural_errors() {
        assert_eq!(
            compile(&graph(&["a", "a"], &[])).unwrap_err(),
            GraphError::DuplicateNode("a".into())
        );
        assert_eq!(
            compile(&graph(&["a"], &[("a", "ghost")])).unwrap_err(),
            GraphError::UnknownEdgeEndpoint {
                from: "a".into(),
                to: "ghost".into(),
                missing: "ghost".into(),
            }
        );

        let mut bad_guard = graph(&["a", "b"], &[("a", "b")]);
        bad_guard.edges[0].condition = Some("score >=".into());
        assert!(matches!(
            compile(&bad_guard).unwrap_err(),
            GraphError::InvalidCondition { .. }
        ));
    }

    #[test]
    fn guards_and_timeouts_resolve_per_node() {
        let g = ExecutionGraph::new()
            .with_node(ExecutionNode::new("a", PASSTHROUGH))
            .with_node(ExecutionNode::new("b", PASSTHROUGH))
            .with_node(ExecutionNode::new("c", PASSTHROUGH))
            .with_edge(ExecutionEdge::new("a", "c").with_timeout(Duration::from_secs(5)))
            .with_edge(
                ExecutionEdge::new("b", "c")
                    .when("score >= 0.9")
                    .with_timeout(Duration::from_secs(2)),
            )
            .with_edge(ExecutionEdge::new("a", "b").when("  "));
        let compiled = compile(&g).unwrap();
        let default = Duration::from_secs(30);

        assert_eq!(compiled.node_timeout(2, default), Duration::from_secs(2));
        assert_eq!(compiled.node_timeout(0, default), default);

        assert!(compiled.blocking_guard(0, &json!({})).is_none());
        assert!(compiled.blocking_guard(1, &json!({})).is_none());
        assert!(compiled.blocking_guard(2, &json!({"score": 0.95})).is_none());
        let blocked = compiled.blocking_guard(2, &json!({"score": 0.5})).unwrap();
        assert_eq!(blocked.to_string(), "score >= 0.9");
    }

    #[test]
    fn empty_graph_compiles() {
        let compiled = compile(&ExecutionGraph::new()).unwrap();
        assert!(compiled.is_empty());
    }
}
