//! End-to-end tests for the orchestrator.
//!
//! Each test drives the public API only: raw JSON configuration in,
//! `OrchestrationResult` or `GraphEvent` stream out.

use futures::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use weave_rs::config::OrchestratorConfig;
use weave_rs::error::ErrorKind;
use weave_rs::graph::{FnProcessor, GraphEvent, RequestContext, RunStatus};
use weave_rs::matching::ToolMatcher;
use weave_rs::orchestrator::{GraphSource, Orchestrator};
use weave_rs::spec::normalize;
use weave_rs::tools::names::{REASONING_MANAGER, SEARCH_TOOL};
use weave_rs::tools::{FnTool, Tool, ToolDescriptor, ToolRegistration, ToolRegistry};

fn orchestrator() -> Orchestrator {
    Orchestrator::new(OrchestratorConfig::default())
}

/// `A -> B -> C` where B sets `score` and the edge into C is guarded.
fn guarded_config(score: f64) -> Value {
    json!({
        "name": "Gatekeeper",
        "execution_graph": {
            "nodes": [
                {"id": "A", "type": "processor"},
                {"id": "B", "type": "transformer", "config": {"set": {"score": score}}},
                {"id": "C", "type": "formatter"}
            ],
            "edges": [
                {"from": "A", "to": "B"},
                {"from": "B", "to": "C", "condition": "score ≥ 0.9"}
            ]
        }
    })
}

// ── Guarded edges ────────────────────────────────────────────────────

#[tokio::test]
async fn guard_passes_and_all_nodes_run() {
    let result = orchestrator()
        .run(&guarded_config(0.95), json!({"input": "hi"}), RequestContext::new())
        .await;

    assert!(result.success);
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.traced_nodes(), vec!["A", "B", "C"]);
    assert!(result.metadata_list("skipped_nodes").is_empty());
    assert_eq!(result.metadata["graph_source"], "embedded");
    assert!(result.result.as_str().is_some());
}

#[tokio::test]
async fn guard_blocks_and_run_still_completes() {
    let result = orchestrator()
        .run(&guarded_config(0.5), json!({"input": "hi"}), RequestContext::new())
        .await;

    assert!(result.success);
    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.trace.len(), 2);
    assert_eq!(result.metadata_list("skipped_nodes"), vec!["C"]);
    // Without the formatter the final payload itself is the result.
    assert_eq!(result.result["score"], 0.5);
    assert_eq!(result.result["processed"], true);
}

// ── Matching ─────────────────────────────────────────────────────────

#[test]
fn single_requirement_selects_exactly_one_tool() {
    let registry = ToolRegistry::builtin();
    let available: Vec<ToolDescriptor> = registry
        .list(None)
        .into_iter()
        .filter(|d| d.id == SEARCH_TOOL || d.id == REASONING_MANAGER)
        .collect();
    assert_eq!(available.len(), 2);

    let matcher = ToolMatcher::default();
    let first = matcher.match_tools(&["search"], &available);
    assert_eq!(first.len(), 1);
    for _ in 0..5 {
        assert_eq!(matcher.match_tools(&["search"], &available), first);
    }
}

// ── Normalization ────────────────────────────────────────────────────

#[test]
fn disabled_tool_entries_are_dropped() {
    let spec = normalize(&json!({
        "agentName": "X",
        "tool_list": [{"id": "t1", "enabled": true}, {"id": "t2", "enabled": false}]
    }));
    assert_eq!(spec.name, "X");
    assert_eq!(spec.tools, vec!["t1"]);
}

// ── Graph rejection ──────────────────────────────────────────────────

#[tokio::test]
async fn cyclic_graph_runs_nothing() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let orchestrator = orchestrator().with_processor(
        "counting",
        FnProcessor::new(move |payload: Value| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(payload)
            }
        }),
    );

    let raw = json!({
        "name": "Loop",
        "execution_graph": {
            "nodes": [{"id": "A", "type": "counting"}, {"id": "B", "type": "counting"}],
            "edges": [["A", "B"], ["B", "A"]]
        }
    });
    let result = orchestrator.run(&raw, json!({}), RequestContext::new()).await;

    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::CyclicGraph));
    assert!(result.trace.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn dangling_edge_is_invalid_graph() {
    let raw = json!({
        "execution_graph": {
            "nodes": ["A"],
            "edges": [{"from": "A", "to": "ghost"}]
        }
    });
    let result = orchestrator().run(&raw, json!({}), RequestContext::new()).await;
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidGraph));
    assert!(result.error.unwrap_or_default().contains("ghost"));
}

// ── Request controls ─────────────────────────────────────────────────

#[tokio::test]
async fn cancelled_request_stops_before_first_node() {
    let request = RequestContext::new().with_request_id("req-cancel");
    request.cancel();

    let result = orchestrator().run(&guarded_config(0.95), json!({}), request).await;

    assert_eq!(result.request_id, "req-cancel");
    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    assert!(result.trace.is_empty());
}

#[tokio::test]
async fn stream_reports_each_node_then_the_annotated_result() {
    let orchestrator = orchestrator();
    let events: Vec<GraphEvent> = orchestrator
        .run_stream(&guarded_config(0.95), json!({"input": "hi"}), RequestContext::new())
        .collect()
        .await;

    assert_eq!(events.len(), 4);
    assert!(events.iter().take(3).all(|e| matches!(e, GraphEvent::NodeCompleted(_))));
    let result = events.into_iter().last().and_then(GraphEvent::into_result).unwrap();
    assert!(result.success);
    assert_eq!(result.metadata["agent"], "Gatekeeper");
    assert_eq!(result.trace.len(), 3);
}

#[tokio::test]
async fn rejected_configuration_streams_a_single_result() {
    let raw = json!({"execution_graph": {"nodes": {"not": "a list"}}});
    let events: Vec<GraphEvent> = orchestrator()
        .run_stream(&raw, json!({}), RequestContext::new())
        .collect()
        .await;

    assert_eq!(events.len(), 1);
    assert!(events[0].is_finished());
}

// ── Registry sharing ─────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_runs_share_one_instance() {
    let constructed = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&constructed);
    let registry = Arc::new(ToolRegistry::new());
    registry.register(ToolRegistration::new(
        ToolDescriptor::builder("stamp").name("Stamp").build(),
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(20));
            let tool = FnTool::new(|mut input: Value| async move {
                input["stamped"] = json!(true);
                Ok(input)
            });
            Ok(Arc::new(tool) as Arc<dyn Tool>)
        },
    ));

    let orchestrator = Arc::new(Orchestrator::with_registry(
        OrchestratorConfig::default(),
        Arc::clone(&registry),
    ));
    let raw = json!({"name": "Stamper", "tools": ["stamp"]});

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let orchestrator = Arc::clone(&orchestrator);
            let raw = raw.clone();
            tokio::spawn(async move {
                orchestrator
                    .run(&raw, json!({"input": i}), RequestContext::new())
                    .await
            })
        })
        .collect();

    for handle in handles {
        let result = handle.await.unwrap();
        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.metadata["graph_source"], json!(GraphSource::ToolChain));
    }
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    let stats = registry.stats();
    assert_eq!(stats.cached_instances, 1);
    assert_eq!(stats.total_instance_uses, 8);
}

// ── Settings ─────────────────────────────────────────────────────────

#[tokio::test]
async fn strict_settings_from_file_reject_invalid_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"strict_validation": true, "limits": {"max_tools": 1}}"#,
    )
    .unwrap();

    let settings = OrchestratorConfig::load_or_default(&path).unwrap();
    assert!(settings.strict_validation);
    assert_eq!(settings.limits.max_tools, 1);
    assert_eq!(settings.node_timeout_secs, 30);

    let raw = json!({"name": "Greedy", "tools": ["search-tool", "knowledge-base"]});
    let result = Orchestrator::new(settings)
        .run(&raw, json!({}), RequestContext::new())
        .await;
    assert!(!result.success);
    assert_eq!(result.error_kind, Some(ErrorKind::InvalidConfiguration));
    assert_eq!(result.metadata_list("violations").len(), 1);

    let missing = OrchestratorConfig::load_or_default(&dir.path().join("absent.json")).unwrap();
    assert_eq!(missing, OrchestratorConfig::default());
}
