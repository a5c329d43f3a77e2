//! Command-line front end for the orchestrator.
//!
//! Logs go to stderr (filter with `RUST_LOG`); results go to stdout as
//! JSON. Any file argument may be `-` to read from stdin.
//!
//! # Examples
//!
//! ```sh
//! # Run an agent configuration, payload defaults to the task text
//! weave run --config agent.json
//!
//! # Explicit payload, one JSON line per finished node
//! weave run --config agent.json --payload '{"input": "rust ownership"}' --stream
//!
//! # Show the canonical form of a messy configuration
//! weave normalize --config legacy.json
//!
//! # Registry queries
//! weave tools --category search
//! weave search chunk
//! weave recommend "search the web and analyze the results" --max 2
//!
//! # Inspect a graph
//! weave graph --file graph.json --mermaid
//! ```

use clap::{Parser, Subcommand};
use futures::StreamExt;
use serde::Serialize;
use serde_json::{Value, json};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};
use weave_rs::config::OrchestratorConfig;
use weave_rs::graph::{ExecutionGraph, GraphEvent, GraphView, RequestContext};
use weave_rs::matching::{RecommendContext, optimize_chain};
use weave_rs::orchestrator::Orchestrator;
use weave_rs::spec::{normalize, validate_with};
use weave_rs::tools::ToolCategory;

/// Normalize agent configurations, match tools, and run execution graphs.
#[derive(Parser)]
#[command(name = "weave", version)]
struct Cli {
    /// Orchestrator settings file (JSON). Defaults apply when absent.
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Reject configurations that fail validation instead of warning
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Plan and execute an agent configuration
    Run {
        /// Agent configuration file
        #[arg(long)]
        config: PathBuf,

        /// Payload as inline JSON, or `@path` to read it from a file
        #[arg(long)]
        payload: Option<String>,

        /// Print one JSON line per node event instead of the final result
        #[arg(long)]
        stream: bool,

        /// Overall request deadline in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Request id to use instead of a generated one
        #[arg(long)]
        request_id: Option<String>,
    },

    /// Print the canonical specification and any validation problems
    Normalize {
        /// Agent configuration file
        #[arg(long)]
        config: PathBuf,
    },

    /// List registered tools
    Tools {
        /// Only tools in this category (e.g. `search`, `file_management`)
        #[arg(long)]
        category: Option<String>,
    },

    /// Search tools by id, name, description or capability
    Search { query: String },

    /// Recommend tools for a free-text task
    Recommend {
        task: String,

        /// Drop manager tools
        #[arg(long)]
        simple: bool,

        /// Prefer fast categories first
        #[arg(long)]
        fast: bool,

        /// Keep at most this many tools
        #[arg(long)]
        max: Option<usize>,
    },

    /// Registry counts and instance cache statistics
    Stats,

    /// Compile a graph description and print its levels
    Graph {
        /// Graph description file
        #[arg(long)]
        file: PathBuf,

        /// Print a Mermaid flowchart instead of JSON
        #[arg(long)]
        mermaid: bool,
    },
}

// ── Input helpers ──────────────────────────────────────────────────

fn read_text(path: &Path) -> Result<String, String> {
    if path.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| format!("failed to read stdin: {e}"))?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {e}", path.display()))
}

fn read_json(path: &Path) -> Result<Value, String> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| format!("invalid JSON in {}: {e}", path.display()))
}

fn parse_payload(raw: Option<&str>) -> Result<Value, String> {
    match raw {
        None => Ok(Value::Null),
        Some(arg) => match arg.strip_prefix('@') {
            Some(path) => read_json(Path::new(path)),
            None => serde_json::from_str(arg).or_else(|_| Ok(Value::String(arg.to_string()))),
        },
    }
}

fn load_settings(cli: &Cli) -> Result<OrchestratorConfig, String> {
    let config = match &cli.settings {
        Some(path) => OrchestratorConfig::from_file(path).map_err(|e| e.to_string())?,
        None => OrchestratorConfig::default(),
    };
    Ok(if cli.strict {
        config.with_strict_validation(true)
    } else {
        config
    })
}

fn print_json(value: &impl Serialize) -> Result<(), String> {
    let text =
        serde_json::to_string_pretty(value).map_err(|e| format!("failed to render JSON: {e}"))?;
    println!("{text}");
    Ok(())
}

// ── Commands ───────────────────────────────────────────────────────

/// Returns whether the run succeeded.
async fn run(
    orchestrator: &Orchestrator,
    config: &Path,
    payload: Option<&str>,
    stream: bool,
    timeout: Option<u64>,
    request_id: Option<&str>,
) -> Result<bool, String> {
    let raw = read_json(config)?;
    let payload = parse_payload(payload)?;

    let mut request = RequestContext::new().with_caller("cli");
    if let Some(id) = request_id {
        request = request.with_request_id(id);
    }
    if let Some(secs) = timeout {
        request = request.with_timeout(Duration::from_secs(secs));
    }

    let token = request.cancellation_token().clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("  Interrupt received, cancelling after the current node");
            token.cancel();
        }
    });

    if !stream {
        let result = orchestrator.run(&raw, payload, request).await;
        print_json(&result)?;
        return Ok(result.success);
    }

    let mut events = orchestrator.run_stream(&raw, payload, request);
    let mut success = false;
    while let Some(event) = events.next().await {
        if let GraphEvent::Finished(result) = &event {
            success = result.success;
        }
        let line =
            serde_json::to_string(&event).map_err(|e| format!("failed to render event: {e}"))?;
        println!("{line}");
    }
    Ok(success)
}

fn show_normalized(orchestrator: &Orchestrator, config: &Path) -> Result<(), String> {
    let raw = read_json(config)?;
    let spec = normalize(&raw);
    let violations = validate_with(&spec, &orchestrator.config().limits);
    for violation in &violations {
        eprintln!("  Warning: {violation}");
    }
    print_json(&json!({"specification": spec.to_value(), "violations": violations}))
}

fn list_tools(orchestrator: &Orchestrator, category: Option<&str>) -> Result<(), String> {
    let category = match category {
        Some(raw) => {
            Some(ToolCategory::parse(raw).ok_or_else(|| format!("unknown category '{raw}'"))?)
        }
        None => None,
    };
    print_json(&orchestrator.registry().list(category))
}

fn recommend(
    orchestrator: &Orchestrator,
    task: &str,
    simple: bool,
    fast: bool,
    max: Option<usize>,
) -> Result<(), String> {
    let mut context = RecommendContext::default();
    if simple {
        context = context.simple();
    }
    if fast {
        context = context.fast();
    }
    if let Some(max) = max {
        context = context.with_max_tools(max);
    }
    let registry = orchestrator.registry();
    let tools = orchestrator.matcher().recommend_tools(task, registry, &context);
    let chain = optimize_chain(&tools, registry);
    print_json(&json!({"recommended": tools, "chain": chain}))
}

fn show_graph(file: &Path, mermaid: bool) -> Result<(), String> {
    let description = read_json(file)?;
    let graph = ExecutionGraph::from_value(&description).map_err(|e| e.to_string())?;
    let view = GraphView::from_graph(&graph).map_err(|e| e.to_string())?;
    if mermaid {
        print!("{}", view.to_mermaid());
        Ok(())
    } else {
        print_json(&view)
    }
}

async fn dispatch(cli: &Cli) -> Result<bool, String> {
    let orchestrator = Orchestrator::new(load_settings(cli)?);
    match &cli.command {
        Command::Run {
            config,
            payload,
            stream,
            timeout,
            request_id,
        } => {
            return run(
                &orchestrator,
                config,
                payload.as_deref(),
                *stream,
                *timeout,
                request_id.as_deref(),
            )
            .await;
        }
        Command::Normalize { config } => show_normalized(&orchestrator, config)?,
        Command::Tools { category } => list_tools(&orchestrator, category.as_deref())?,
        Command::Search { query } => print_json(&orchestrator.registry().search(query))?,
        Command::Recommend {
            task,
            simple,
            fast,
            max,
        } => recommend(&orchestrator, task, *simple, *fast, *max)?,
        Command::Stats => print_json(&orchestrator.registry().stats())?,
        Command::Graph { file, mermaid } => show_graph(file, *mermaid)?,
    }
    Ok(true)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match dispatch(&cli).await {
        Ok(true) => {}
        Ok(false) => process::exit(2),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
