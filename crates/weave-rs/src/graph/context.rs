//! Request-scoped execution state: identity, status, and the trace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Lifecycle of one run: `Pending -> Running -> {Completed | Failed |
/// Timeout | Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single node execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Completed,
    Failed,
}

/// One executed node. Skipped nodes produce no entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub node_id: String,
    pub node_type: String,
    pub input_preview: String,
    pub output_preview: String,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Compact JSON of `value`, cut to `max_chars` characters with a `...`
/// marker.
pub fn preview(value: &Value, max_chars: usize) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= max_chars {
        return text;
    }
    let mut cut: String = text.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}

// ── Request context ────────────────────────────────────────────────

/// Caller-supplied identity and controls for one request.
///
/// The cancellation token and deadline are checked between nodes only; a
/// node that has started always runs to completion or to its own timeout.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub caller_id: Option<String>,
    pub session_id: Option<String>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestContext {
    /// A context with a fresh UUID v7 request id, no deadline, and a new
    /// cancellation token.
    pub fn new() -> Self {
        Self {
            request_id: uuid::Uuid::now_v7().to_string(),
            caller_id: None,
            session_id: None,
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = id.into();
        self
    }

    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller_id = Some(caller.into());
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session_id = Some(session.into());
        self
    }

    /// Share cancellation with an existing token (e.g. a child of the
    /// server's shutdown token).
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Deadline `timeout` from now. An earlier existing deadline is kept,
    /// and a timeout too large to represent leaves the deadline unchanged.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        let Some(candidate) = Instant::now().checked_add(timeout) else {
            warn!(request_id = %self.request_id, ?timeout, "Timeout out of range, deadline unchanged");
            return self;
        };
        match self.deadline {
            Some(existing) if existing <= candidate => self,
            _ => self.with_deadline(candidate),
        }
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn deadline_passed(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

// ── Execution context ──────────────────────────────────────────────

/// Mutable state of one run: status, timing, and the accumulated trace.
#[derive(Debug)]
pub struct ExecutionContext {
    request: RequestContext,
    status: RunStatus,
    started_at: DateTime<Utc>,
    started: Instant,
    trace: Vec<TraceEntry>,
}

impl ExecutionContext {
    pub fn new(request: RequestContext) -> Self {
        Self {
            request,
            status: RunStatus::Pending,
            started_at: Utc::now(),
            started: Instant::now(),
            trace: Vec::new(),
        }
    }

    pub fn request(&self) -> &RequestContext {
        &self.request
    }

    pub fn request_id(&self) -> &str {
        &self.request.request_id
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// `Pending -> Running`. Returns false (and changes nothing) from any
    /// other state.
    pub fn start(&mut self) -> bool {
        self.transition(RunStatus::Running)
    }

    /// Move to a terminal status. Returns false if the run already ended.
    pub fn finish(&mut self, status: RunStatus) -> bool {
        self.transition(status)
    }

    fn transition(&mut self, next: RunStatus) -> bool {
        let allowed = match (self.status, next) {
            (RunStatus::Pending, RunStatus::Running) => true,
            (RunStatus::Pending | RunStatus::Running, next) => next.is_terminal(),
            _ => false,
        };
        if allowed {
            debug!(request_id = %self.request.request_id, from = %self.status, to = %next, "Run status");
            self.status = next;
        } else {
            warn!(
                request_id = %self.request.request_id,
                from = %self.status,
                to = %next,
                "Ignoring invalid run status transition"
            );
        }
        allowed
    }

    pub fn record(&mut self, entry: TraceEntry) {
        self.trace.push(entry);
    }
}
