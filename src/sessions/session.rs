//! Session records and read-only views.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::checkpoints::ProgressSummary;
use crate::engine::{Connection, TraceStatus};
use crate::export::ExportPaths;
use crate::types::{Address, BlockRange};

/// What a caller asks for when starting a trace.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceRequest {
    /// Suspected origins (set A).
    pub origins: Vec<Address>,
    /// Suspected destinations (set B).
    pub destinations: Vec<Address>,
    pub max_depth: u32,
    /// Block range as requested; may be narrowed by the probe.
    pub range: BlockRange,
}

/// Lifecycle state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Task is (or is about to be) tracing.
    Running,
    /// Traversal finished, results available.
    Completed,
    /// Stopped cooperatively; a cancel checkpoint exists.
    Cancelled,
    /// Died on an internal error; accumulated state is preserved.
    Failed,
    /// Created from a checkpoint, task not yet running.
    Resumed,
}

impl SessionStatus {
    /// True while the session's task may still mutate trace state.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, SessionStatus::Running | SessionStatus::Resumed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Running => write!(f, "running"),
            SessionStatus::Completed => write!(f, "completed"),
            SessionStatus::Cancelled => write!(f, "cancelled"),
            SessionStatus::Failed => write!(f, "failed"),
            SessionStatus::Resumed => write!(f, "resumed"),
        }
    }
}

/// Mutable session metadata. The trace state itself lives in
/// [`crate::engine::SharedTraceState`]; this record carries everything
/// around it.
#[derive(Clone, Debug, Serialize)]
pub struct SessionRecord {
    pub session_id: String,
    /// Root of the trace chain; export files are keyed by this. Equals
    /// `session_id` for fresh sessions.
    pub export_root: String,
    pub status: SessionStatus,
    pub request: TraceRequest,
    /// Request range narrowed by the block-range probe.
    pub effective_range: BlockRange,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_checkpoint_time: Option<DateTime<Utc>>,
    /// Most recent checkpoint of this session, if any.
    pub checkpoint_id: Option<String>,
    /// Session this one was resumed from.
    pub resumed_from: Option<String>,
    pub exports: Option<ExportPaths>,
    pub error: Option<String>,
}

impl SessionRecord {
    #[must_use]
    pub fn fresh(session_id: String, request: TraceRequest) -> Self {
        Self {
            export_root: session_id.clone(),
            session_id,
            status: SessionStatus::Running,
            effective_range: request.range,
            request,
            started_at: Utc::now(),
            completed_at: None,
            last_checkpoint_time: None,
            checkpoint_id: None,
            resumed_from: None,
            exports: None,
            error: None,
        }
    }
}

/// Snapshot of a session returned by status/list operations — the
/// record plus headline traversal numbers, minus anything live (task
/// handles, locks).
#[derive(Clone, Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub record: SessionRecord,
    pub trace_status: TraceStatus,
    pub search_depth: u32,
    pub progress: ProgressSummary,
}

/// Final results of a completed session.
#[derive(Clone, Debug, Serialize)]
pub struct TraceResults {
    pub session_id: String,
    pub status: TraceStatus,
    pub connections_found: Vec<Connection>,
    pub search_depth: u32,
    pub addresses_examined: usize,
    pub effective_range: BlockRange,
    pub exports: Option<ExportPaths>,
}

/// Shorthand used when validating requests.
pub(crate) fn has_blank_address(addresses: &[Address]) -> bool {
    addresses.iter().any(Address::is_empty)
}
