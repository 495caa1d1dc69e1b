/*!
Persistence shapes for checkpoint records.

Explicit serde structs decoupled from the in-memory types, so the store
code stays lean and the on-disk schema can evolve independently.
Checkpoints are encoded as self-describing MessagePack maps
(`rmp_serde::to_vec_named`); decoding probes `schema_version` first and
runs the upgrade chain old→current. A mismatched shape is never silently
reinterpreted — unknown versions are a typed error.

Version history:
* **1** — visited maps stored as bare address lists (no paths), no
  `export_root`. Upgraded by synthesizing single-element paths.
* **2** — current: visited maps carry full seed→address paths, the
  export root travels with the record so resumed sessions append to the
  same export files.

This module performs no I/O.
*/

use chrono::Utc;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{Connection, PendingVisit, TraceState, TraceStatus};
use crate::sessions::TraceRequest;
use crate::types::{Address, BlockRange};

pub const SCHEMA_VERSION: u32 = 2;

/// Why a checkpoint was taken.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointReason {
    Periodic,
    Manual,
    Cancel,
}

impl std::fmt::Display for CheckpointReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckpointReason::Periodic => write!(f, "periodic"),
            CheckpointReason::Manual => write!(f, "manual"),
            CheckpointReason::Cancel => write!(f, "cancel"),
        }
    }
}

/// Headline numbers shown when listing checkpoints.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSummary {
    pub addresses_examined: usize,
    pub visited_forward: usize,
    pub visited_backward: usize,
    pub connections_found: usize,
}

impl ProgressSummary {
    #[must_use]
    pub fn of(state: &TraceState) -> Self {
        Self {
            addresses_examined: state.addresses_examined(),
            visited_forward: state.visited_forward.len(),
            visited_backward: state.visited_backward.len(),
            connections_found: state.connections_found.len(),
        }
    }
}

/// In-memory checkpoint record, the unit the store reads and writes.
#[derive(Clone, Debug)]
pub struct CheckpointRecord {
    pub session_id: String,
    /// Root session of the trace chain; export files are keyed by this.
    pub export_root: String,
    pub checkpoint_id: String,
    pub created_at: chrono::DateTime<Utc>,
    pub reason: CheckpointReason,
    pub request: TraceRequest,
    pub effective_range: BlockRange,
    pub progress: ProgressSummary,
    pub trace_state: TraceState,
}

/// Conversion and codec errors for persisted checkpoints.
#[derive(Debug, Error, Diagnostic)]
pub enum PersistenceError {
    #[error("checkpoint encode failed: {source}")]
    #[diagnostic(code(chaintrace::persistence::encode))]
    Encode {
        #[source]
        source: rmp_serde::encode::Error,
    },

    #[error("checkpoint decode failed: {source}")]
    #[diagnostic(
        code(chaintrace::persistence::decode),
        help("The file may be truncated or not a chaintrace checkpoint.")
    )]
    Decode {
        #[source]
        source: rmp_serde::decode::Error,
    },

    #[error("unsupported checkpoint schema version {found} (this build reads <= {SCHEMA_VERSION})")]
    #[diagnostic(
        code(chaintrace::persistence::unsupported_version),
        help("Upgrade chaintrace to a release that understands schema {found}.")
    )]
    UnsupportedVersion { found: u32 },
}

pub type Result<T> = std::result::Result<T, PersistenceError>;

/* ---------- persisted shapes ---------- */

#[derive(Debug, Deserialize)]
struct VersionProbe {
    schema_version: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersistedVisit {
    pub address: Address,
    pub depth: u32,
    pub path: Vec<Address>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersistedConnection {
    pub source: Address,
    pub target: Address,
    pub path: Vec<Address>,
    pub path_length: usize,
    /// RFC3339; keeps chrono types out of the serialized shape.
    pub discovered_at: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct PersistedTraceState {
    pub visited_forward: FxHashMap<Address, Vec<Address>>,
    pub visited_backward: FxHashMap<Address, Vec<Address>>,
    #[serde(default)]
    pub queued_forward: Vec<PersistedVisit>,
    #[serde(default)]
    pub queued_backward: Vec<PersistedVisit>,
    #[serde(default)]
    pub connections_found: Vec<PersistedConnection>,
    #[serde(default)]
    pub search_depth: u32,
    #[serde(default)]
    pub status: TraceStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersistedRequest {
    pub origins: Vec<Address>,
    pub destinations: Vec<Address>,
    pub max_depth: u32,
    pub start_block: Option<u64>,
    pub end_block: Option<u64>,
}

/// Current on-disk checkpoint shape.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PersistedCheckpoint {
    pub schema_version: u32,
    pub session_id: String,
    pub export_root: String,
    pub checkpoint_id: String,
    pub created_at: String,
    pub reason: CheckpointReason,
    pub request: PersistedRequest,
    pub effective_range: BlockRange,
    pub progress: ProgressSummary,
    pub trace_state: PersistedTraceState,
}

/// Legacy v1 shape: visited maps were bare address lists.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistedCheckpointV1 {
    pub schema_version: u32,
    pub session_id: String,
    pub checkpoint_id: String,
    pub created_at: String,
    #[serde(default = "default_v1_reason")]
    pub reason: CheckpointReason,
    pub request: PersistedRequest,
    #[serde(default)]
    pub effective_range: BlockRange,
    #[serde(default)]
    pub progress: ProgressSummary,
    pub trace_state: PersistedTraceStateV1,
}

fn default_v1_reason() -> CheckpointReason {
    CheckpointReason::Manual
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PersistedTraceStateV1 {
    #[serde(default)]
    pub visited_forward: Vec<Address>,
    #[serde(default)]
    pub visited_backward: Vec<Address>,
    #[serde(default)]
    pub queued_forward: Vec<PersistedVisit>,
    #[serde(default)]
    pub queued_backward: Vec<PersistedVisit>,
    #[serde(default)]
    pub connections_found: Vec<PersistedConnection>,
    #[serde(default)]
    pub search_depth: u32,
    #[serde(default)]
    pub status: TraceStatus,
}

/* ---------- in-memory <-> persisted conversions ---------- */

impl From<&Connection> for PersistedConnection {
    fn from(c: &Connection) -> Self {
        Self {
            source: c.source.clone(),
            target: c.target.clone(),
            path: c.path.clone(),
            path_length: c.path_length,
            discovered_at: c.discovered_at.to_rfc3339(),
        }
    }
}

impl From<PersistedConnection> for Connection {
    fn from(p: PersistedConnection) -> Self {
        let discovered_at = chrono::DateTime::parse_from_rfc3339(&p.discovered_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Self {
            source: p.source,
            target: p.target,
            path: p.path,
            path_length: p.path_length,
            discovered_at,
        }
    }
}

impl From<&PendingVisit> for PersistedVisit {
    fn from(v: &PendingVisit) -> Self {
        Self {
            address: v.address.clone(),
            depth: v.depth,
            path: v.path.clone(),
        }
    }
}

impl From<PersistedVisit> for PendingVisit {
    fn from(p: PersistedVisit) -> Self {
        Self {
            address: p.address,
            depth: p.depth,
            path: p.path,
        }
    }
}

impl From<&TraceState> for PersistedTraceState {
    fn from(s: &TraceState) -> Self {
        Self {
            visited_forward: s.visited_forward.clone(),
            visited_backward: s.visited_backward.clone(),
            queued_forward: s.queued_forward.iter().map(PersistedVisit::from).collect(),
            queued_backward: s.queued_backward.iter().map(PersistedVisit::from).collect(),
            connections_found: s
                .connections_found
                .iter()
                .map(PersistedConnection::from)
                .collect(),
            search_depth: s.search_depth,
            status: s.status,
        }
    }
}

impl From<PersistedTraceState> for TraceState {
    fn from(p: PersistedTraceState) -> Self {
        Self {
            visited_forward: p.visited_forward,
            visited_backward: p.visited_backward,
            queued_forward: p.queued_forward.into_iter().map(PendingVisit::from).collect(),
            queued_backward: p
                .queued_backward
                .into_iter()
                .map(PendingVisit::from)
                .collect(),
            connections_found: p.connections_found.into_iter().map(Connection::from).collect(),
            search_depth: p.search_depth,
            status: p.status,
        }
    }
}

impl From<&TraceRequest> for PersistedRequest {
    fn from(r: &TraceRequest) -> Self {
        Self {
            origins: r.origins.clone(),
            destinations: r.destinations.clone(),
            max_depth: r.max_depth,
            start_block: r.range.lo,
            end_block: r.range.hi,
        }
    }
}

impl From<PersistedRequest> for TraceRequest {
    fn from(p: PersistedRequest) -> Self {
        Self {
            origins: p.origins,
            destinations: p.destinations,
            max_depth: p.max_depth,
            range: BlockRange::new(p.start_block, p.end_block),
        }
    }
}

impl From<&CheckpointRecord> for PersistedCheckpoint {
    fn from(cp: &CheckpointRecord) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            session_id: cp.session_id.clone(),
            export_root: cp.export_root.clone(),
            checkpoint_id: cp.checkpoint_id.clone(),
            created_at: cp.created_at.to_rfc3339(),
            reason: cp.reason,
            request: PersistedRequest::from(&cp.request),
            effective_range: cp.effective_range,
            progress: cp.progress,
            trace_state: PersistedTraceState::from(&cp.trace_state),
        }
    }
}

impl From<PersistedCheckpoint> for CheckpointRecord {
    fn from(p: PersistedCheckpoint) -> Self {
        let created_at = chrono::DateTime::parse_from_rfc3339(&p.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Self {
            session_id: p.session_id,
            export_root: p.export_root,
            checkpoint_id: p.checkpoint_id,
            created_at,
            reason: p.reason,
            request: TraceRequest::from(p.request),
            effective_range: p.effective_range,
            progress: p.progress,
            trace_state: TraceState::from(p.trace_state),
        }
    }
}

/* ---------- upgrade chain ---------- */

/// v1 → v2: list-form visited maps become address→path maps with
/// synthesized single-element paths, and the export root defaults to the
/// session that wrote the record.
fn upgrade_v1(v1: PersistedCheckpointV1) -> PersistedCheckpoint {
    let synthesize = |addresses: Vec<Address>| -> FxHashMap<Address, Vec<Address>> {
        addresses
            .into_iter()
            .map(|a| (a.clone(), vec![a]))
            .collect()
    };
    PersistedCheckpoint {
        schema_version: SCHEMA_VERSION,
        export_root: v1.session_id.clone(),
        session_id: v1.session_id,
        checkpoint_id: v1.checkpoint_id,
        created_at: v1.created_at,
        reason: v1.reason,
        request: v1.request,
        effective_range: v1.effective_range,
        progress: v1.progress,
        trace_state: PersistedTraceState {
            visited_forward: synthesize(v1.trace_state.visited_forward),
            visited_backward: synthesize(v1.trace_state.visited_backward),
            queued_forward: v1.trace_state.queued_forward,
            queued_backward: v1.trace_state.queued_backward,
            connections_found: v1.trace_state.connections_found,
            search_depth: v1.trace_state.search_depth,
            status: v1.trace_state.status,
        },
    }
}

/* ---------- codec ---------- */

/// Encode a record into self-describing MessagePack.
pub fn encode(record: &CheckpointRecord) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(&PersistedCheckpoint::from(record))
        .map_err(|source| PersistenceError::Encode { source })
}

/// Decode bytes from any supported schema version into the current
/// in-memory record.
pub fn decode(bytes: &[u8]) -> Result<CheckpointRecord> {
    let probe: VersionProbe =
        rmp_serde::from_slice(bytes).map_err(|source| PersistenceError::Decode { source })?;
    let persisted = match probe.schema_version {
        1 => {
            let v1: PersistedCheckpointV1 = rmp_serde::from_slice(bytes)
                .map_err(|source| PersistenceError::Decode { source })?;
            upgrade_v1(v1)
        }
        2 => rmp_serde::from_slice(bytes).map_err(|source| PersistenceError::Decode { source })?,
        found => return Err(PersistenceError::UnsupportedVersion { found }),
    };
    Ok(CheckpointRecord::from(persisted))
}
