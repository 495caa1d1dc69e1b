//! Typed trace events and pluggable sinks.
//!
//! Sessions narrate their life through [`TraceEvent`]s pushed into an
//! [`EventSink`]. The default [`TracingSink`] turns them into log lines;
//! [`ChannelSink`] fans them out over a flume channel for UIs and tests.
//! Sinks must never block or fail the traversal — emission is fire and
//! forget.

use serde::Serialize;
use tracing::info;

use crate::engine::Connection;
use crate::types::{Address, Direction};

/// Something observable happened inside a session.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    SessionStarted {
        session_id: String,
        resumed_from: Option<String>,
    },
    Progress {
        session_id: String,
        direction: Direction,
        current: Address,
        depth: u32,
        visited_forward: usize,
        visited_backward: usize,
        queued: usize,
    },
    ConnectionFound {
        session_id: String,
        connection: Connection,
    },
    CheckpointSaved {
        session_id: String,
        checkpoint_id: String,
        reason: String,
    },
    SessionEnded {
        session_id: String,
        status: String,
    },
}

/// Receives session events. Implementations must be cheap and infallible.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: TraceEvent);
}

/// Default sink: renders events as structured log records.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: TraceEvent) {
        match &event {
            TraceEvent::SessionStarted {
                session_id,
                resumed_from,
            } => match resumed_from {
                Some(prev) => info!(session = %session_id, resumed_from = %prev, "session started"),
                None => info!(session = %session_id, "session started"),
            },
            TraceEvent::Progress {
                session_id,
                direction,
                current,
                depth,
                ..
            } => {
                info!(session = %session_id, %direction, depth, address = current.short(), "explored address");
            }
            TraceEvent::ConnectionFound {
                session_id,
                connection,
            } => {
                info!(session = %session_id, path = %connection, "connection established");
            }
            TraceEvent::CheckpointSaved {
                session_id,
                checkpoint_id,
                reason,
            } => {
                info!(session = %session_id, checkpoint = %checkpoint_id, reason, "checkpoint saved");
            }
            TraceEvent::SessionEnded { session_id, status } => {
                info!(session = %session_id, status, "session ended");
            }
        }
    }
}

/// Sink forwarding events into a flume channel. Disconnected receivers
/// are tolerated silently.
pub struct ChannelSink {
    tx: flume::Sender<TraceEvent>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(tx: flume::Sender<TraceEvent>) -> Self {
        Self { tx }
    }

    /// Convenience constructor: sink plus its receiving end.
    #[must_use]
    pub fn unbounded() -> (Self, flume::Receiver<TraceEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: TraceEvent) {
        let _ = self.tx.send(event);
    }
}
