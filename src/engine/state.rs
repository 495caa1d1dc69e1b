//! Checkpointable traversal state.
//!
//! [`TraceState`] is everything a trace needs to continue after a process
//! restart: per-direction visited maps (address → full path from seed),
//! per-direction FIFO frontiers, and the connections found so far. The
//! traversal task is the sole writer; everyone else (status endpoint,
//! periodic checkpointer, manual snapshots) reads through
//! [`SharedTraceState::snapshot`], which clones under a read lock so no
//! reader ever observes a torn state.

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::types::{Address, Direction};

/// A frontier entry awaiting expansion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVisit {
    pub address: Address,
    pub depth: u32,
    /// Seed → `address`, inclusive on both ends.
    pub path: Vec<Address>,
}

/// A discovered link between the two address sets.
///
/// The path always reads `source ∈ A` → `target ∈ B`, regardless of which
/// half of the search found it. Two connections are the same discovery
/// when their `(source, target)` pair matches; paths and timestamps are
/// informational.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub source: Address,
    pub target: Address,
    pub path: Vec<Address>,
    pub path_length: usize,
    pub discovered_at: DateTime<Utc>,
}

impl Connection {
    #[must_use]
    pub fn key(&self) -> (Address, Address) {
        (self.source.clone(), self.target.clone())
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<&str> = self.path.iter().map(Address::as_str).collect();
        write!(f, "{}", rendered.join(" -> "))
    }
}

/// Where the traversal currently stands.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// Frontier work remains.
    #[default]
    Searching,
    /// First hit found; search stopped.
    Connected,
    /// Both halves drained without a hit.
    NoConnection,
    /// Stopped cooperatively at a suspension point.
    Cancelled,
}

impl fmt::Display for TraceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraceStatus::Searching => write!(f, "searching"),
            TraceStatus::Connected => write!(f, "connected"),
            TraceStatus::NoConnection => write!(f, "no_connection"),
            TraceStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// The resumable substructure of a session.
#[derive(Clone, Debug, Default)]
pub struct TraceState {
    pub visited_forward: FxHashMap<Address, Vec<Address>>,
    pub visited_backward: FxHashMap<Address, Vec<Address>>,
    pub queued_forward: VecDeque<PendingVisit>,
    pub queued_backward: VecDeque<PendingVisit>,
    /// Deduplicated by `(source, target)`, in discovery order.
    pub connections_found: Vec<Connection>,
    /// Deepest depth dequeued so far.
    pub search_depth: u32,
    pub status: TraceStatus,
}

impl TraceState {
    /// Seed one direction's frontier. Addresses already visited in that
    /// direction (a resumed half) are left untouched.
    pub fn seed(&mut self, direction: Direction, seeds: &[Address]) {
        for addr in seeds {
            let visited = self.visited_mut(direction);
            if visited.contains_key(addr) {
                continue;
            }
            visited.insert(addr.clone(), vec![addr.clone()]);
            self.queue_mut(direction).push_back(PendingVisit {
                address: addr.clone(),
                depth: 0,
                path: vec![addr.clone()],
            });
        }
    }

    #[must_use]
    pub fn visited(&self, direction: Direction) -> &FxHashMap<Address, Vec<Address>> {
        match direction {
            Direction::Forward => &self.visited_forward,
            Direction::Backward => &self.visited_backward,
        }
    }

    pub fn visited_mut(&mut self, direction: Direction) -> &mut FxHashMap<Address, Vec<Address>> {
        match direction {
            Direction::Forward => &mut self.visited_forward,
            Direction::Backward => &mut self.visited_backward,
        }
    }

    #[must_use]
    pub fn queue(&self, direction: Direction) -> &VecDeque<PendingVisit> {
        match direction {
            Direction::Forward => &self.queued_forward,
            Direction::Backward => &self.queued_backward,
        }
    }

    pub fn queue_mut(&mut self, direction: Direction) -> &mut VecDeque<PendingVisit> {
        match direction {
            Direction::Forward => &mut self.queued_forward,
            Direction::Backward => &mut self.queued_backward,
        }
    }

    /// Total addresses examined across both directions.
    #[must_use]
    pub fn addresses_examined(&self) -> usize {
        self.visited_forward.len() + self.visited_backward.len()
    }

    /// Record a connection unless its `(source, target)` pair is already
    /// known. Returns whether it was new.
    pub fn record_connection(&mut self, connection: Connection) -> bool {
        let duplicate = self
            .connections_found
            .iter()
            .any(|c| c.source == connection.source && c.target == connection.target);
        if duplicate {
            return false;
        }
        self.connections_found.push(connection);
        true
    }
}

/// Shared handle over a session's [`TraceState`].
///
/// The traversal task takes short write scopes that never span an await;
/// readers clone the whole state under the read lock.
#[derive(Clone, Default)]
pub struct SharedTraceState {
    inner: Arc<RwLock<TraceState>>,
}

impl SharedTraceState {
    #[must_use]
    pub fn new(state: TraceState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    /// Run a closure with exclusive access. Poisoning is unrecoverable
    /// here (a writer panicked mid-update), so it propagates.
    pub fn with_write<R>(&self, f: impl FnOnce(&mut TraceState) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    /// Consistent point-in-time copy of the full state.
    #[must_use]
    pub fn snapshot(&self) -> TraceState {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
