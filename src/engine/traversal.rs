//! Bidirectional bounded-depth traversal over the transaction graph.
//!
//! The search runs two sequential breadth-first halves: forward from the
//! origin set A hunting members of B, then backward from B hunting A.
//! Each half keeps its own visited map (address → full path from seed)
//! and FIFO frontier, stops at the first cross-set hit, and never
//! revisits an address — the visited map is the cycle breaker.
//!
//! The loop is deliberately single-threaded per session: given identical
//! tx-source responses, dequeue order, emitted paths, and checkpoints are
//! all deterministic. The only suspension points are the cache/source
//! fetches; cancellation is observed there and nowhere else.
//!
//! "Forward" does not mean "follow the money": both halves expand the
//! union of a transaction's output and input addresses. Direction only
//! selects the seed set, the opposite set, and the intra-transaction
//! enumeration order (forward lists outputs first, backward inputs
//! first), which pins path determinism.

use chrono::Utc;
use rustc_hash::FxHashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

use crate::cache::TxCache;
use crate::engine::state::{
    Connection, PendingVisit, SharedTraceState, TraceState, TraceStatus,
};
use crate::source::TxSource;
use crate::tx::{
    NormalizedTx, TxFilter, extract_input_addresses, extract_output_addresses,
};
use crate::types::{Address, BlockRange, Direction};

/// Cooperative stop signal checked at every suspension point.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything fixed for the lifetime of one traversal.
#[derive(Clone, Debug)]
pub struct TracePlan {
    pub origins: Vec<Address>,
    pub destinations: Vec<Address>,
    origin_set: FxHashSet<Address>,
    destination_set: FxHashSet<Address>,
    pub max_depth: u32,
    pub range: BlockRange,
}

impl TracePlan {
    #[must_use]
    pub fn new(
        origins: Vec<Address>,
        destinations: Vec<Address>,
        max_depth: u32,
        range: BlockRange,
    ) -> Self {
        let origin_set = origins.iter().cloned().collect();
        let destination_set = destinations.iter().cloned().collect();
        Self {
            origins,
            destinations,
            origin_set,
            destination_set,
            max_depth,
            range,
        }
    }

    fn seeds(&self, direction: Direction) -> &[Address] {
        match direction {
            Direction::Forward => &self.origins,
            Direction::Backward => &self.destinations,
        }
    }

    fn opposite_set(&self, direction: Direction) -> &FxHashSet<Address> {
        match direction {
            Direction::Forward => &self.destination_set,
            Direction::Backward => &self.origin_set,
        }
    }
}

/// Lightweight progress report handed to the observer after each
/// processed address.
#[derive(Clone, Debug)]
pub struct TraceProgress {
    pub direction: Direction,
    pub current: Address,
    pub depth: u32,
    pub visited_forward: usize,
    pub visited_backward: usize,
    pub queued: usize,
}

/// Narrow interface through which the engine reports outcomes.
///
/// The engine knows nothing about exporters, checkpoints, or event
/// sinks; the session wires those up behind this trait. `on_connection`
/// is called synchronously, exactly once per distinct `(source, target)`
/// pair, before the engine returns — and the connection is recorded in
/// the trace state first, so a later checkpoint contains it even if the
/// observer misbehaves.
pub trait TraceObserver: Send {
    fn on_progress(&mut self, progress: &TraceProgress);
    fn on_connection(&mut self, connection: &Connection);
}

/// Observer that ignores everything; useful in tests.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl TraceObserver for NoopObserver {
    fn on_progress(&mut self, _progress: &TraceProgress) {}
    fn on_connection(&mut self, _connection: &Connection) {}
}

enum Step {
    Drained,
    Skip,
    Hit { connection: Connection, fresh: bool },
    Expand(PendingVisit),
}

enum HalfOutcome {
    Drained,
    Hit,
    Cancelled,
}

/// The traversal engine. One instance serves one session; it owns no
/// state of its own beyond its collaborators.
pub struct Tracer {
    source: Arc<dyn TxSource>,
    cache: Arc<dyn TxCache>,
    filter: TxFilter,
    max_transactions_per_address: usize,
}

impl Tracer {
    #[must_use]
    pub fn new(source: Arc<dyn TxSource>, cache: Arc<dyn TxCache>, filter: TxFilter) -> Self {
        Self {
            source,
            cache,
            filter,
            max_transactions_per_address: 50,
        }
    }

    /// Defensive cap on transactions considered per address; well-behaved
    /// sources already bound their responses to the same limit.
    #[must_use]
    pub fn with_tx_limit(mut self, max_transactions_per_address: usize) -> Self {
        self.max_transactions_per_address = max_transactions_per_address;
        self
    }

    /// Run the search to its first hit, exhaustion, or cancellation.
    ///
    /// Serves both fresh starts and resumes: a fresh `TraceState` is
    /// seeded here, a restored one continues where it stopped. A half
    /// whose queue is empty while its visited map is populated has
    /// already completed and is skipped outright.
    pub async fn trace(
        &self,
        plan: &TracePlan,
        state: &SharedTraceState,
        observer: &mut dyn TraceObserver,
        cancel: &CancelFlag,
    ) -> TraceStatus {
        state.with_write(|st| {
            st.status = TraceStatus::Searching;
            st.seed(Direction::Forward, &plan.origins);
            st.seed(Direction::Backward, &plan.destinations);
        });

        for direction in [Direction::Forward, Direction::Backward] {
            let already_done = state.with_write(|st| {
                st.queue(direction).is_empty() && !st.visited(direction).is_empty()
            });
            if already_done {
                debug!(%direction, "half already drained before this run, skipping");
                continue;
            }
            info!(
                %direction,
                seeds = plan.seeds(direction).len(),
                range = %plan.range,
                "tracing half"
            );
            match self.run_half(direction, plan, state, observer, cancel).await {
                HalfOutcome::Hit => {
                    return state.with_write(|st| {
                        st.status = TraceStatus::Connected;
                        st.status
                    });
                }
                HalfOutcome::Cancelled => {
                    return state.with_write(|st| {
                        st.status = TraceStatus::Cancelled;
                        st.status
                    });
                }
                HalfOutcome::Drained => {}
            }
        }

        state.with_write(|st| {
            st.status = TraceStatus::NoConnection;
            st.status
        })
    }

    async fn run_half(
        &self,
        direction: Direction,
        plan: &TracePlan,
        state: &SharedTraceState,
        observer: &mut dyn TraceObserver,
        cancel: &CancelFlag,
    ) -> HalfOutcome {
        let opposite = plan.opposite_set(direction);

        loop {
            if cancel.is_cancelled() {
                info!(%direction, "cancellation observed, stopping half");
                return HalfOutcome::Cancelled;
            }

            let step = state.with_write(|st| {
                let Some(visit) = st.queue_mut(direction).pop_front() else {
                    return Step::Drained;
                };
                if visit.depth > st.search_depth {
                    st.search_depth = visit.depth;
                }
                if opposite.contains(&visit.address) {
                    let connection = build_connection(direction, &visit.path);
                    let fresh = st.record_connection(connection.clone());
                    return Step::Hit { connection, fresh };
                }
                if visit.depth == plan.max_depth {
                    return Step::Skip;
                }
                Step::Expand(visit)
            });

            let visit = match step {
                Step::Drained => return HalfOutcome::Drained,
                Step::Skip => continue,
                Step::Hit { connection, fresh } => {
                    info!(%direction, path = %connection, "connection established");
                    if fresh {
                        observer.on_connection(&connection);
                    }
                    return HalfOutcome::Hit;
                }
                Step::Expand(visit) => visit,
            };

            // Suspension point: the only place this half yields.
            let txs = self.fetch_transactions(&visit.address, &plan.range).await;

            let hit = if txs.len() >= self.filter.config().exchange_wallet_threshold {
                debug!(
                    %direction,
                    address = visit.address.short(),
                    tx_count = txs.len(),
                    "exchange-hub address, not expanding"
                );
                None
            } else {
                let neighbors = self.neighbors(direction, &txs);
                state.with_write(|st| {
                    integrate_neighbors(st, direction, opposite, &visit, neighbors)
                })
            };

            if let Some((connection, fresh)) = hit {
                info!(%direction, path = %connection, "connection established");
                if fresh {
                    observer.on_connection(&connection);
                }
                return HalfOutcome::Hit;
            }

            let progress = state.with_write(|st| TraceProgress {
                direction,
                current: visit.address.clone(),
                depth: visit.depth,
                visited_forward: st.visited_forward.len(),
                visited_backward: st.visited_backward.len(),
                queued: st.queue(direction).len(),
            });
            observer.on_progress(&progress);
        }
    }

    /// Cache-through fetch. A source failure is transient-io: logged,
    /// treated as "no transactions", never retried here.
    async fn fetch_transactions(&self, address: &Address, range: &BlockRange) -> Vec<NormalizedTx> {
        if let Some(cached) = self.cache.get(address, range).await {
            return cached;
        }
        match self.source.address_transactions(address, range).await {
            Ok(mut txs) => {
                txs.truncate(self.max_transactions_per_address);
                if !txs.is_empty() {
                    self.cache.put(address, range, &txs).await;
                }
                txs
            }
            Err(err) => {
                warn!(address = address.short(), error = %err, "tx fetch failed, continuing without");
                Vec::new()
            }
        }
    }

    /// Candidate neighbors of an address: for every kept transaction, its
    /// extracted addresses in direction-specific order, capped per tx.
    /// Cross-transaction duplicates survive here; the visited check at
    /// integration time makes the first occurrence win.
    fn neighbors(&self, direction: Direction, txs: &[NormalizedTx]) -> Vec<Address> {
        let in_cap = self.filter.config().max_input_addresses_per_tx;
        let out_cap = self.filter.config().max_output_addresses_per_tx;

        let mut neighbors = Vec::new();
        for tx in txs {
            if !self.filter.verdict(tx).keeps() {
                continue;
            }
            let mut inputs = extract_input_addresses(tx);
            inputs.truncate(in_cap);
            let mut outputs = extract_output_addresses(tx);
            outputs.truncate(out_cap);

            let mut seen_in_tx: FxHashSet<&Address> = FxHashSet::default();
            let ordered = match direction {
                Direction::Forward => outputs.iter().chain(inputs.iter()),
                Direction::Backward => inputs.iter().chain(outputs.iter()),
            };
            for addr in ordered {
                if seen_in_tx.insert(addr) {
                    neighbors.push(addr.clone());
                }
            }
        }
        neighbors
    }
}

fn integrate_neighbors(
    st: &mut TraceState,
    direction: Direction,
    opposite: &FxHashSet<Address>,
    visit: &PendingVisit,
    neighbors: Vec<Address>,
) -> Option<(Connection, bool)> {
    for neighbor in neighbors {
        if st.visited(direction).contains_key(&neighbor) {
            continue;
        }
        let mut path = visit.path.clone();
        path.push(neighbor.clone());
        st.visited_mut(direction).insert(neighbor.clone(), path.clone());

        if opposite.contains(&neighbor) {
            let connection = build_connection(direction, &path);
            let fresh = st.record_connection(connection.clone());
            return Some((connection, fresh));
        }

        st.queue_mut(direction).push_back(PendingVisit {
            address: neighbor,
            depth: visit.depth + 1,
            path,
        });
    }
    None
}

/// Shape a raw half-path into a `Connection` reading source ∈ A →
/// target ∈ B. Backward halves walked B → A, so their path is reversed.
fn build_connection(direction: Direction, path: &[Address]) -> Connection {
    let oriented: Vec<Address> = match direction {
        Direction::Forward => path.to_vec(),
        Direction::Backward => path.iter().rev().cloned().collect(),
    };
    let source = oriented.first().cloned().unwrap_or_else(|| Address::from(""));
    let target = oriented.last().cloned().unwrap_or_else(|| Address::from(""));
    Connection {
        source,
        target,
        path_length: oriented.len(),
        path: oriented,
        discovered_at: Utc::now(),
    }
}
