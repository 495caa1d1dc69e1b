//! Session lifecycle management.
//!
//! The [`SessionManager`] owns the process-wide registry of sessions and
//! is the only component allowed to hand out views of them. Each session
//! runs as one spawned task that is the sole writer of its trace state;
//! every external reader (status, periodic checkpointer, manual
//! snapshots) goes through [`SharedTraceState::snapshot`] and never
//! observes a torn state.
//!
//! Cancellation is cooperative: `cancel` flips a flag the traversal
//! checks at its suspension points. The task then flushes the exporter,
//! writes one final `cancel` checkpoint, and transitions the session to
//! `cancelled`. Deleting a running session cancels first and waits a
//! bounded grace period for that final checkpoint before abandoning the
//! task.

use chrono::Utc;
use futures_util::FutureExt;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::cache::TxCache;
use crate::checkpoints::{
    CheckpointReason, CheckpointRecord, CheckpointStore, CheckpointStoreError, ProgressSummary,
};
use crate::config::Config;
use crate::engine::{
    CancelFlag, Connection, SharedTraceState, TraceObserver, TracePlan, TraceProgress, TraceState,
    TraceStatus, Tracer,
};
use crate::events::{EventSink, TraceEvent, TracingSink};
use crate::export::IncrementalExporter;
use crate::probe::probe_effective_range;
use crate::sessions::checkpointer::periodic_checkpoints;
use crate::sessions::session::{
    SessionRecord, SessionStatus, SessionView, TraceRequest, TraceResults, has_blank_address,
};
use crate::source::TxSource;
use crate::tx::{FilterConfig, TxFilter};

/// Errors from session-manager operations.
#[derive(Debug, Error, Diagnostic)]
pub enum SessionError {
    #[error("session not found: {session_id}")]
    #[diagnostic(code(chaintrace::sessions::not_found))]
    SessionNotFound { session_id: String },

    #[error("checkpoint not found: {session_id}/{checkpoint_id}")]
    #[diagnostic(code(chaintrace::sessions::checkpoint_not_found))]
    CheckpointNotFound {
        session_id: String,
        checkpoint_id: String,
    },

    #[error("no checkpoints exist for session {session_id}")]
    #[diagnostic(code(chaintrace::sessions::no_checkpoints))]
    NoCheckpointsForSession { session_id: String },

    #[error("no checkpoints exist to resume")]
    #[diagnostic(
        code(chaintrace::sessions::nothing_to_resume),
        help("Start a new trace first; resume only continues checkpointed work.")
    )]
    NothingToResume,

    #[error("checkpoint {session_id}/{checkpoint_id} could not be read: {message}")]
    #[diagnostic(code(chaintrace::sessions::checkpoint_unreadable))]
    CheckpointUnreadable {
        session_id: String,
        checkpoint_id: String,
        message: String,
    },

    #[error("session {session_id} is {status}, results require completed")]
    #[diagnostic(code(chaintrace::sessions::not_completed))]
    NotCompleted {
        session_id: String,
        status: SessionStatus,
    },

    #[error("cannot {action} session {session_id} while it is {status}")]
    #[diagnostic(code(chaintrace::sessions::invalid_state))]
    InvalidState {
        session_id: String,
        action: &'static str,
        status: SessionStatus,
    },

    #[error("both address sets must be non-empty")]
    #[diagnostic(code(chaintrace::sessions::empty_address_set))]
    EmptyAddressSet,

    #[error("addresses must be non-empty strings")]
    #[diagnostic(code(chaintrace::sessions::blank_address))]
    BlankAddress,

    #[error("requested depth {requested} exceeds the configured limit {limit}")]
    #[diagnostic(code(chaintrace::sessions::depth_limit))]
    DepthLimit { requested: u32, limit: u32 },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Store(#[from] CheckpointStoreError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// One registered session: metadata, live trace state, and the task
/// driving it.
pub(crate) struct SessionSlot {
    pub(crate) session_id: String,
    record: Mutex<SessionRecord>,
    pub(crate) trace: SharedTraceState,
    pub(crate) cancel: CancelFlag,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionSlot {
    fn new(record: SessionRecord, trace_state: TraceState) -> Arc<Self> {
        Arc::new(Self {
            session_id: record.session_id.clone(),
            record: Mutex::new(record),
            trace: SharedTraceState::new(trace_state),
            cancel: CancelFlag::new(),
            task: Mutex::new(None),
        })
    }

    pub(crate) fn with_record<R>(&self, f: impl FnOnce(&mut SessionRecord) -> R) -> R {
        let mut guard = self.record.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut guard)
    }

    pub(crate) fn status(&self) -> SessionStatus {
        self.with_record(|r| r.status)
    }

    fn set_task(&self, handle: JoinHandle<()>) {
        let mut guard = self.task.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(handle);
    }

    fn take_task(&self) -> Option<JoinHandle<()>> {
        let mut guard = self.task.lock().unwrap_or_else(|e| e.into_inner());
        guard.take()
    }

    pub(crate) fn view(&self) -> SessionView {
        let record = self.with_record(|r| r.clone());
        let snapshot = self.trace.snapshot();
        SessionView {
            record,
            trace_status: snapshot.status,
            search_depth: snapshot.search_depth,
            progress: ProgressSummary::of(&snapshot),
        }
    }
}

/// Snapshot the slot and write a checkpoint, updating session metadata
/// on success.
pub(crate) fn take_checkpoint(
    store: &CheckpointStore,
    events: &Arc<dyn EventSink>,
    slot: &SessionSlot,
    reason: CheckpointReason,
) -> std::result::Result<String, CheckpointStoreError> {
    let trace_state = slot.trace.snapshot();
    let (session_id, export_root, request, effective_range) = slot.with_record(|r| {
        (
            r.session_id.clone(),
            r.export_root.clone(),
            r.request.clone(),
            r.effective_range,
        )
    });
    let record = CheckpointRecord {
        session_id: session_id.clone(),
        export_root,
        checkpoint_id: String::new(),
        created_at: Utc::now(),
        reason,
        request,
        effective_range,
        progress: ProgressSummary::of(&trace_state),
        trace_state,
    };
    let checkpoint_id = store.write(record)?;
    slot.with_record(|r| {
        r.last_checkpoint_time = Some(Utc::now());
        r.checkpoint_id = Some(checkpoint_id.clone());
    });
    events.emit(TraceEvent::CheckpointSaved {
        session_id,
        checkpoint_id: checkpoint_id.clone(),
        reason: reason.to_string(),
    });
    Ok(checkpoint_id)
}

/// Like [`take_checkpoint`], but failures are logged and swallowed — the
/// traversal keeps going and the next interval retries.
pub(crate) fn take_checkpoint_logged(
    store: &CheckpointStore,
    events: &Arc<dyn EventSink>,
    slot: &SessionSlot,
    reason: CheckpointReason,
) -> Option<String> {
    match take_checkpoint(store, events, slot, reason) {
        Ok(checkpoint_id) => Some(checkpoint_id),
        Err(err) => {
            warn!(
                session = %slot.session_id,
                %reason,
                error = %err,
                "checkpoint write failed, continuing"
            );
            None
        }
    }
}

#[derive(Clone)]
struct TaskContext {
    source: Arc<dyn TxSource>,
    cache: Arc<dyn TxCache>,
    store: Arc<CheckpointStore>,
    events: Arc<dyn EventSink>,
    export_dir: PathBuf,
    filter: FilterConfig,
    max_transactions_per_address: usize,
    checkpoint_interval: Duration,
}

/// Aborts the held task when dropped, so the periodic checkpointer dies
/// with its session task on every exit path — normal return, panic, or
/// the supervising future itself being aborted.
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Process-wide owner of trace sessions.
pub struct SessionManager {
    config: Config,
    filter: RwLock<FilterConfig>,
    source: Arc<dyn TxSource>,
    cache: Arc<dyn TxCache>,
    store: Arc<CheckpointStore>,
    events: Arc<dyn EventSink>,
    registry: RwLock<FxHashMap<String, Arc<SessionSlot>>>,
}

impl SessionManager {
    /// Build a manager logging its events through tracing.
    pub fn new(
        config: Config,
        source: Arc<dyn TxSource>,
        cache: Arc<dyn TxCache>,
    ) -> Result<Self> {
        Self::with_events(config, source, cache, Arc::new(TracingSink))
    }

    /// Build a manager with a custom event sink.
    pub fn with_events(
        config: Config,
        source: Arc<dyn TxSource>,
        cache: Arc<dyn TxCache>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let store = Arc::new(CheckpointStore::open(&config.checkpoint_dir)?);
        Ok(Self {
            filter: RwLock::new(config.filter.clone()),
            config,
            source,
            cache,
            store,
            events,
            registry: RwLock::new(FxHashMap::default()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &CheckpointStore {
        &self.store
    }

    /// Filter thresholds currently in force. Sessions sample these once
    /// at start.
    #[must_use]
    pub fn current_filter(&self) -> FilterConfig {
        self.filter
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the filter thresholds for sessions started from now on.
    pub fn update_filter(&self, filter: FilterConfig) {
        let mut guard = self.filter.write().unwrap_or_else(|e| e.into_inner());
        *guard = filter;
    }

    fn ctx(&self) -> TaskContext {
        TaskContext {
            source: self.source.clone(),
            cache: self.cache.clone(),
            store: self.store.clone(),
            events: self.events.clone(),
            export_dir: self.config.export_dir.clone(),
            filter: self.current_filter(),
            max_transactions_per_address: self.config.max_transactions_per_address,
            checkpoint_interval: self.config.checkpoint_interval,
        }
    }

    fn insert(&self, slot: &Arc<SessionSlot>) {
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        registry.insert(slot.session_id.clone(), slot.clone());
    }

    fn get(&self, session_id: &str) -> Result<Arc<SessionSlot>> {
        let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
        registry
            .get(session_id)
            .cloned()
            .ok_or_else(|| SessionError::SessionNotFound {
                session_id: session_id.to_string(),
            })
    }

    fn validate(&self, request: &TraceRequest) -> Result<()> {
        if request.origins.is_empty() || request.destinations.is_empty() {
            return Err(SessionError::EmptyAddressSet);
        }
        if has_blank_address(&request.origins) || has_blank_address(&request.destinations) {
            return Err(SessionError::BlankAddress);
        }
        if request.max_depth > self.config.max_depth {
            return Err(SessionError::DepthLimit {
                requested: request.max_depth,
                limit: self.config.max_depth,
            });
        }
        Ok(())
    }

    /// Begin a new trace session. Returns its id immediately; the
    /// traversal runs in a background task.
    #[instrument(skip(self, request), err)]
    pub async fn start(&self, request: TraceRequest) -> Result<String> {
        self.validate(&request)?;
        let session_id = Uuid::new_v4().to_string();
        let record = SessionRecord::fresh(session_id.clone(), request);
        let slot = SessionSlot::new(record, TraceState::default());
        self.insert(&slot);
        let handle = tokio::spawn(run_session(self.ctx(), slot.clone()));
        slot.set_task(handle);
        info!(session = %session_id, "trace session started");
        Ok(session_id)
    }

    /// Resume a specific checkpoint into a brand-new session. The
    /// original session is historical and untouched.
    #[instrument(skip(self), err)]
    pub async fn resume(&self, session_id: &str, checkpoint_id: &str) -> Result<String> {
        let record = self.load_checkpoint(session_id, checkpoint_id)?;
        Ok(self.spawn_resumed(record))
    }

    /// Resume the most recent checkpoint across all sessions.
    #[instrument(skip(self), err)]
    pub async fn resume_auto(&self) -> Result<String> {
        let record = self
            .store
            .latest_overall()?
            .ok_or(SessionError::NothingToResume)?;
        Ok(self.spawn_resumed(record))
    }

    /// Resume the most recent checkpoint of one session.
    #[instrument(skip(self), err)]
    pub async fn resume_session(&self, session_id: &str) -> Result<String> {
        let record = self.store.latest_for_session(session_id)?.ok_or_else(|| {
            SessionError::NoCheckpointsForSession {
                session_id: session_id.to_string(),
            }
        })?;
        Ok(self.spawn_resumed(record))
    }

    fn load_checkpoint(&self, session_id: &str, checkpoint_id: &str) -> Result<CheckpointRecord> {
        self.store.read(session_id, checkpoint_id).map_err(|err| match err {
            CheckpointStoreError::NotFound { .. } => SessionError::CheckpointNotFound {
                session_id: session_id.to_string(),
                checkpoint_id: checkpoint_id.to_string(),
            },
            other => SessionError::CheckpointUnreadable {
                session_id: session_id.to_string(),
                checkpoint_id: checkpoint_id.to_string(),
                message: other.to_string(),
            },
        })
    }

    fn spawn_resumed(&self, checkpoint: CheckpointRecord) -> String {
        let new_session_id = Uuid::new_v4().to_string();
        let record = SessionRecord {
            session_id: new_session_id.clone(),
            export_root: checkpoint.export_root.clone(),
            status: SessionStatus::Resumed,
            request: checkpoint.request.clone(),
            effective_range: checkpoint.effective_range,
            started_at: Utc::now(),
            completed_at: None,
            last_checkpoint_time: None,
            checkpoint_id: Some(checkpoint.checkpoint_id.clone()),
            resumed_from: Some(checkpoint.session_id.clone()),
            exports: None,
            error: None,
        };
        info!(
            session = %new_session_id,
            resumed_from = %checkpoint.session_id,
            checkpoint = %checkpoint.checkpoint_id,
            examined = checkpoint.progress.addresses_examined,
            "resuming from checkpoint"
        );
        let slot = SessionSlot::new(record, checkpoint.trace_state);
        self.insert(&slot);
        let handle = tokio::spawn(run_session(self.ctx(), slot.clone()));
        slot.set_task(handle);
        new_session_id
    }

    /// Read-only snapshot of one session.
    pub fn status(&self, session_id: &str) -> Result<SessionView> {
        Ok(self.get(session_id)?.view())
    }

    /// Snapshots of every registered session, most recently started
    /// first.
    pub fn list(&self) -> Vec<SessionView> {
        let slots: Vec<Arc<SessionSlot>> = {
            let registry = self.registry.read().unwrap_or_else(|e| e.into_inner());
            registry.values().cloned().collect()
        };
        let mut views: Vec<SessionView> = slots.iter().map(|s| s.view()).collect();
        views.sort_by(|a, b| b.record.started_at.cmp(&a.record.started_at));
        views
    }

    /// Final results; only valid once the session completed.
    pub fn results(&self, session_id: &str) -> Result<TraceResults> {
        let slot = self.get(session_id)?;
        let (status, effective_range, exports) =
            slot.with_record(|r| (r.status, r.effective_range, r.exports.clone()));
        if status != SessionStatus::Completed {
            return Err(SessionError::NotCompleted {
                session_id: session_id.to_string(),
                status,
            });
        }
        let snapshot = slot.trace.snapshot();
        Ok(TraceResults {
            session_id: session_id.to_string(),
            status: snapshot.status,
            addresses_examined: snapshot.addresses_examined(),
            connections_found: snapshot.connections_found,
            search_depth: snapshot.search_depth,
            effective_range,
            exports,
        })
    }

    /// Request cooperative cancellation. Idempotent: cancelling an
    /// already-cancelled session is an ack; cancelling a finished one is
    /// an invalid-state error.
    #[instrument(skip(self), err)]
    pub async fn cancel(&self, session_id: &str) -> Result<SessionStatus> {
        let slot = self.get(session_id)?;
        let status = slot.status();
        match status {
            SessionStatus::Running | SessionStatus::Resumed => {
                slot.cancel.cancel();
                info!(session = %session_id, "cancellation requested");
                Ok(status)
            }
            SessionStatus::Cancelled => Ok(status),
            SessionStatus::Completed | SessionStatus::Failed => Err(SessionError::InvalidState {
                session_id: session_id.to_string(),
                action: "cancel",
                status,
            }),
        }
    }

    /// Take a `manual` checkpoint of a running session without
    /// interrupting it.
    #[instrument(skip(self), err)]
    pub async fn force_checkpoint(&self, session_id: &str) -> Result<(String, ProgressSummary)> {
        let slot = self.get(session_id)?;
        let status = slot.status();
        if !status.is_active() {
            return Err(SessionError::InvalidState {
                session_id: session_id.to_string(),
                action: "checkpoint",
                status,
            });
        }
        let checkpoint_id =
            take_checkpoint(&self.store, &self.events, &slot, CheckpointReason::Manual)?;
        let progress = ProgressSummary::of(&slot.trace.snapshot());
        Ok((checkpoint_id, progress))
    }

    /// Drop a session from the registry. A running session is cancelled
    /// first and granted a bounded grace period to write its final
    /// checkpoint; past that the task is abandoned.
    #[instrument(skip(self), err)]
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        let slot = self.get(session_id)?;
        if slot.status().is_active() {
            slot.cancel.cancel();
            if let Some(mut handle) = slot.take_task() {
                match tokio::time::timeout(self.config.cancel_grace, &mut handle).await {
                    Ok(Err(join_err)) if join_err.is_panic() => {
                        warn!(
                            session = %session_id,
                            "session task had panicked; deleting what it left behind"
                        );
                    }
                    Ok(_) => {}
                    Err(_) => {
                        warn!(session = %session_id, "grace period expired, abandoning session task");
                        handle.abort();
                    }
                }
            }
        }
        let mut registry = self.registry.write().unwrap_or_else(|e| e.into_inner());
        registry.remove(session_id);
        info!(session = %session_id, "session deleted");
        Ok(())
    }
}

/// Bridges the engine's narrow observer interface to exports and events.
struct SessionObserver<'a> {
    session_id: String,
    exporter: &'a mut IncrementalExporter,
    events: Arc<dyn EventSink>,
}

impl TraceObserver for SessionObserver<'_> {
    fn on_progress(&mut self, progress: &TraceProgress) {
        self.events.emit(TraceEvent::Progress {
            session_id: self.session_id.clone(),
            direction: progress.direction,
            current: progress.current.clone(),
            depth: progress.depth,
            visited_forward: progress.visited_forward,
            visited_backward: progress.visited_backward,
            queued: progress.queued,
        });
    }

    fn on_connection(&mut self, connection: &Connection) {
        if let Err(err) = self.exporter.append(connection) {
            warn!(
                session = %self.session_id,
                error = %err,
                "export append failed; connection remains in trace state"
            );
        }
        self.events.emit(TraceEvent::ConnectionFound {
            session_id: self.session_id.clone(),
            connection: connection.clone(),
        });
    }
}

/// Supervises one session task: runs the body behind a panic boundary
/// and keeps the periodic checkpointer's lifetime tied to its own.
///
/// A panic anywhere in the body is fatal-internal: the session
/// transitions to `failed` with one best-effort `cancel` checkpoint and
/// a `SessionEnded` event, preserving whatever trace state was
/// accumulated. Without this boundary the slot would stay frozen at
/// `running` and the checkpointer would snapshot the dead session
/// forever.
async fn run_session(ctx: TaskContext, slot: Arc<SessionSlot>) {
    let checkpointer = AbortOnDrop(tokio::spawn(periodic_checkpoints(
        ctx.store.clone(),
        ctx.events.clone(),
        slot.clone(),
        ctx.checkpoint_interval,
    )));

    let outcome = AssertUnwindSafe(run_session_body(ctx.clone(), slot.clone()))
        .catch_unwind()
        .await;
    drop(checkpointer);

    if let Err(payload) = outcome {
        let message = panic_message(payload);
        error!(session = %slot.session_id, %message, "session task panicked");
        take_checkpoint_logged(&ctx.store, &ctx.events, &slot, CheckpointReason::Cancel);
        finish(&ctx, &slot, SessionStatus::Failed, Some(message));
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "session task panicked".to_string()
    }
}

/// The session task body: probe, export wiring, the traversal itself,
/// and the terminal transition.
async fn run_session_body(ctx: TaskContext, slot: Arc<SessionSlot>) {
    let session_id = slot.session_id.clone();
    let (request, resumed_from, export_root, restored_range) = slot.with_record(|r| {
        r.status = SessionStatus::Running;
        (
            r.request.clone(),
            r.resumed_from.clone(),
            r.export_root.clone(),
            r.effective_range,
        )
    });
    ctx.events.emit(TraceEvent::SessionStarted {
        session_id: session_id.clone(),
        resumed_from: resumed_from.clone(),
    });

    // Narrow the window. Resumed sessions reuse the range their
    // checkpoint recorded; fresh ones probe when either end is open.
    let effective_range = if resumed_from.is_some() {
        restored_range
    } else if request.range.lo.is_none() || request.range.hi.is_none() {
        probe_effective_range(
            ctx.source.as_ref(),
            &request.origins,
            &request.destinations,
            request.range,
        )
        .await
        .effective
    } else {
        request.range
    };
    slot.with_record(|r| r.effective_range = effective_range);

    let mut exporter = match IncrementalExporter::open(&ctx.export_dir, &export_root, &request) {
        Ok(exporter) => exporter,
        Err(err) => {
            error!(session = %session_id, error = %err, "could not open export files");
            take_checkpoint_logged(&ctx.store, &ctx.events, &slot, CheckpointReason::Cancel);
            finish(&ctx, &slot, SessionStatus::Failed, Some(err.to_string()));
            return;
        }
    };
    slot.with_record(|r| r.exports = Some(exporter.paths().clone()));

    // Connections already in the restored state re-enter the export
    // files through the same dedup as live discoveries.
    let prior_connections = slot.trace.snapshot().connections_found;
    if !prior_connections.is_empty() {
        if let Err(err) = exporter.restore(&prior_connections) {
            warn!(session = %session_id, error = %err, "export restore failed");
        }
    }

    let plan = TracePlan::new(
        request.origins.clone(),
        request.destinations.clone(),
        request.max_depth,
        effective_range,
    );
    let tracer = Tracer::new(
        ctx.source.clone(),
        ctx.cache.clone(),
        TxFilter::new(ctx.filter.clone()),
    )
    .with_tx_limit(ctx.max_transactions_per_address);
    let mut observer = SessionObserver {
        session_id: session_id.clone(),
        exporter: &mut exporter,
        events: ctx.events.clone(),
    };
    let trace_status = tracer
        .trace(&plan, &slot.trace, &mut observer, &slot.cancel)
        .await;

    // Flush the exporter before any final checkpoint or transition.
    let snapshot = slot.trace.snapshot();
    match exporter.finalize(trace_status, snapshot.addresses_examined(), snapshot.search_depth) {
        Ok(paths) => slot.with_record(|r| r.exports = Some(paths)),
        Err(err) => warn!(session = %session_id, error = %err, "export finalize failed"),
    }

    let final_status = match trace_status {
        TraceStatus::Connected | TraceStatus::NoConnection => SessionStatus::Completed,
        TraceStatus::Cancelled => {
            take_checkpoint_logged(&ctx.store, &ctx.events, &slot, CheckpointReason::Cancel);
            SessionStatus::Cancelled
        }
        // The supervisor's panic boundary turns this into `failed`.
        TraceStatus::Searching => unreachable!("trace always resolves to a terminal status"),
    };
    finish(&ctx, &slot, final_status, None);
}

fn finish(ctx: &TaskContext, slot: &SessionSlot, status: SessionStatus, error: Option<String>) {
    slot.with_record(|r| {
        r.status = status;
        r.completed_at = Some(Utc::now());
        r.error = error;
    });
    ctx.events.emit(TraceEvent::SessionEnded {
        session_id: slot.session_id.clone(),
        status: status.to_string(),
    });
}
