//! Typed control surface over the session manager.
//!
//! This is the boundary an HTTP layer (or CLI, or test harness) talks
//! to: every user intent is a method with serde-friendly request and
//! response types, and every failure is one of four public error kinds.
//! Internal error objects never cross this line.

use miette::Diagnostic;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::checkpoints::{CheckpointRecord, CheckpointStoreError, ProgressSummary};
use crate::sessions::{
    SessionError, SessionManager, SessionStatus, SessionView, TraceRequest, TraceResults,
};
use crate::tx::FilterConfig;
use crate::types::BlockRange;

/// Public error kinds surfaced at the boundary.
#[derive(Debug, Error, Diagnostic)]
pub enum ControlError {
    #[error("not found: {what}")]
    #[diagnostic(code(chaintrace::control::not_found))]
    NotFound { what: String },

    #[error("invalid state: {message}")]
    #[diagnostic(code(chaintrace::control::invalid_state))]
    InvalidState { message: String },

    #[error("bad request: {message}")]
    #[diagnostic(code(chaintrace::control::bad_request))]
    BadRequest { message: String },

    #[error("internal error: {message}")]
    #[diagnostic(code(chaintrace::control::internal))]
    Internal { message: String },
}

impl From<SessionError> for ControlError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::SessionNotFound { .. }
            | SessionError::CheckpointNotFound { .. }
            | SessionError::NoCheckpointsForSession { .. }
            | SessionError::NothingToResume
            | SessionError::CheckpointUnreadable { .. } => ControlError::NotFound {
                what: err.to_string(),
            },
            SessionError::NotCompleted { .. } | SessionError::InvalidState { .. } => {
                ControlError::InvalidState {
                    message: err.to_string(),
                }
            }
            SessionError::EmptyAddressSet
            | SessionError::BlankAddress
            | SessionError::DepthLimit { .. } => ControlError::BadRequest {
                message: err.to_string(),
            },
            SessionError::Store(store_err) => ControlError::from(store_err),
        }
    }
}

impl From<CheckpointStoreError> for ControlError {
    fn from(err: CheckpointStoreError) -> Self {
        match err {
            CheckpointStoreError::NotFound { .. } => ControlError::NotFound {
                what: err.to_string(),
            },
            other => ControlError::Internal {
                message: other.to_string(),
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, ControlError>;

/// Ack for a freshly started session.
#[derive(Clone, Debug, Serialize)]
pub struct StartedResponse {
    pub session_id: String,
}

/// Ack for a resumed session.
#[derive(Clone, Debug, Serialize)]
pub struct ResumedResponse {
    pub session_id: String,
    pub previous_session_id: Option<String>,
    pub checkpoint_id: Option<String>,
}

/// Ack for a cancellation request.
#[derive(Clone, Debug, Serialize)]
pub struct CancelAck {
    pub session_id: String,
    pub status: SessionStatus,
}

/// Ack for a manual checkpoint.
#[derive(Clone, Debug, Serialize)]
pub struct CheckpointAck {
    pub session_id: String,
    pub checkpoint_id: String,
    pub progress: ProgressSummary,
}

/// Listing entry for a stored checkpoint.
#[derive(Clone, Debug, Serialize)]
pub struct CheckpointSummary {
    pub session_id: String,
    pub checkpoint_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub reason: String,
    pub progress: ProgressSummary,
}

impl From<&CheckpointRecord> for CheckpointSummary {
    fn from(record: &CheckpointRecord) -> Self {
        Self {
            session_id: record.session_id.clone(),
            checkpoint_id: record.checkpoint_id.clone(),
            created_at: record.created_at,
            reason: record.reason.to_string(),
            progress: record.progress,
        }
    }
}

/// Full checkpoint inspection, without the bulky trace state itself.
#[derive(Clone, Debug, Serialize)]
pub struct CheckpointDetails {
    #[serde(flatten)]
    pub summary: CheckpointSummary,
    pub request: TraceRequest,
    pub effective_range: BlockRange,
    pub queued_forward: usize,
    pub queued_backward: usize,
}

/// Outcome of a checkpoint cleanup sweep.
#[derive(Clone, Debug, Serialize)]
pub struct CleanupReport {
    pub deleted: usize,
}

/// Request/response surface turning user intents into session-manager
/// calls.
pub struct ControlPlane {
    manager: Arc<SessionManager>,
}

impl ControlPlane {
    #[must_use]
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self { manager }
    }

    #[must_use]
    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Begin a new trace session.
    pub async fn start(&self, request: TraceRequest) -> Result<StartedResponse> {
        let session_id = self.manager.start(request).await?;
        Ok(StartedResponse { session_id })
    }

    /// Snapshot of one session.
    pub fn status(&self, session_id: &str) -> Result<SessionView> {
        Ok(self.manager.status(session_id)?)
    }

    /// Final results; valid only for completed sessions.
    pub fn results(&self, session_id: &str) -> Result<TraceResults> {
        Ok(self.manager.results(session_id)?)
    }

    /// All known sessions.
    pub fn list_sessions(&self) -> Vec<SessionView> {
        self.manager.list()
    }

    /// Request cooperative cancellation; idempotent.
    pub async fn cancel(&self, session_id: &str) -> Result<CancelAck> {
        let status = self.manager.cancel(session_id).await?;
        Ok(CancelAck {
            session_id: session_id.to_string(),
            status,
        })
    }

    /// Take a manual checkpoint of a running session.
    pub async fn force_checkpoint(&self, session_id: &str) -> Result<CheckpointAck> {
        let (checkpoint_id, progress) = self.manager.force_checkpoint(session_id).await?;
        Ok(CheckpointAck {
            session_id: session_id.to_string(),
            checkpoint_id,
            progress,
        })
    }

    /// Resume a specific checkpoint into a new session.
    pub async fn resume(&self, session_id: &str, checkpoint_id: &str) -> Result<ResumedResponse> {
        let new_session_id = self.manager.resume(session_id, checkpoint_id).await?;
        Ok(self.resumed_response(new_session_id))
    }

    /// Resume the most recent checkpoint across all sessions.
    pub async fn resume_auto(&self) -> Result<ResumedResponse> {
        let new_session_id = self.manager.resume_auto().await?;
        Ok(self.resumed_response(new_session_id))
    }

    /// Resume the most recent checkpoint of one session.
    pub async fn resume_session(&self, session_id: &str) -> Result<ResumedResponse> {
        let new_session_id = self.manager.resume_session(session_id).await?;
        Ok(self.resumed_response(new_session_id))
    }

    fn resumed_response(&self, session_id: String) -> ResumedResponse {
        let (previous_session_id, checkpoint_id) = self
            .manager
            .status(&session_id)
            .map(|view| (view.record.resumed_from, view.record.checkpoint_id))
            .unwrap_or((None, None));
        ResumedResponse {
            session_id,
            previous_session_id,
            checkpoint_id,
        }
    }

    /// Checkpoints of one session, newest first.
    pub fn list_checkpoints(&self, session_id: &str) -> Result<Vec<CheckpointSummary>> {
        let records = self.manager.store().list(session_id)?;
        Ok(records.iter().map(CheckpointSummary::from).collect())
    }

    /// The most recent checkpoint anywhere, if any, without resuming it.
    pub fn latest_checkpoint_info(&self) -> Result<Option<CheckpointSummary>> {
        let latest = self.manager.store().latest_overall()?;
        Ok(latest.as_ref().map(CheckpointSummary::from))
    }

    /// Inspect one checkpoint in detail.
    pub fn checkpoint_details(
        &self,
        session_id: &str,
        checkpoint_id: &str,
    ) -> Result<CheckpointDetails> {
        let record = self.manager.store().read(session_id, checkpoint_id)?;
        Ok(CheckpointDetails {
            summary: CheckpointSummary::from(&record),
            request: record.request.clone(),
            effective_range: record.effective_range,
            queued_forward: record.trace_state.queued_forward.len(),
            queued_backward: record.trace_state.queued_backward.len(),
        })
    }

    /// Delete one checkpoint file.
    pub fn delete_checkpoint(&self, session_id: &str, checkpoint_id: &str) -> Result<()> {
        Ok(self.manager.store().delete(session_id, checkpoint_id)?)
    }

    /// Retain only the newest checkpoint per session.
    pub fn cleanup_checkpoints(&self) -> Result<CleanupReport> {
        let deleted = self.manager.store().cleanup_all()?;
        Ok(CleanupReport { deleted })
    }

    /// Drop a session (cancelling it first if still running).
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        Ok(self.manager.delete(session_id).await?)
    }

    /// Swap the filter thresholds used by sessions started from now on.
    pub fn update_limits(&self, filter: FilterConfig) {
        self.manager.update_filter(filter);
    }

    /// Thresholds currently in force.
    #[must_use]
    pub fn current_limits(&self) -> FilterConfig {
        self.manager.current_filter()
    }
}
