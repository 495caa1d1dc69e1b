//! Durable checkpoint storage.
//!
//! One directory, one file per checkpoint, named
//! `{session_id}_{checkpoint_id}.ckpt`. Every write gets a fresh
//! checkpoint id and lands via temp-file-plus-rename in the same
//! directory, so a crash mid-write leaves either no file or a fully
//! valid one — never a torn checkpoint. Records are immutable once
//! written; history accumulates until explicitly cleaned up.

use miette::Diagnostic;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::checkpoints::persistence::{self, CheckpointRecord, PersistenceError};

const CHECKPOINT_EXT: &str = "ckpt";

/// Errors from checkpoint-store operations.
#[derive(Debug, Error, Diagnostic)]
pub enum CheckpointStoreError {
    #[error("checkpoint not found: {session_id}/{checkpoint_id}")]
    #[diagnostic(
        code(chaintrace::checkpoints::not_found),
        help("List checkpoints for the session to see what is available.")
    )]
    NotFound {
        session_id: String,
        checkpoint_id: String,
    },

    #[error("checkpoint store I/O failure at {path}: {source}")]
    #[diagnostic(code(chaintrace::checkpoints::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Persistence(#[from] PersistenceError),
}

pub type Result<T> = std::result::Result<T, CheckpointStoreError>;

/// Atomic, versioned checkpoint files in a single directory.
#[derive(Debug)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    /// Open (and create if missing) the store directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CheckpointStoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_path(&self, session_id: &str, checkpoint_id: &str) -> PathBuf {
        self.dir
            .join(format!("{session_id}_{checkpoint_id}.{CHECKPOINT_EXT}"))
    }

    /// Persist a record under a fresh checkpoint id; prior checkpoints of
    /// the session are never touched. Returns the assigned id.
    pub fn write(&self, mut record: CheckpointRecord) -> Result<String> {
        let checkpoint_id = Uuid::new_v4().to_string();
        record.checkpoint_id = checkpoint_id.clone();

        let bytes = persistence::encode(&record)?;
        let final_path = self.file_path(&record.session_id, &checkpoint_id);
        let tmp_path = final_path.with_extension(format!("{CHECKPOINT_EXT}.tmp"));

        fs::write(&tmp_path, &bytes).map_err(|source| CheckpointStoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &final_path).map_err(|source| CheckpointStoreError::Io {
            path: final_path.clone(),
            source,
        })?;

        debug!(
            session = %record.session_id,
            checkpoint = %checkpoint_id,
            reason = %record.reason,
            "checkpoint written"
        );
        Ok(checkpoint_id)
    }

    /// Load one checkpoint. Missing or unreadable files surface as
    /// `NotFound` / decode errors; the caller decides whether that
    /// refuses a resume.
    pub fn read(&self, session_id: &str, checkpoint_id: &str) -> Result<CheckpointRecord> {
        let path = self.file_path(session_id, checkpoint_id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(CheckpointStoreError::NotFound {
                    session_id: session_id.to_string(),
                    checkpoint_id: checkpoint_id.to_string(),
                });
            }
            Err(source) => return Err(CheckpointStoreError::Io { path, source }),
        };
        Ok(persistence::decode(&bytes)?)
    }

    /// All checkpoints for a session, newest first. Files that fail to
    /// decode are skipped with a warning rather than failing the listing.
    pub fn list(&self, session_id: &str) -> Result<Vec<CheckpointRecord>> {
        let mut records: Vec<CheckpointRecord> = self
            .scan()?
            .into_iter()
            .filter(|r| r.session_id == session_id)
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.checkpoint_id.cmp(&a.checkpoint_id))
        });
        Ok(records)
    }

    /// The single most recent checkpoint across every session.
    pub fn latest_overall(&self) -> Result<Option<CheckpointRecord>> {
        Ok(self
            .scan()?
            .into_iter()
            .max_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then_with(|| a.checkpoint_id.cmp(&b.checkpoint_id))
            }))
    }

    /// The most recent checkpoint for one session.
    pub fn latest_for_session(&self, session_id: &str) -> Result<Option<CheckpointRecord>> {
        Ok(self.list(session_id)?.into_iter().next())
    }

    /// Remove one checkpoint file.
    pub fn delete(&self, session_id: &str, checkpoint_id: &str) -> Result<()> {
        let path = self.file_path(session_id, checkpoint_id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(CheckpointStoreError::NotFound {
                    session_id: session_id.to_string(),
                    checkpoint_id: checkpoint_id.to_string(),
                })
            }
            Err(source) => Err(CheckpointStoreError::Io { path, source }),
        }
    }

    /// Retain only the newest checkpoint for a session. Returns how many
    /// were deleted.
    pub fn cleanup_session(&self, session_id: &str) -> Result<usize> {
        let records = self.list(session_id)?;
        let mut deleted = 0;
        for record in records.iter().skip(1) {
            match self.delete(session_id, &record.checkpoint_id) {
                Ok(()) => deleted += 1,
                Err(err) => warn!(
                    session = %session_id,
                    checkpoint = %record.checkpoint_id,
                    error = %err,
                    "failed to delete checkpoint during cleanup"
                ),
            }
        }
        Ok(deleted)
    }

    /// Retain only the newest checkpoint per session across the whole
    /// directory. Returns how many were deleted.
    pub fn cleanup_all(&self) -> Result<usize> {
        let mut sessions: Vec<String> = self.scan()?.into_iter().map(|r| r.session_id).collect();
        sessions.sort();
        sessions.dedup();

        let mut deleted = 0;
        for session_id in sessions {
            deleted += self.cleanup_session(&session_id)?;
        }
        Ok(deleted)
    }

    // Decode every checkpoint file in the directory, skipping anything
    // unreadable. Temp files never carry the checkpoint extension, so a
    // crashed write is invisible here.
    fn scan(&self) -> Result<Vec<CheckpointRecord>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| CheckpointStoreError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let Ok(entry) = entry else { continue };
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHECKPOINT_EXT) {
                continue;
            }
            let bytes = match fs::read(&path) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "unreadable checkpoint file, skipping");
                    continue;
                }
            };
            match persistence::decode(&bytes) {
                Ok(record) => records.push(record),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "undecodable checkpoint file, skipping");
                }
            }
        }
        Ok(records)
    }
}
