//! Durable checkpoints: persisted shapes, schema upgrades, and the
//! atomic file store.

pub mod persistence;
pub mod store;

pub use persistence::{
    CheckpointReason, CheckpointRecord, PersistenceError, ProgressSummary, SCHEMA_VERSION,
};
pub use store::{CheckpointStore, CheckpointStoreError};
