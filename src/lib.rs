//! # Chaintrace: Forensic Bitcoin Address Linking
//!
//! Chaintrace discovers on-chain transactional paths between two disjoint
//! sets of Bitcoin addresses — "suspected origins" (A) and "suspected
//! destinations" (B) — by running a bidirectional, bounded-depth
//! breadth-first walk over the transaction graph served by a pluggable
//! blockchain data provider. Searches run as resumable sessions:
//! progress is checkpointed periodically and on cancellation, and any
//! checkpoint can be resumed after a process restart without redoing
//! completed work.
//!
//! ## Core Concepts
//!
//! - **Tx source**: abstract provider of normalized transactions
//!   ([`source::TxSource`]); concrete HTTP/TCP backends live outside
//!   this crate.
//! - **Tracer**: the traversal engine ([`engine::Tracer`]) — two
//!   sequential BFS halves with per-direction visited maps and FIFO
//!   frontiers, stopping at the first cross-set hit.
//! - **Sessions**: lifecycle around a traversal
//!   ([`sessions::SessionManager`]) — start, cancel, resume, inspect.
//! - **Checkpoints**: atomic, schema-versioned snapshots of trace state
//!   ([`checkpoints::CheckpointStore`]).
//! - **Exports**: connections appended to CSV + JSON files the moment
//!   they are found ([`export::IncrementalExporter`]).
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chaintrace::cache::MemoryTxCache;
//! use chaintrace::config::Config;
//! use chaintrace::control::ControlPlane;
//! use chaintrace::sessions::{SessionManager, TraceRequest};
//! use chaintrace::types::BlockRange;
//! # use chaintrace::source::TxSource;
//!
//! # async fn example(source: Arc<dyn TxSource>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env();
//! let cache = Arc::new(MemoryTxCache::new(config.cache));
//! let manager = Arc::new(SessionManager::new(config, source, cache)?);
//! let control = ControlPlane::new(manager);
//!
//! let started = control
//!     .start(TraceRequest {
//!         origins: vec!["bc1q-origin".into()],
//!         destinations: vec!["bc1q-destination".into()],
//!         max_depth: 5,
//!         range: BlockRange::OPEN,
//!     })
//!     .await?;
//!
//! let view = control.status(&started.session_id)?;
//! println!("session {} is {}", started.session_id, view.record.status);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Guide
//!
//! - [`types`] - Addresses, directions, block ranges
//! - [`tx`] - Normalized transaction model, extraction, relevance filter
//! - [`source`] / [`cache`] - Provider and cache abstractions
//! - [`engine`] - Trace state and the traversal loop
//! - [`checkpoints`] - Persisted shapes, schema upgrades, atomic store
//! - [`export`] - Incremental CSV/JSON connection exports
//! - [`sessions`] - Session registry, lifecycle, periodic checkpointing
//! - [`control`] - Typed request/response boundary
//! - [`probe`] - Block-range narrowing pre-pass
//! - [`events`] - Trace events and pluggable sinks

pub mod cache;
pub mod checkpoints;
pub mod config;
pub mod control;
pub mod engine;
pub mod events;
pub mod export;
pub mod probe;
pub mod sessions;
pub mod source;
pub mod telemetry;
pub mod tx;
pub mod types;
