//! Abstract transaction source consumed by the traversal engine.
//!
//! Concrete backends (HTTPS block explorers, a self-hosted Electrum-style
//! indexer over TCP/SSL) live outside this crate. They own connection
//! management, rate limiting, retries, and wire-format normalization;
//! the engine only ever sees [`crate::tx::NormalizedTx`] sequences.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

use crate::tx::NormalizedTx;
use crate::types::{Address, BlockRange};

/// Errors a tx-source backend may surface.
///
/// The engine treats any of these as "no transactions for this address"
/// and continues; retrying is the backend's responsibility, never the
/// engine's.
#[derive(Debug, Error, Diagnostic)]
pub enum SourceError {
    /// Connection, timeout, or protocol-level failure.
    #[error("transport failure talking to tx source: {message}")]
    #[diagnostic(
        code(chaintrace::source::transport),
        help("Check backend connectivity; the traversal continues without this address's transactions.")
    )]
    Transport { message: String },

    /// The backend refused the request (rate limit, auth).
    #[error("tx source rejected request: {message}")]
    #[diagnostic(code(chaintrace::source::rejected))]
    Rejected { message: String },

    /// The backend returned a payload that could not be normalized.
    #[error("malformed tx-source response for {address}: {message}")]
    #[diagnostic(code(chaintrace::source::malformed))]
    Malformed { address: Address, message: String },
}

/// A provider of normalized transactions for an address.
///
/// # Contract
///
/// * Returned sequences are bounded (at most the configured
///   `max_transactions_per_address`) and already purged of transactions
///   the backend itself recognizes as CoinJoin-like.
/// * `range` bounds are inclusive; an open end means unbounded.
/// * Implementations retry internally; an `Err` here is terminal for the
///   one request and the caller moves on.
#[async_trait]
pub trait TxSource: Send + Sync {
    /// Transactions touching `address` within `range`.
    async fn address_transactions(
        &self,
        address: &Address,
        range: &BlockRange,
    ) -> Result<Vec<NormalizedTx>, SourceError>;

    /// Earliest and latest block heights at which `address` was observed,
    /// or `None` when the backend has no activity on record. Feeds the
    /// block-range probe.
    async fn address_block_range(
        &self,
        address: &Address,
    ) -> Result<Option<(u64, u64)>, SourceError>;
}
