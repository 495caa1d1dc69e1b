//! Normalized transaction model.
//!
//! Every tx-source backend (HTTPS explorer, self-hosted indexer, test
//! stub) normalizes its wire format into [`NormalizedTx`] before it
//! reaches the traversal engine. The engine consumes exactly one shape;
//! heterogeneous API layouts never leak past the source boundary.

pub mod extract;
pub mod filter;

pub use extract::{extract_input_addresses, extract_output_addresses};
pub use filter::{DropReason, FilterConfig, TxFilter, Verdict};

use serde::{Deserialize, Serialize};

use crate::types::Address;

/// A transaction in the one shape the engine understands.
///
/// Immutable value record: the traversal never mutates a transaction,
/// fan-out caps are applied as enumeration decisions instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedTx {
    pub txid: String,
    /// Confirmation height; `None` for unconfirmed or unknown.
    pub block_height: Option<u64>,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
}

/// An input reference carrying the previous output's address when the
/// source could resolve it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    pub address: Option<Address>,
}

/// An output reference with its script address (when standard) and value
/// in satoshis.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub address: Option<Address>,
    pub value: u64,
}

impl NormalizedTx {
    #[must_use]
    pub fn new(txid: impl Into<String>, block_height: Option<u64>) -> Self {
        Self {
            txid: txid.into(),
            block_height,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, address: Option<Address>) -> Self {
        self.inputs.push(TxInput { address });
        self
    }

    pub fn with_output(mut self, address: Option<Address>, value: u64) -> Self {
        self.outputs.push(TxOutput { address, value });
        self
    }
}
