//! Traversal-relevance filtering for transactions.
//!
//! The filter rejects transactions that would flood the search frontier
//! without carrying forensic signal: one-to-many distributions
//! (airdrops, batched exchange payouts), extreme many-to-many mixers,
//! and anything carrying a recognized mixer-service marker. Thresholds
//! are configuration-driven (see [`crate::config::Config`]).

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::tx::NormalizedTx;

/// Thresholds steering [`TxFilter`] plus the traversal-time fan-out caps.
///
/// The caps (`max_input_addresses_per_tx`, `max_output_addresses_per_tx`)
/// are not consulted by the filter itself — the engine applies them when
/// enumerating neighbors of a kept transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Distribution rule: at most this many inputs…
    pub skip_distribution_max_inputs: usize,
    /// …paired with at least this many outputs drops the tx.
    pub skip_distribution_min_outputs: usize,
    /// Extreme-mixer rule: at least this many inputs…
    pub skip_mixer_input_threshold: usize,
    /// …and at least this many outputs drops the tx.
    pub skip_mixer_output_threshold: usize,
    /// Substrings that mark known mixer services.
    pub mixer_markers: Vec<String>,
    /// Addresses with this many fetched transactions are treated as
    /// exchange hubs and not expanded.
    pub exchange_wallet_threshold: usize,
    /// First-N cap on input addresses enqueued per kept tx.
    pub max_input_addresses_per_tx: usize,
    /// First-N cap on output addresses enqueued per kept tx.
    pub max_output_addresses_per_tx: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            skip_distribution_max_inputs: 2,
            skip_distribution_min_outputs: 100,
            skip_mixer_input_threshold: 50,
            skip_mixer_output_threshold: 50,
            mixer_markers: default_mixer_markers(),
            exchange_wallet_threshold: 1000,
            max_input_addresses_per_tx: 50,
            max_output_addresses_per_tx: 50,
        }
    }
}

pub(crate) fn default_mixer_markers() -> Vec<String> {
    ["coinjoin", "wasabi", "samourai", "whirlpool"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Outcome of filtering one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    Drop(DropReason),
}

impl Verdict {
    #[must_use]
    pub fn keeps(&self) -> bool {
        matches!(self, Verdict::Keep)
    }
}

/// Why a transaction was rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Few inputs fanning out to very many outputs.
    Distribution,
    /// Many-to-many shape past the extreme-mixer thresholds.
    ExtremeMixer,
    /// A known mixer-service marker appears in the transaction.
    MixerMarker,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::Distribution => write!(f, "distribution"),
            DropReason::ExtremeMixer => write!(f, "extreme mixer"),
            DropReason::MixerMarker => write!(f, "mixer marker"),
        }
    }
}

/// Stateless relevance filter over normalized transactions.
#[derive(Clone, Debug)]
pub struct TxFilter {
    config: FilterConfig,
}

impl TxFilter {
    #[must_use]
    pub fn new(config: FilterConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Decide whether a transaction is worth traversing.
    pub fn verdict(&self, tx: &NormalizedTx) -> Verdict {
        let inputs = tx.inputs.len();
        let outputs = tx.outputs.len();

        if inputs <= self.config.skip_distribution_max_inputs
            && outputs >= self.config.skip_distribution_min_outputs
        {
            debug!(txid = %tx.txid, inputs, outputs, "dropping distribution-shaped tx");
            return Verdict::Drop(DropReason::Distribution);
        }

        if inputs >= self.config.skip_mixer_input_threshold
            && outputs >= self.config.skip_mixer_output_threshold
        {
            debug!(txid = %tx.txid, inputs, outputs, "dropping extreme-mixer tx");
            return Verdict::Drop(DropReason::ExtremeMixer);
        }

        if self.carries_mixer_marker(tx) {
            debug!(txid = %tx.txid, "dropping tx carrying mixer marker");
            return Verdict::Drop(DropReason::MixerMarker);
        }

        Verdict::Keep
    }

    // Marker scan over a lowercase rendering of the whole record, so
    // markers hiding in any field (txid, addresses) are caught.
    fn carries_mixer_marker(&self, tx: &NormalizedTx) -> bool {
        if self.config.mixer_markers.is_empty() {
            return false;
        }
        let rendered = match serde_json::to_string(tx) {
            Ok(s) => s.to_lowercase(),
            Err(_) => return false,
        };
        self.config
            .mixer_markers
            .iter()
            .any(|marker| rendered.contains(marker.as_str()))
    }
}
