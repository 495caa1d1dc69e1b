//! Core types shared across the chaintrace crate.
//!
//! This module defines the fundamental vocabulary of a trace: opaque
//! [`Address`]es, the [`Direction`] a search half runs in, and the
//! [`BlockRange`] that bounds which transactions are considered.
//!
//! # Examples
//!
//! ```rust
//! use chaintrace::types::{Address, BlockRange, Direction};
//!
//! let addr: Address = "bc1qxy2kgdygjrsqtzq2n0yrf2493p83kkfjhx0wlh".into();
//! assert_eq!(Direction::Forward.opposite(), Direction::Backward);
//!
//! let range = BlockRange::new(Some(700_000), None);
//! assert!(range.is_bounded());
//! assert_eq!(BlockRange::OPEN.key_fragment(), "all");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque Bitcoin address (base58check or bech32).
///
/// The crate never parses or validates address encodings; an `Address` is
/// an identity used for map keys, set membership, and path elements.
/// Emptiness is rejected at the control-plane boundary, not here.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Abbreviated form for log lines (`bc1qxy2kgdygjrsqtz…`).
    #[must_use]
    pub fn short(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(16)
            .map(|(i, _)| i)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which seed set a search half started from.
///
/// `Forward` seeds from set A and seeks members of B; `Backward` seeds
/// from B and seeks A. The two halves run sequentially and share no
/// visited state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

/// Inclusive block-height bounds for a trace.
///
/// An unset end means "unbounded on that side". `Some(0)` is a genuine
/// bound: "not specified" is represented by `None`, never by zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub lo: Option<u64>,
    pub hi: Option<u64>,
}

impl BlockRange {
    /// Fully open range: every block height is admitted.
    pub const OPEN: BlockRange = BlockRange { lo: None, hi: None };

    #[must_use]
    pub fn new(lo: Option<u64>, hi: Option<u64>) -> Self {
        Self { lo, hi }
    }

    /// True when at least one end carries a bound.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.lo.is_some() || self.hi.is_some()
    }

    /// True when a height falls inside the range. Unknown heights are
    /// admitted only by a fully open range; a bounded range cannot place
    /// a transaction whose height it does not know.
    #[must_use]
    pub fn admits(&self, height: Option<u64>) -> bool {
        match height {
            None => !self.is_bounded(),
            Some(h) => self.lo.is_none_or(|lo| h >= lo) && self.hi.is_none_or(|hi| h <= hi),
        }
    }

    /// Stable rendering used in cache keys: `"lo-hi"` with `*` for an
    /// open end, or `"all"` when fully open.
    #[must_use]
    pub fn key_fragment(&self) -> String {
        if !self.is_bounded() {
            return "all".to_string();
        }
        let lo = self.lo.map_or_else(|| "*".to_string(), |v| v.to_string());
        let hi = self.hi.map_or_else(|| "*".to_string(), |v| v.to_string());
        format!("{lo}-{hi}")
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.lo, self.hi) {
            (None, None) => write!(f, "all blocks"),
            (Some(lo), None) => write!(f, "blocks {lo}.."),
            (None, Some(hi)) => write!(f, "blocks ..={hi}"),
            (Some(lo), Some(hi)) => write!(f, "blocks {lo}..={hi}"),
        }
    }
}
