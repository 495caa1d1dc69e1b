//! Optional pre-pass narrowing the search window.
//!
//! Queries every origin address for its earliest observed block and every
//! destination for its latest, then intersects with the user-requested
//! range. Purely an optimization: an address the source knows nothing
//! about contributes no bound, and an empty probe leaves the user range
//! untouched.

use tracing::{debug, warn};

use crate::source::TxSource;
use crate::types::{Address, BlockRange};

/// Result of the block-range probe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbedRange {
    /// Range as the user requested it.
    pub user: BlockRange,
    /// Bounds the probe observed (earliest across A, latest across B).
    pub detected: BlockRange,
    /// Intersection actually used by the traversal.
    pub effective: BlockRange,
}

/// Probe the source for activity bounds and fold them into `user`.
///
/// `effective.lo` is the tighter of the user's lower bound and the
/// earliest activity across `origins`; `effective.hi` the tighter of the
/// user's upper bound and the latest activity across `destinations`.
pub async fn probe_effective_range(
    source: &dyn TxSource,
    origins: &[Address],
    destinations: &[Address],
    user: BlockRange,
) -> ProbedRange {
    let mut earliest: Option<u64> = None;
    for address in origins {
        match source.address_block_range(address).await {
            Ok(Some((lo, _))) => {
                debug!(address = address.short(), earliest = lo, "probe: origin activity");
                earliest = Some(earliest.map_or(lo, |e| e.min(lo)));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(address = address.short(), error = %err, "probe failed for origin, skipping");
            }
        }
    }

    let mut latest: Option<u64> = None;
    for address in destinations {
        match source.address_block_range(address).await {
            Ok(Some((_, hi))) => {
                debug!(address = address.short(), latest = hi, "probe: destination activity");
                latest = Some(latest.map_or(hi, |l| l.max(hi)));
            }
            Ok(None) => {}
            Err(err) => {
                warn!(address = address.short(), error = %err, "probe failed for destination, skipping");
            }
        }
    }

    let detected = BlockRange::new(earliest, latest);
    let effective = BlockRange::new(
        max_bound(user.lo, earliest),
        min_bound(user.hi, latest),
    );
    debug!(%detected, %effective, "probe finished");

    ProbedRange {
        user,
        detected,
        effective,
    }
}

fn max_bound(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (bound, None) | (None, bound) => bound,
    }
}

fn min_bound(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (bound, None) | (None, bound) => bound,
    }
}
