//! Transaction cache consumed by the traversal engine.
//!
//! The engine treats the cache as a hint: a miss merely forces a source
//! fetch. [`MemoryTxCache`] is the in-process implementation — TTL
//! invalidation, a per-entry size cap (oversized entries are simply not
//! stored), and a total-size cap pruned oldest-first to a target
//! fraction. Durable backends can be supplied by embedding applications.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::tx::NormalizedTx;
use crate::types::{Address, BlockRange};

/// Content-addressed transaction store keyed by `(address, block range)`.
#[async_trait]
pub trait TxCache: Send + Sync {
    /// Cached transactions for the key, or `None` on miss/expiry.
    async fn get(&self, address: &Address, range: &BlockRange) -> Option<Vec<NormalizedTx>>;

    /// Store transactions under the key. Best-effort; failures are the
    /// implementation's concern and never surface to the traversal.
    async fn put(&self, address: &Address, range: &BlockRange, txs: &[NormalizedTx]);
}

/// Sizing and retention knobs for [`MemoryTxCache`].
#[derive(Clone, Copy, Debug)]
pub struct CacheConfig {
    /// Entries older than this are treated as misses and dropped.
    pub ttl: Duration,
    /// Entries whose serialized form exceeds this are not stored.
    pub max_entry_bytes: usize,
    /// Total serialized size above which the cache prunes.
    pub max_total_bytes: usize,
    /// Fraction of `max_total_bytes` to prune down to.
    pub prune_target: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(24 * 60 * 60),
            max_entry_bytes: 100 * 1024 * 1024,
            max_total_bytes: 2048 * 1024 * 1024,
            prune_target: 0.7,
        }
    }
}

struct CacheEntry {
    txs: Vec<NormalizedTx>,
    stored_at: Instant,
    size_bytes: usize,
}

/// In-process [`TxCache`] with TTL and size-bounded retention.
pub struct MemoryTxCache {
    config: CacheConfig,
    inner: RwLock<FxHashMap<String, CacheEntry>>,
}

impl MemoryTxCache {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(FxHashMap::default()),
        }
    }

    fn key(address: &Address, range: &BlockRange) -> String {
        format!("{}:{}", address, range.key_fragment())
    }

    /// Number of live entries (expired entries may still be counted until
    /// their next lookup).
    pub fn len(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn total_bytes(map: &FxHashMap<String, CacheEntry>) -> usize {
        map.values().map(|e| e.size_bytes).sum()
    }

    fn prune_oldest(&self, map: &mut FxHashMap<String, CacheEntry>) {
        let target = (self.config.max_total_bytes as f64 * self.config.prune_target) as usize;
        let mut by_age: Vec<(String, Instant, usize)> = map
            .iter()
            .map(|(k, e)| (k.clone(), e.stored_at, e.size_bytes))
            .collect();
        by_age.sort_by_key(|(_, stored_at, _)| *stored_at);

        let mut total = Self::total_bytes(map);
        let before = total;
        for (key, _, size) in by_age {
            if total <= target {
                break;
            }
            map.remove(&key);
            total = total.saturating_sub(size);
        }
        debug!(before, after = total, "pruned tx cache");
    }
}

#[async_trait]
impl TxCache for MemoryTxCache {
    async fn get(&self, address: &Address, range: &BlockRange) -> Option<Vec<NormalizedTx>> {
        let key = Self::key(address, range);
        {
            let map = self.inner.read().ok()?;
            if let Some(entry) = map.get(&key) {
                if entry.stored_at.elapsed() < self.config.ttl {
                    return Some(entry.txs.clone());
                }
            } else {
                return None;
            }
        }
        // Expired: drop the stale entry before reporting a miss.
        if let Ok(mut map) = self.inner.write() {
            map.remove(&key);
        }
        None
    }

    async fn put(&self, address: &Address, range: &BlockRange, txs: &[NormalizedTx]) {
        if txs.is_empty() {
            return;
        }
        let size_bytes = match serde_json::to_vec(txs) {
            Ok(bytes) => bytes.len(),
            Err(err) => {
                warn!(%address, error = %err, "could not size cache entry, skipping");
                return;
            }
        };
        if size_bytes > self.config.max_entry_bytes {
            debug!(%address, size_bytes, "entry exceeds per-entry cap, not cached");
            return;
        }

        let Ok(mut map) = self.inner.write() else {
            return;
        };
        map.insert(
            Self::key(address, range),
            CacheEntry {
                txs: txs.to_vec(),
                stored_at: Instant::now(),
                size_bytes,
            },
        );
        if Self::total_bytes(&map) > self.config.max_total_bytes {
            self.prune_oldest(&mut map);
        }
    }
}
