#![allow(dead_code)]

//! Shared fixtures: a scripted deterministic tx source and helpers for
//! building transactions, configs, and waiting on session lifecycles.

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chaintrace::cache::{CacheConfig, MemoryTxCache};
use chaintrace::config::Config;
use chaintrace::sessions::{SessionManager, SessionStatus};
use chaintrace::source::{SourceError, TxSource};
use chaintrace::tx::NormalizedTx;
use chaintrace::types::{Address, BlockRange};

/// Deterministic in-memory tx source: every address maps to a fixed
/// transaction list, optionally delayed (to leave room for cancellation
/// mid-trace) or failing (to exercise transient-io handling).
#[derive(Default)]
pub struct ScriptedTxSource {
    txs: FxHashMap<Address, Vec<NormalizedTx>>,
    ranges: FxHashMap<Address, (u64, u64)>,
    failing: Vec<Address>,
    panicking: Vec<Address>,
    delay: Option<Duration>,
}

impl ScriptedTxSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_txs(mut self, address: &str, txs: Vec<NormalizedTx>) -> Self {
        self.txs.insert(address.into(), txs);
        self
    }

    /// Register a transaction under every address it touches, the way a
    /// real indexer would serve it.
    pub fn with_tx(mut self, tx: NormalizedTx) -> Self {
        let mut touched: Vec<Address> = Vec::new();
        for input in &tx.inputs {
            if let Some(addr) = &input.address {
                if !touched.contains(addr) {
                    touched.push(addr.clone());
                }
            }
        }
        for output in &tx.outputs {
            if let Some(addr) = &output.address {
                if !touched.contains(addr) {
                    touched.push(addr.clone());
                }
            }
        }
        for addr in touched {
            self.txs.entry(addr).or_default().push(tx.clone());
        }
        self
    }

    pub fn with_range(mut self, address: &str, earliest: u64, latest: u64) -> Self {
        self.ranges.insert(address.into(), (earliest, latest));
        self
    }

    pub fn with_failure(mut self, address: &str) -> Self {
        self.failing.push(address.into());
        self
    }

    /// Panic when this address is queried, to exercise the session
    /// task's fatal-internal handling.
    pub fn with_panic(mut self, address: &str) -> Self {
        self.panicking.push(address.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl TxSource for ScriptedTxSource {
    async fn address_transactions(
        &self,
        address: &Address,
        range: &BlockRange,
    ) -> Result<Vec<NormalizedTx>, SourceError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panicking.contains(address) {
            panic!("scripted panic for {address}");
        }
        if self.failing.contains(address) {
            return Err(SourceError::Transport {
                message: format!("scripted failure for {address}"),
            });
        }
        Ok(self
            .txs
            .get(address)
            .map(|txs| {
                txs.iter()
                    .filter(|tx| !range.is_bounded() || range.admits(tx.block_height))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn address_block_range(
        &self,
        address: &Address,
    ) -> Result<Option<(u64, u64)>, SourceError> {
        Ok(self.ranges.get(address).copied())
    }
}

/// A transaction spending from `inputs` to `outputs`, one ref each.
pub fn spend(txid: &str, height: u64, inputs: &[&str], outputs: &[&str]) -> NormalizedTx {
    let mut tx = NormalizedTx::new(txid, Some(height));
    for addr in inputs {
        tx = tx.with_input(Some((*addr).into()));
    }
    for addr in outputs {
        tx = tx.with_output(Some((*addr).into()), 10_000);
    }
    tx
}

pub fn addresses(raw: &[&str]) -> Vec<Address> {
    raw.iter().map(|a| (*a).into()).collect()
}

/// Config pointed at temp directories, with a checkpoint interval long
/// enough to stay out of the way unless a test opts in.
pub fn test_config(dir: &Path) -> Config {
    Config {
        checkpoint_dir: dir.join("checkpoints"),
        export_dir: dir.join("exports"),
        checkpoint_interval: Duration::from_secs(120),
        cancel_grace: Duration::from_secs(2),
        ..Config::default()
    }
}

pub fn memory_cache() -> Arc<MemoryTxCache> {
    Arc::new(MemoryTxCache::new(CacheConfig::default()))
}

/// Poll a session until it leaves the active states; panics after five
/// seconds, which means the traversal wedged.
pub async fn wait_for_terminal(manager: &SessionManager, session_id: &str) -> SessionStatus {
    for _ in 0..500 {
        let status = manager
            .status(session_id)
            .expect("session should be registered")
            .record
            .status;
        if !status.is_active() {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("session {session_id} never reached a terminal status");
}
