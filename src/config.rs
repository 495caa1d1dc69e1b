//! Process configuration.
//!
//! All tunables are read once at process start from environment
//! variables (a `.env` file is honored via dotenvy), with the defaults
//! the tool has always shipped with. Malformed values fall back to the
//! default with a warning rather than aborting startup.

use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::cache::CacheConfig;
use crate::tx::FilterConfig;

/// Complete process configuration.
///
/// Filter and fan-out thresholds are sampled by each session when it
/// starts; a running traversal never sees mid-flight changes.
#[derive(Clone, Debug)]
pub struct Config {
    /// Upper bound on the depth a caller may request.
    pub max_depth: u32,
    /// Bound handed to tx-source backends per address query.
    pub max_transactions_per_address: usize,
    /// Relevance-filter thresholds and per-tx fan-out caps.
    pub filter: FilterConfig,
    /// Transaction-cache sizing.
    pub cache: CacheConfig,
    /// Interval between periodic checkpoints of a running session.
    pub checkpoint_interval: Duration,
    /// Directory holding checkpoint files.
    pub checkpoint_dir: PathBuf,
    /// Directory holding export files.
    pub export_dir: PathBuf,
    /// Grace period allowed for a cancelled task to write its final
    /// checkpoint before a force-delete abandons it.
    pub cancel_grace: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: 10,
            max_transactions_per_address: 50,
            filter: FilterConfig::default(),
            cache: CacheConfig::default(),
            checkpoint_interval: Duration::from_secs(300),
            checkpoint_dir: PathBuf::from("checkpoints"),
            export_dir: PathBuf::from("exports"),
            cancel_grace: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Build configuration from the environment, falling back to
    /// defaults key by key.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Config::default();
        let filter_defaults = FilterConfig::default();
        let cache_defaults = CacheConfig::default();

        let filter = FilterConfig {
            skip_distribution_max_inputs: env_or(
                "SKIP_DISTRIBUTION_MAX_INPUTS",
                filter_defaults.skip_distribution_max_inputs,
            ),
            skip_distribution_min_outputs: env_or(
                "SKIP_DISTRIBUTION_MIN_OUTPUTS",
                filter_defaults.skip_distribution_min_outputs,
            ),
            skip_mixer_input_threshold: env_or(
                "SKIP_MIXER_INPUT_THRESHOLD",
                filter_defaults.skip_mixer_input_threshold,
            ),
            skip_mixer_output_threshold: env_or(
                "SKIP_MIXER_OUTPUT_THRESHOLD",
                filter_defaults.skip_mixer_output_threshold,
            ),
            mixer_markers: filter_defaults.mixer_markers,
            exchange_wallet_threshold: env_or(
                "EXCHANGE_WALLET_THRESHOLD",
                filter_defaults.exchange_wallet_threshold,
            ),
            max_input_addresses_per_tx: env_or(
                "MAX_INPUT_ADDRESSES_PER_TX",
                filter_defaults.max_input_addresses_per_tx,
            ),
            max_output_addresses_per_tx: env_or(
                "MAX_OUTPUT_ADDRESSES_PER_TX",
                filter_defaults.max_output_addresses_per_tx,
            ),
        };

        let cache = CacheConfig {
            ttl: Duration::from_secs(env_or("CACHE_TTL_HOURS", 24u64) * 60 * 60),
            max_entry_bytes: env_or("CACHE_SINGLE_ENTRY_LIMIT_MB", 100usize) * 1024 * 1024,
            max_total_bytes: env_or("CACHE_MAX_SIZE_MB", 2048usize) * 1024 * 1024,
            prune_target: cache_defaults.prune_target,
        };

        Self {
            max_depth: env_or("MAX_DEPTH", defaults.max_depth),
            max_transactions_per_address: env_or(
                "MAX_TRANSACTIONS_PER_ADDRESS",
                defaults.max_transactions_per_address,
            ),
            filter,
            cache,
            checkpoint_interval: Duration::from_secs(env_or("CHECKPOINT_INTERVAL_SECS", 300u64)),
            checkpoint_dir: PathBuf::from(env_string("CHECKPOINT_DIR", "checkpoints")),
            export_dir: PathBuf::from(env_string("EXPORT_DIR", "exports")),
            cancel_grace: defaults.cancel_grace,
        }
    }
}

fn env_string(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or<T: std::str::FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "unparseable config value, using default");
            default
        }),
        Err(_) => default,
    }
}
