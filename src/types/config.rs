//! Configuration for evalcache.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dedup::{DedupConfig, KindConfig};
use crate::CacheResult;

/// Main configuration for evalcache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// In-memory result cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Durable store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Tiered cache settings.
    #[serde(default)]
    pub tiered: TieredConfig,
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

/// Result cache settings, one section per query kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// How often stale in-flight requests are swept (in seconds).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Settings for position evaluations.
    #[serde(default = "default_evaluate")]
    pub evaluate: QueryCacheConfig,

    /// Settings for best-move lookups.
    #[serde(default = "default_best_move")]
    pub best_move: QueryCacheConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            evaluate: default_evaluate(),
            best_move: default_best_move(),
        }
    }
}

fn default_evaluate() -> QueryCacheConfig {
    QueryCacheConfig::new(1000, 300)
}

fn default_best_move() -> QueryCacheConfig {
    QueryCacheConfig::new(500, 600)
}

fn default_sweep_interval() -> u64 {
    30
}

/// Cache settings for a single query kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryCacheConfig {
    /// Maximum number of entries. Zero disables caching for this kind.
    pub capacity: usize,

    /// Entry time to live in seconds.
    pub ttl_secs: u64,

    /// Maximum age of an in-flight request that new callers may join (in ms).
    #[serde(default = "default_dedup_window")]
    pub dedup_window_ms: u64,
}

impl QueryCacheConfig {
    /// Creates a new per-kind configuration with the default dedup window.
    pub fn new(capacity: usize, ttl_secs: u64) -> Self {
        Self {
            capacity,
            ttl_secs,
            dedup_window_ms: default_dedup_window(),
        }
    }
}

fn default_dedup_window() -> u64 {
    5_000
}

impl From<&QueryCacheConfig> for KindConfig {
    fn from(config: &QueryCacheConfig) -> Self {
        KindConfig {
            capacity: config.capacity,
            ttl: Duration::from_secs(config.ttl_secs),
            dedup_window: Duration::from_millis(config.dedup_window_ms),
        }
    }
}

impl From<&CacheConfig> for DedupConfig {
    fn from(config: &CacheConfig) -> Self {
        DedupConfig {
            evaluate: (&config.evaluate).into(),
            best_move: (&config.best_move).into(),
            sweep_interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        }
    }
}

/// Durable store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// SQLite database path.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Namespace isolating this store's entries inside the database.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Maximum number of entries before a cleanup pass runs.
    #[serde(default = "default_store_capacity")]
    pub capacity: usize,

    /// Time to live applied when the caller gives none (in seconds).
    #[serde(default = "default_store_ttl")]
    pub default_ttl_secs: u64,

    /// Background cleanup interval (in seconds).
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: default_db_path(),
            namespace: default_namespace(),
            capacity: default_store_capacity(),
            default_ttl_secs: default_store_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

impl StoreConfig {
    /// Default entry TTL as a [`Duration`].
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_secs)
    }

    /// Cleanup interval as a [`Duration`].
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs.max(1))
    }
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> PathBuf {
    PathBuf::from(".evalcache/store.db")
}

fn default_namespace() -> String {
    "evaluations".to_string()
}

fn default_store_capacity() -> usize {
    10_000
}

fn default_store_ttl() -> u64 {
    7 * 24 * 60 * 60 // 7 days
}

fn default_cleanup_interval() -> u64 {
    3600
}

/// Tiered cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TieredConfig {
    /// Capacity of the in-memory fast tier.
    #[serde(default = "default_fast_capacity")]
    pub fast_capacity: usize,
}

impl Default for TieredConfig {
    fn default() -> Self {
        Self {
            fast_capacity: default_fast_capacity(),
        }
    }
}

fn default_fast_capacity() -> usize {
    500
}

impl Config {
    /// Loads configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> CacheResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Saves configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> CacheResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Creates default configuration.
    pub fn default_config() -> Self {
        Self {
            general: GeneralConfig::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            tiered: TieredConfig::default(),
        }
    }

    /// Tries to load configuration from current directory or uses default.
    pub fn load_or_default() -> Self {
        Self::load("evalcache.toml").unwrap_or_else(|_| Self::default_config())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}
