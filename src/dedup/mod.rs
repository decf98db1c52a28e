//! Deduplicating, time-boxed result cache.
//!
//! Concurrent callers asking for the same key share one in-flight
//! computation; finished results are kept per [`QueryKind`] for a time to
//! live. Failures are delivered to every waiter and never cached.

mod pending;
mod resolver;

pub use resolver::DedupingResultCache;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::analysis::{Analysis, EvaluationResult};

/// Maximum number of keys resolved by a single warmup call.
pub const WARMUP_LIMIT: usize = 10;

/// Rough per-entry footprint used for memory estimates (in bytes).
pub const ESTIMATED_ENTRY_BYTES: usize = 1024;

/// Logical query type. Each kind has its own bounded cache, capacity and TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    /// Full position evaluation.
    Evaluate,
    /// Best-move lookup.
    BestMove,
}

impl std::fmt::Display for QueryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueryKind::Evaluate => write!(f, "evaluate"),
            QueryKind::BestMove => write!(f, "best_move"),
        }
    }
}

/// Decides whether a computed value may be stored.
pub trait Cacheable {
    /// Returns `false` for values that must never be cached.
    fn is_cacheable(&self) -> bool {
        true
    }
}

impl<T> Cacheable for Option<T> {
    fn is_cacheable(&self) -> bool {
        self.is_some()
    }
}

impl Cacheable for Analysis {}
impl Cacheable for EvaluationResult {}
impl Cacheable for String {}
impl Cacheable for i32 {}
impl Cacheable for i64 {}
impl Cacheable for u32 {}
impl Cacheable for u64 {}

impl Cacheable for serde_json::Value {
    fn is_cacheable(&self) -> bool {
        !self.is_null()
    }
}

/// Settings for one query kind.
#[derive(Debug, Clone, PartialEq)]
pub struct KindConfig {
    /// Maximum number of cached results. Zero disables result caching.
    pub capacity: usize,

    /// How long a result stays fresh.
    pub ttl: Duration,

    /// Maximum age of an in-flight request that new callers may join.
    pub dedup_window: Duration,
}

/// Settings for a [`DedupingResultCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct DedupConfig {
    /// Evaluation results.
    pub evaluate: KindConfig,

    /// Best-move results.
    pub best_move: KindConfig,

    /// Period of the stale in-flight request sweep.
    pub sweep_interval: Duration,
}

impl DedupConfig {
    /// Settings for a query kind.
    pub fn kind(&self, kind: QueryKind) -> &KindConfig {
        match kind {
            QueryKind::Evaluate => &self.evaluate,
            QueryKind::BestMove => &self.best_move,
        }
    }
}

impl Default for DedupConfig {
    fn default() -> Self {
        (&crate::types::config::CacheConfig::default()).into()
    }
}

/// Aggregated statistics across every query kind.
///
/// `hits`, `misses` and `hit_rate` combine all kinds, so the rate is
/// weighted by lookup volume and may differ from each kind's own rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DedupStats {
    /// Result cache hits.
    pub hits: u64,

    /// Result cache misses.
    pub misses: u64,

    /// Combined hit rate.
    pub hit_rate: f64,

    /// Cached results across all kinds.
    pub size: usize,

    /// Combined capacity.
    pub capacity: usize,

    /// Callers that joined an in-flight request.
    pub dedup_hits: u64,

    /// Callers that started a new computation.
    pub dedup_misses: u64,

    /// Requests currently in flight.
    pub pending: usize,

    /// Estimated memory used by cached results, in bytes.
    pub estimated_memory_bytes: usize,
}
