//! Timestamped cache entries.

use std::time::Duration;

use tokio::time::Instant;

/// Value stored in a result cache.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// Cached value.
    pub value: V,

    /// When the value was stored.
    pub stored_at: Instant,
}

impl<V> CacheEntry<V> {
    /// Wraps a value stamped with the current time.
    pub fn new(value: V) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
        }
    }

    /// Time elapsed since the value was stored.
    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    /// Whether the entry is older than `ttl`.
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() > ttl
    }
}
