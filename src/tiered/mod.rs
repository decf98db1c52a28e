//! Two-tier cache: a bounded in-memory tier in front of an optional
//! durable tier.
//!
//! Reads go fast tier first, then durable tier; durable hits are promoted
//! into the fast tier. Writes go to both. Durable-tier failures are logged
//! and never reach the caller, so losing the durable tier only costs hit
//! rate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{BoundedCache, CacheStats};
use crate::store::{DurableTier, StoreStats};
use crate::types::config::TieredConfig;

/// Statistics for both tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TieredStats {
    /// In-memory tier.
    pub fast: CacheStats,

    /// Durable tier, absent when none is configured or it could not report.
    pub durable: Option<StoreStats>,
}

/// Fast in-memory tier backed by an optional durable tier.
///
/// A `set` TTL bounds only the durable copy. Fast-tier entries carry no
/// expiry and live until LRU eviction, `delete` or `clear`, so a key can
/// keep being served from memory after its durable copy has expired.
pub struct TieredCache<V> {
    fast: Mutex<FastTier<V>>,
    durable: Option<Arc<dyn DurableTier<V>>>,
}

/// In-memory tier plus a change counter for promotion.
struct FastTier<V> {
    cache: BoundedCache<V>,
    /// Bumped by every set, delete and clear. A durable read is promoted
    /// only if the epoch is unchanged since the read started.
    epoch: u64,
}

impl<V> FastTier<V> {
    fn new(capacity: usize) -> Self {
        Self {
            cache: BoundedCache::new(capacity),
            epoch: 0,
        }
    }

    fn bump(&mut self) -> &mut BoundedCache<V> {
        self.epoch = self.epoch.wrapping_add(1);
        &mut self.cache
    }
}

impl<V> TieredCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache with only the fast tier.
    pub fn new(fast_capacity: usize) -> Self {
        Self {
            fast: Mutex::new(FastTier::new(fast_capacity)),
            durable: None,
        }
    }

    /// Creates a cache with both tiers.
    pub fn with_durable(fast_capacity: usize, durable: Arc<dyn DurableTier<V>>) -> Self {
        tracing::info!(
            fast_capacity,
            durable = durable.name(),
            "Tiered cache created"
        );
        Self {
            fast: Mutex::new(FastTier::new(fast_capacity)),
            durable: Some(durable),
        }
    }

    /// Creates a cache from configuration, with `durable` as the slow tier.
    pub fn from_config(config: &TieredConfig, durable: Option<Arc<dyn DurableTier<V>>>) -> Self {
        match durable {
            Some(durable) => Self::with_durable(config.fast_capacity, durable),
            None => Self::new(config.fast_capacity),
        }
    }

    fn fast(&self) -> MutexGuard<'_, FastTier<V>> {
        self.fast.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copies a durable value into the fast tier unless a set, delete or
    /// clear ran since `epoch` was read.
    fn promote(&self, key: &str, value: V, epoch: u64) -> bool {
        let mut fast = self.fast();
        if fast.epoch != epoch {
            return false;
        }
        fast.cache.set(key, value);
        true
    }

    /// Whether a durable tier is configured.
    pub fn has_durable(&self) -> bool {
        self.durable.is_some()
    }

    /// Looks up a key, promoting durable hits into the fast tier.
    pub async fn get(&self, key: &str) -> Option<V> {
        let epoch = {
            let mut fast = self.fast();
            if let Some(value) = fast.cache.get(key).cloned() {
                return Some(value);
            }
            fast.epoch
        };

        let durable = self.durable.as_ref()?;
        match durable.try_get(key).await {
            Ok(Some(value)) => {
                if self.promote(key, value.clone(), epoch) {
                    tracing::debug!(key, tier = durable.name(), "Promoted durable hit");
                } else {
                    tracing::debug!(key, tier = durable.name(), "Skipped promotion after concurrent change");
                }
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, tier = durable.name(), error = %e, "Durable lookup failed");
                None
            }
        }
    }

    /// Checks the fast tier only.
    pub fn has_fast(&self, key: &str) -> bool {
        self.fast().cache.has(key)
    }

    /// Writes to the fast tier, then to the durable tier if configured.
    ///
    /// `ttl` applies to the durable copy; `None` uses the durable tier's
    /// default. Fast-tier entries leave only by eviction, `delete` or
    /// `clear`.
    pub async fn set(&self, key: &str, value: V, ttl: Option<Duration>) {
        let durable_copy = self.durable.as_ref().map(|_| value.clone());
        self.fast().bump().set(key, value);

        if let (Some(durable), Some(value)) = (self.durable.as_ref(), durable_copy) {
            if let Err(e) = durable.try_set(key, &value, ttl).await {
                tracing::warn!(key, tier = durable.name(), error = %e, "Durable write failed");
            }
        }
    }

    /// Removes a key from both tiers.
    pub async fn delete(&self, key: &str) {
        self.fast().bump().delete(key);

        if let Some(durable) = &self.durable {
            if let Err(e) = durable.try_delete(key).await {
                tracing::warn!(key, tier = durable.name(), error = %e, "Durable delete failed");
            }
            // a read that started before the durable delete may have promoted
            self.fast().bump().delete(key);
        }
    }

    /// Empties both tiers and resets fast-tier counters.
    pub async fn clear(&self) {
        self.fast().bump().clear();

        if let Some(durable) = &self.durable {
            if let Err(e) = durable.try_clear().await {
                tracing::warn!(tier = durable.name(), error = %e, "Durable clear failed");
            }
            self.fast().bump().clear();
        }
        tracing::info!("Tiered cache cleared");
    }

    /// Statistics for both tiers.
    pub async fn stats(&self) -> TieredStats {
        let fast = self.fast().cache.stats();

        let durable = match &self.durable {
            Some(durable) => match durable.try_stats().await {
                Ok(stats) => Some(stats),
                Err(e) => {
                    tracing::warn!(tier = durable.name(), error = %e, "Durable stats failed");
                    None
                }
            },
            None => None,
        };

        TieredStats { fast, durable }
    }

    /// Promotes durable entries for `keys` missing from the fast tier.
    ///
    /// Returns how many keys were promoted.
    pub async fn warmup(&self, keys: &[String]) -> usize {
        let Some(durable) = &self.durable else {
            return 0;
        };

        let mut promoted = 0;
        for key in keys {
            let epoch = {
                let fast = self.fast();
                if fast.cache.has(key) {
                    continue;
                }
                fast.epoch
            };
            match durable.try_get(key).await {
                Ok(Some(value)) => {
                    if self.promote(key, value, epoch) {
                        promoted += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Warmup lookup failed");
                }
            }
        }

        tracing::info!(requested = keys.len(), promoted, "Tiered warmup finished");
        promoted
    }
}
