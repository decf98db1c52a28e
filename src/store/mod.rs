//! Durable, TTL- and capacity-bounded key-value storage.
//!
//! [`DurableTier`] is the fallible contract the tiered cache consumes.
//! [`PersistentStore`] implements it on SQLite and also offers best-effort
//! methods that log storage failures and degrade to a miss or a no-op.

#[cfg(feature = "sqlite")]
mod persistent;

#[cfg(feature = "sqlite")]
pub use persistent::PersistentStore;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::CacheResult;

/// Durable store statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Number of stored entries (expired ones included until purged).
    pub size: usize,

    /// Storage timestamp of the oldest entry.
    pub oldest_entry: Option<DateTime<Utc>>,
}

/// Slow, durable cache tier.
///
/// Implementations must never return expired data from `try_get`.
#[async_trait]
pub trait DurableTier<V: Send + Sync>: Send + Sync {
    /// Returns the backend name.
    fn name(&self) -> &str;

    /// Looks up a key.
    async fn try_get(&self, key: &str) -> CacheResult<Option<V>>;

    /// Stores a value; `None` uses the backend's default TTL.
    async fn try_set(&self, key: &str, value: &V, ttl: Option<Duration>) -> CacheResult<()>;

    /// Removes a key.
    async fn try_delete(&self, key: &str) -> CacheResult<()>;

    /// Removes every entry.
    async fn try_clear(&self) -> CacheResult<()>;

    /// Returns backend statistics.
    async fn try_stats(&self) -> CacheResult<StoreStats>;
}
