//! Fixed-capacity LRU cache with hit/miss statistics.

use std::num::NonZeroUsize;

use lru::LruCache;
use serde::{Deserialize, Serialize};

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Current number of entries.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Number of cache hits.
    pub hits: u64,

    /// Number of cache misses.
    pub misses: u64,
}

impl CacheStats {
    /// Computes the hit rate, or 0 when nothing was looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Adds another cache's counters to this one.
    pub fn merge(&mut self, other: &CacheStats) {
        self.size += other.size;
        self.capacity += other.capacity;
        self.hits += other.hits;
        self.misses += other.misses;
    }
}

/// Fixed-capacity associative store keyed by string with LRU eviction.
///
/// Recency is bumped by both [`get`](Self::get) and [`set`](Self::set).
/// A capacity of zero disables the cache: every `set` is a no-op and
/// every `get` misses.
pub struct BoundedCache<V> {
    cache: Option<LruCache<String, V>>,
    hits: u64,
    misses: u64,
}

impl<V> BoundedCache<V> {
    /// Creates a new cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: NonZeroUsize::new(capacity).map(LruCache::new),
            hits: 0,
            misses: 0,
        }
    }

    /// Looks up a key and marks it most recently used.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        let found = self.cache.as_mut().and_then(|c| c.get(key));
        if found.is_some() {
            self.hits += 1;
        } else {
            self.misses += 1;
        }
        found
    }

    /// Looks up a key, treating entries rejected by `is_valid` as absent.
    ///
    /// Rejected entries are removed on the spot and counted as a miss.
    pub fn get_valid<F>(&mut self, key: &str, is_valid: F) -> Option<&V>
    where
        F: FnOnce(&V) -> bool,
    {
        let Some(cache) = self.cache.as_mut() else {
            self.misses += 1;
            return None;
        };

        // peek first so an expired entry does not get its recency bumped
        match cache.peek(key).map(is_valid) {
            Some(true) => {
                self.hits += 1;
                cache.get(key)
            }
            Some(false) => {
                cache.pop(key);
                self.misses += 1;
                None
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Returns a value without touching recency or statistics.
    pub fn peek(&self, key: &str) -> Option<&V> {
        self.cache.as_ref().and_then(|c| c.peek(key))
    }

    /// Inserts or replaces a value; the key becomes most recently used.
    ///
    /// Returns the evicted key when a new key pushed out the least recently
    /// used one.
    pub fn set(&mut self, key: impl Into<String>, value: V) -> Option<String> {
        let cache = self.cache.as_mut()?;
        let key = key.into();
        match cache.push(key.clone(), value) {
            Some((evicted, _)) if evicted != key => {
                tracing::trace!(key = %evicted, "Evicted least recently used entry");
                Some(evicted)
            }
            _ => None,
        }
    }

    /// Checks whether a key is present without touching recency.
    pub fn has(&self, key: &str) -> bool {
        self.cache.as_ref().is_some_and(|c| c.contains(key))
    }

    /// Removes a key. Returns whether it was present.
    pub fn delete(&mut self, key: &str) -> bool {
        self.cache
            .as_mut()
            .is_some_and(|c| c.pop(key).is_some())
    }

    /// Removes every entry whose key does not satisfy `keep`.
    ///
    /// Returns the number of removed entries.
    pub fn retain_keys<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&str) -> bool,
    {
        let doomed: Vec<String> = self
            .cache
            .iter()
            .flat_map(|c| c.iter())
            .filter(|(k, _)| !keep(k))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &doomed {
            self.delete(key);
        }
        doomed.len()
    }

    /// Removes every entry and resets the hit/miss counters.
    pub fn clear(&mut self) {
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        self.hits = 0;
        self.misses = 0;
    }

    /// Keys ordered from least recently used to most recently used.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .cache
            .iter()
            .flat_map(|c| c.iter())
            .map(|(k, _)| k.clone())
            .collect();
        keys.reverse();
        keys
    }

    /// Current number of entries.
    pub fn len(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.len())
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Maximum number of entries (zero when disabled).
    pub fn capacity(&self) -> usize {
        self.cache.as_ref().map_or(0, |c| c.cap().get())
    }

    /// Returns cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.len(),
            capacity: self.capacity(),
            hits: self.hits,
            misses: self.misses,
        }
    }
}

impl<V> std::fmt::Debug for BoundedCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("size", &self.len())
            .field("capacity", &self.capacity())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}
