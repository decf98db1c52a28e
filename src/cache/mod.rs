//! In-memory cache primitives.
//!
//! [`BoundedCache`] is a fixed-capacity LRU store with hit/miss counters.
//! The result caches built on top of it wrap values in a [`CacheEntry`] so
//! they can apply a time to live.

mod bounded;
mod entry;
pub mod key;

pub use bounded::{BoundedCache, CacheStats};
pub use entry::CacheEntry;
