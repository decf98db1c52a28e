//! # evalcache
//!
//! Caching and request deduplication for chess position analysis.
//!
//! Evaluating a position is expensive, so repeated or concurrent requests
//! for the same position should reach the engine once.
//!
//! ## Modules
//!
//! - [`cache`] - Fixed-capacity LRU cache and cache key builders
//! - [`dedup`] - Time-boxed result cache with in-flight deduplication
//! - [`store`] - Durable SQLite store with TTL and capacity cleanup
//! - [`tiered`] - Fast in-memory tier in front of a durable tier
//! - [`engine`] - Evaluator contract and the analysis cache facade
//! - [`maintenance`] - Owned periodic background tasks
//! - [`cli`] - Command line interface
//! - [`types`] - Shared types

pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod dedup;
pub mod engine;
pub mod maintenance;
pub mod store;
pub mod tiered;
pub mod types;

pub use types::config::Config;
pub use types::errors::{CacheError, CacheResult, EvaluatorError};
