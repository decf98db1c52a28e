//! In-flight request bookkeeping.

use std::collections::HashMap;
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use tokio::time::Instant;

use crate::types::errors::EvaluatorError;

use super::QueryKind;

/// Outcome of one computation, cloneable for every waiter.
pub(crate) type SharedResult<V> = Shared<BoxFuture<'static, Result<V, EvaluatorError>>>;

/// One in-flight computation.
pub(crate) struct PendingRequest<V> {
    pub id: u64,
    pub future: SharedResult<V>,
    pub started_at: Instant,
    pub dedup_window: Duration,
}

impl<V> PendingRequest<V> {
    /// Whether a new caller may still join this request.
    pub fn is_joinable(&self) -> bool {
        self.started_at.elapsed() <= self.dedup_window
    }

    /// Whether the request has outlived twice its window and should be
    /// forgotten.
    pub fn is_stale(&self) -> bool {
        self.started_at.elapsed() > self.dedup_window * 2
    }
}

/// In-flight requests keyed by query kind and cache key.
pub(crate) struct PendingMap<V> {
    requests: HashMap<(QueryKind, String), PendingRequest<V>>,
    next_id: u64,
}

impl<V> PendingMap<V> {
    pub fn new() -> Self {
        Self {
            requests: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn get(&self, kind: QueryKind, key: &str) -> Option<&PendingRequest<V>> {
        self.requests.get(&(kind, key.to_string()))
    }

    pub fn insert(&mut self, kind: QueryKind, key: String, request: PendingRequest<V>) {
        self.requests.insert((kind, key), request);
    }

    /// Removes the request for `key` only if it is still the one with `id`.
    pub fn remove_if_current(&mut self, kind: QueryKind, key: &str, id: u64) -> bool {
        let slot = (kind, key.to_string());
        if self.requests.get(&slot).is_some_and(|r| r.id == id) {
            self.requests.remove(&slot);
            true
        } else {
            false
        }
    }

    /// Drops requests older than twice their dedup window.
    pub fn sweep_stale(&mut self) -> usize {
        let before = self.requests.len();
        self.requests.retain(|(kind, key), request| {
            let keep = !request.is_stale();
            if !keep {
                tracing::warn!(
                    %kind,
                    key = %key,
                    age_ms = request.started_at.elapsed().as_millis() as u64,
                    "Dropping stale in-flight request"
                );
            }
            keep
        });
        before - self.requests.len()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn clear(&mut self) {
        self.requests.clear();
    }
}
