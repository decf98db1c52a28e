//! Deduplicating result cache.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::future::{join_all, FutureExt};
use tokio::time::Instant;

use crate::cache::key::AUX_PREFIX;
use crate::cache::{key, BoundedCache, CacheEntry, CacheStats};
use crate::maintenance::MaintenanceTask;
use crate::types::errors::EvaluatorError;

use super::pending::{PendingMap, PendingRequest, SharedResult};
use super::{Cacheable, DedupConfig, DedupStats, QueryKind, ESTIMATED_ENTRY_BYTES, WARMUP_LIMIT};

/// Result cache that also collapses concurrent identical requests.
///
/// Lookup order for [`resolve`](Self::resolve):
///
/// 1. an in-flight request for the key younger than the dedup window is
///    joined;
/// 2. a cached result younger than the TTL is returned;
/// 3. otherwise the computation is started once, registered as in-flight,
///    and its outcome is shared by every caller that joins it.
///
/// Computations run on their own tokio task: a caller that stops awaiting
/// does not cancel them, and their result is still cached.
pub struct DedupingResultCache<V> {
    inner: Arc<Inner<V>>,
    sweeper: MaintenanceTask,
}

struct Inner<V> {
    config: DedupConfig,
    state: Mutex<State<V>>,
}

struct State<V> {
    evaluations: BoundedCache<CacheEntry<V>>,
    best_moves: BoundedCache<CacheEntry<V>>,
    pending: PendingMap<V>,
    dedup_hits: u64,
    dedup_misses: u64,
    // bumped by clear(); computations from an older generation are not cached
    generation: u64,
}

impl<V> State<V> {
    fn cache_mut(&mut self, kind: QueryKind) -> &mut BoundedCache<CacheEntry<V>> {
        match kind {
            QueryKind::Evaluate => &mut self.evaluations,
            QueryKind::BestMove => &mut self.best_moves,
        }
    }
}

impl<V: Clone> State<V> {
    /// Joins a registered request that is still inside its dedup window.
    fn join_in_flight(&mut self, kind: QueryKind, key: &str) -> Option<SharedResult<V>> {
        let future = self
            .pending
            .get(kind, key)
            .filter(|pending| pending.is_joinable())
            .map(|pending| pending.future.clone())?;

        self.dedup_hits += 1;
        tracing::debug!(%kind, key, "Joining in-flight request");
        Some(future)
    }
}

enum Lookup<V> {
    Cached(V),
    InFlight(SharedResult<V>),
}

impl<V> Inner<V>
where
    V: Cacheable + Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called by the computation task once it finishes.
    fn settle(
        &self,
        kind: QueryKind,
        key: &str,
        id: u64,
        generation: u64,
        result: &Result<V, EvaluatorError>,
    ) {
        let mut state = self.lock();
        state.pending.remove_if_current(kind, key, id);

        match result {
            Ok(_) if generation != state.generation => {
                tracing::debug!(%kind, key, "Cache cleared while computing, result not stored");
            }
            Ok(value) if value.is_cacheable() => {
                state.cache_mut(kind).set(key, CacheEntry::new(value.clone()));
                tracing::debug!(%kind, key, "Result cached");
            }
            Ok(_) => {
                tracing::debug!(%kind, key, "Result not cacheable");
            }
            Err(e) => {
                tracing::debug!(%kind, key, error = %e, "Computation failed, nothing cached");
            }
        }
    }

    fn sweep_stale(&self) -> usize {
        let removed = self.lock().pending.sweep_stale();
        if removed > 0 {
            tracing::info!(removed, "Swept stale in-flight requests");
        }
        removed
    }
}

impl<V> DedupingResultCache<V>
where
    V: Cacheable + Clone + Send + Sync + 'static,
{
    /// Creates the cache and starts its stale-request sweeper.
    pub fn new(config: DedupConfig) -> Self {
        let state = State {
            evaluations: BoundedCache::new(config.evaluate.capacity),
            best_moves: BoundedCache::new(config.best_move.capacity),
            pending: PendingMap::new(),
            dedup_hits: 0,
            dedup_misses: 0,
            generation: 0,
        };

        let period = config.sweep_interval;
        let inner = Arc::new(Inner {
            config,
            state: Mutex::new(state),
        });

        let sweeper = MaintenanceTask::spawn("pending-sweep", &inner, period, |inner: Arc<Inner<V>>| async move {
            inner.sweep_stale();
        });

        Self { inner, sweeper }
    }

    /// Cache configuration.
    pub fn config(&self) -> &DedupConfig {
        &self.inner.config
    }

    /// Resolves `key` with the kind's configured TTL and dedup window.
    pub async fn resolve<F, Fut>(
        &self,
        kind: QueryKind,
        key: &str,
        compute: F,
    ) -> Result<V, EvaluatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, EvaluatorError>> + Send + 'static,
    {
        let settings = self.inner.config.kind(kind);
        let (ttl, window) = (settings.ttl, settings.dedup_window);
        self.resolve_with(kind, key, ttl, window, compute).await
    }

    /// Resolves `key` with an explicit TTL and dedup window.
    pub async fn resolve_with<F, Fut>(
        &self,
        kind: QueryKind,
        key: &str,
        ttl: Duration,
        dedup_window: Duration,
        compute: F,
    ) -> Result<V, EvaluatorError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, EvaluatorError>> + Send + 'static,
    {
        let lookup = {
            let mut state = self.inner.lock();

            match state.join_in_flight(kind, key) {
                Some(future) => Some(Lookup::InFlight(future)),
                None => state
                    .cache_mut(kind)
                    .get_valid(key, |entry| !entry.is_expired(ttl))
                    .map(|entry| {
                        tracing::debug!(%kind, key, "Cache hit");
                        Lookup::Cached(entry.value.clone())
                    }),
            }
        };

        let future = match lookup {
            Some(Lookup::Cached(value)) => return Ok(value),
            Some(Lookup::InFlight(future)) => future,
            None => {
                // `compute` runs unlocked so it may call back into this cache
                let computation = compute();

                let mut state = self.inner.lock();
                match state.join_in_flight(kind, key) {
                    Some(future) => future,
                    None => {
                        let cached = state
                            .cache_mut(kind)
                            .peek(key)
                            .filter(|entry| !entry.is_expired(ttl))
                            .map(|entry| entry.value.clone());
                        if let Some(value) = cached {
                            return Ok(value);
                        }
                        self.start(&mut state, kind, key, dedup_window, computation)
                    }
                }
            }
        };

        future.await
    }

    fn start<Fut>(
        &self,
        state: &mut State<V>,
        kind: QueryKind,
        key: &str,
        dedup_window: Duration,
        computation: Fut,
    ) -> SharedResult<V>
    where
        Fut: Future<Output = Result<V, EvaluatorError>> + Send + 'static,
    {
        let id = state.pending.next_id();
        let generation = state.generation;
        let inner = Arc::clone(&self.inner);
        let task_key = key.to_string();

        let task = tokio::spawn(async move {
            let result = computation.await;
            inner.settle(kind, &task_key, id, generation, &result);
            result
        });

        // a task that panics never reaches settle(), so its waiters unregister it
        let owner = Arc::downgrade(&self.inner);
        let owner_key = key.to_string();
        let future = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => {
                    if let Some(inner) = owner.upgrade() {
                        inner.lock().pending.remove_if_current(kind, &owner_key, id);
                    }
                    tracing::warn!(%kind, key = %owner_key, error = %e, "Computation task aborted");
                    Err(EvaluatorError::Cancelled(e.to_string()))
                }
            }
        }
        .boxed()
        .shared();

        state.pending.insert(
            kind,
            key.to_string(),
            PendingRequest {
                id,
                future: future.clone(),
                started_at: Instant::now(),
                dedup_window,
            },
        );
        state.dedup_misses += 1;
        tracing::debug!(%kind, key, "Cache miss, computation started");

        future
    }

    /// Resolves up to [`WARMUP_LIMIT`] keys concurrently, ignoring failures.
    ///
    /// Returns how many keys resolved successfully.
    pub async fn warmup<F, Fut>(&self, kind: QueryKind, keys: &[String], compute: F) -> usize
    where
        F: Fn(&str) -> Fut,
        Fut: Future<Output = Result<V, EvaluatorError>> + Send + 'static,
    {
        let lookups = keys
            .iter()
            .take(WARMUP_LIMIT)
            .map(|key| self.resolve(kind, key, || compute(key)));

        let warmed = join_all(lookups)
            .await
            .into_iter()
            .filter(|r| r.is_ok())
            .count();

        tracing::info!(%kind, requested = keys.len(), warmed, "Warmup finished");
        warmed
    }

    /// Removes a cached result. Returns whether it was present.
    pub fn invalidate(&self, kind: QueryKind, key: &str) -> bool {
        self.inner.lock().cache_mut(kind).delete(key)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Auxiliary results (stored next to evaluations under their own prefix)
    // ═══════════════════════════════════════════════════════════════════════

    /// Stores an externally supplied result. Aux entries never expire by
    /// age; they leave only through eviction or [`clear_aux`](Self::clear_aux).
    pub fn set_aux(&self, aux_key: &str, value: V) {
        self.inner
            .lock()
            .evaluations
            .set(key::aux(aux_key), CacheEntry::new(value));
    }

    /// Looks up an auxiliary result.
    pub fn get_aux(&self, aux_key: &str) -> Option<V> {
        self.inner
            .lock()
            .evaluations
            .get(&key::aux(aux_key))
            .map(|entry| entry.value.clone())
    }

    /// Checks for an auxiliary result.
    pub fn has_aux(&self, aux_key: &str) -> bool {
        self.inner.lock().evaluations.has(&key::aux(aux_key))
    }

    /// Removes every auxiliary result, leaving computed results alone.
    pub fn clear_aux(&self) -> usize {
        let removed = self
            .inner
            .lock()
            .evaluations
            .retain_keys(|k| !k.starts_with(AUX_PREFIX));
        tracing::debug!(removed, "Auxiliary results cleared");
        removed
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Maintenance
    // ═══════════════════════════════════════════════════════════════════════

    /// Number of requests currently in flight.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Forgets in-flight requests older than twice their dedup window.
    pub fn sweep_stale(&self) -> usize {
        self.inner.sweep_stale()
    }

    /// Statistics aggregated over every query kind.
    pub fn stats(&self) -> DedupStats {
        let state = self.inner.lock();

        let mut combined = CacheStats::default();
        combined.merge(&state.evaluations.stats());
        combined.merge(&state.best_moves.stats());

        DedupStats {
            hits: combined.hits,
            misses: combined.misses,
            hit_rate: combined.hit_rate(),
            size: combined.size,
            capacity: combined.capacity,
            dedup_hits: state.dedup_hits,
            dedup_misses: state.dedup_misses,
            pending: state.pending.len(),
            estimated_memory_bytes: combined.size * ESTIMATED_ENTRY_BYTES,
        }
    }

    /// Statistics for a single query kind.
    pub fn kind_stats(&self, kind: QueryKind) -> CacheStats {
        self.inner.lock().cache_mut(kind).stats()
    }

    /// Drops every cached result, in-flight registration and counter.
    pub fn clear(&self) {
        let mut state = self.inner.lock();
        state.evaluations.clear();
        state.best_moves.clear();
        state.pending.clear();
        state.dedup_hits = 0;
        state.dedup_misses = 0;
        state.generation += 1;
        tracing::info!("Result cache cleared");
    }

    /// Stops the background sweeper.
    pub fn shutdown(&mut self) {
        self.sweeper.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::KindConfig;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn config(ttl_ms: u64, window_ms: u64) -> DedupConfig {
        let kind = KindConfig {
            capacity: 100,
            ttl: Duration::from_millis(ttl_ms),
            dedup_window: Duration::from_millis(window_ms),
        };
        DedupConfig {
            evaluate: kind.clone(),
            best_move: kind,
            sweep_interval: Duration::from_secs(60),
        }
    }

    fn counted(calls: &Arc<AtomicUsize>, value: i64) -> impl Future<Output = Result<i64, EvaluatorError>> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_timeline() {
        let cache = DedupingResultCache::new(config(1000, 100));
        let calls = Arc::new(AtomicUsize::new(0));

        let v = cache.resolve(QueryKind::Evaluate, "fenX", || counted(&calls, 7)).await;
        assert_eq!(v, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(500)).await;
        let v = cache.resolve(QueryKind::Evaluate, "fenX", || counted(&calls, 8)).await;
        assert_eq!(v, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_millis(1000)).await;
        let v = cache.resolve(QueryKind::Evaluate, "fenX", || counted(&calls, 9)).await;
        assert_eq!(v, Ok(9));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_computation() {
        let cache = Arc::new(DedupingResultCache::new(config(1000, 5000)));
        let calls = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .resolve(QueryKind::Evaluate, "fen", move || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        Ok::<i64, EvaluatorError>(42)
                    })
                    .await
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), Ok(42));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let stats = cache.stats();
        assert_eq!(stats.dedup_misses, 1);
        assert_eq!(stats.dedup_hits, 4);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_is_shared_and_not_cached() {
        let cache = Arc::new(DedupingResultCache::<i64>::new(config(1000, 5000)));
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = |calls: Arc<AtomicUsize>| async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            Err::<i64, _>(EvaluatorError::InvalidPosition("bad".into()))
        };

        let (a, b) = tokio::join!(
            cache.resolve(QueryKind::Evaluate, "bad", || failing(Arc::clone(&calls))),
            cache.resolve(QueryKind::Evaluate, "bad", || failing(Arc::clone(&calls))),
        );

        assert_eq!(a, Err(EvaluatorError::InvalidPosition("bad".into())));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().size, 0);
        assert_eq!(cache.pending_count(), 0);

        // the key is eligible for a fresh attempt
        let retry = cache.resolve(QueryKind::Evaluate, "bad", || counted(&calls, 3)).await;
        assert_eq!(retry, Ok(3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_none_is_not_cached() {
        let cache = DedupingResultCache::<Option<i64>>::new(config(1000, 100));
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let v = cache
                .resolve(QueryKind::BestMove, "fen", move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await;
            assert_eq!(v, Ok(None));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kinds_are_cached_separately() {
        let cache = DedupingResultCache::new(config(1000, 100));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.resolve(QueryKind::Evaluate, "k", || counted(&calls, 1)).await.unwrap();
        let v = cache.resolve(QueryKind::BestMove, "k", || counted(&calls, 2)).await;

        assert_eq!(v, Ok(2));
        assert_eq!(cache.kind_stats(QueryKind::Evaluate).size, 1);
        assert_eq!(cache.kind_stats(QueryKind::BestMove).size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_pending_is_not_joined() {
        let cache = DedupingResultCache::new(config(1000, 100));
        let calls = Arc::new(AtomicUsize::new(0));

        let hanging = Arc::clone(&calls);
        let slow = cache.resolve(QueryKind::Evaluate, "fen", move || async move {
            hanging.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(1)
        });
        // start the slow computation, then give up on it
        let _ = tokio::time::timeout(Duration::from_millis(10), slow).await;
        assert_eq!(cache.pending_count(), 1);

        tokio::time::advance(Duration::from_millis(150)).await;
        let v = cache.resolve(QueryKind::Evaluate, "fen", || counted(&calls, 2)).await;

        assert_eq!(v, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_hung_requests() {
        let cache = DedupingResultCache::<i64>::new(config(1000, 100));

        let slow = cache.resolve(QueryKind::Evaluate, "hung", || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(1)
        });
        let _ = tokio::time::timeout(Duration::from_millis(10), slow).await;

        assert_eq!(cache.sweep_stale(), 0);
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(cache.sweep_stale(), 1);
        assert_eq!(cache.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_computation_still_caches() {
        let cache = DedupingResultCache::new(config(10_000, 5000));
        let calls = Arc::new(AtomicUsize::new(0));

        let slow = cache.resolve(QueryKind::Evaluate, "fen", || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(5)
        });
        let _ = tokio::time::timeout(Duration::from_millis(10), slow).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        let v = cache.resolve(QueryKind::Evaluate, "fen", || counted(&calls, 6)).await;

        assert_eq!(v, Ok(5));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_warmup_limits_and_ignores_failures() {
        let cache = DedupingResultCache::new(config(10_000, 5000));
        let calls = Arc::new(AtomicUsize::new(0));
        let keys: Vec<String> = (0..15).map(|i| format!("k{}", i)).collect();

        let warmed = cache
            .warmup(QueryKind::Evaluate, &keys, |key| {
                let calls = Arc::clone(&calls);
                let fail = key == "k3";
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if fail {
                        Err(EvaluatorError::Timeout(10))
                    } else {
                        Ok(1)
                    }
                }
            })
            .await;

        assert_eq!(warmed, 9);
        assert_eq!(calls.load(Ordering::SeqCst), WARMUP_LIMIT);
        assert_eq!(cache.stats().size, 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_aux_partition() {
        let cache = DedupingResultCache::new(config(10_000, 5000));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.resolve(QueryKind::Evaluate, "eval:fen", || counted(&calls, 1)).await.unwrap();
        cache.set_aux("fen", 99);

        assert!(cache.has_aux("fen"));
        assert_eq!(cache.get_aux("fen"), Some(99));
        assert_eq!(cache.get_aux("other"), None);

        assert_eq!(cache.clear_aux(), 1);
        assert!(!cache.has_aux("fen"));

        let v = cache.resolve(QueryKind::Evaluate, "eval:fen", || counted(&calls, 2)).await;
        assert_eq!(v, Ok(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_resets_everything() {
        let cache = DedupingResultCache::new(config(10_000, 5000));
        let calls = Arc::new(AtomicUsize::new(0));

        cache.resolve(QueryKind::Evaluate, "a", || counted(&calls, 1)).await.unwrap();
        cache.resolve(QueryKind::Evaluate, "a", || counted(&calls, 1)).await.unwrap();
        cache.resolve(QueryKind::BestMove, "b", || counted(&calls, 1)).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.estimated_memory_bytes, 2 * ESTIMATED_ENTRY_BYTES);

        cache.clear();
        let stats = cache.stats();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.size, 0);
        assert_eq!(stats.dedup_misses, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_computed_before_clear_is_discarded() {
        let cache = DedupingResultCache::new(config(10_000, 5000));

        let slow = cache.resolve(QueryKind::Evaluate, "fen", || async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(1)
        });
        let _ = tokio::time::timeout(Duration::from_millis(10), slow).await;

        cache.clear();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_kind_still_dedups() {
        let mut cfg = config(1000, 5000);
        cfg.evaluate.capacity = 0;
        let cache = DedupingResultCache::new(cfg);
        let calls = Arc::new(AtomicUsize::new(0));

        cache.resolve(QueryKind::Evaluate, "fen", || counted(&calls, 1)).await.unwrap();
        cache.resolve(QueryKind::Evaluate, "fen", || counted(&calls, 1)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().size, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_kinds_do_not_share_in_flight_requests() {
        let cache = DedupingResultCache::new(config(10_000, 5000));
        let calls = Arc::new(AtomicUsize::new(0));

        let slow_eval = {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(1)
            }
        };

        let (eval, best) = tokio::join!(
            cache.resolve(QueryKind::Evaluate, "fen", slow_eval),
            cache.resolve(QueryKind::BestMove, "fen", || counted(&calls, 2)),
        );

        assert_eq!(eval, Ok(1));
        assert_eq!(best, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().dedup_hits, 0);
        assert_eq!(cache.kind_stats(QueryKind::Evaluate).size, 1);
        assert_eq!(cache.kind_stats(QueryKind::BestMove).size, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compute_may_call_back_into_cache() {
        let cache = DedupingResultCache::new(config(10_000, 5000));

        let v = cache
            .resolve(QueryKind::Evaluate, "fen", || {
                let misses = cache.stats().misses as i64;
                let pending = cache.pending_count() as i64;
                async move { Ok(misses * 10 + pending) }
            })
            .await;

        assert_eq!(v, Ok(10));
        assert_eq!(cache.pending_count(), 0);
    }

    async fn crashing() -> Result<i64, EvaluatorError> {
        panic!("engine crashed")
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicked_computation_is_unregistered() {
        let cache = DedupingResultCache::new(config(10_000, 5000));
        let calls = Arc::new(AtomicUsize::new(0));

        let v = cache.resolve(QueryKind::Evaluate, "fen", crashing).await;
        assert!(matches!(v, Err(EvaluatorError::Cancelled(_))));
        assert_eq!(cache.pending_count(), 0);

        let v = cache.resolve(QueryKind::Evaluate, "fen", || counted(&calls, 2)).await;
        assert_eq!(v, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
