//! Cached, deduplicated access to an [`Evaluator`].

use std::sync::Arc;

use crate::cache::key::{self, EVALUATION_PREFIX};
use crate::dedup::{DedupConfig, DedupStats, DedupingResultCache, QueryKind};
use crate::types::analysis::{Analysis, EvaluationResult, Move};
use crate::types::config::CacheConfig;
use crate::types::errors::EvaluatorError;

use super::Evaluator;

/// Analysis cache in front of an evaluator.
///
/// Evaluations and best-move lookups are cached separately, each with its
/// own capacity and TTL. Concurrent requests for the same position share a
/// single evaluator call.
///
/// # Example
///
/// ```ignore
/// let cache = AnalysisCache::from_config(Arc::new(engine), &config.cache);
/// let eval = cache.evaluate(fen).await?;
/// let best = cache.find_best_move(fen, 1000).await?;
/// ```
pub struct AnalysisCache<E> {
    evaluator: Arc<E>,
    cache: DedupingResultCache<Analysis>,
}

impl<E: Evaluator> AnalysisCache<E> {
    /// Creates a cache with explicit runtime settings.
    pub fn new(evaluator: Arc<E>, config: DedupConfig) -> Self {
        tracing::info!(
            evaluator = evaluator.name(),
            evaluate_capacity = config.evaluate.capacity,
            best_move_capacity = config.best_move.capacity,
            "Analysis cache created"
        );
        Self {
            evaluator,
            cache: DedupingResultCache::new(config),
        }
    }

    /// Creates a cache from the `[cache]` configuration section.
    pub fn from_config(evaluator: Arc<E>, config: &CacheConfig) -> Self {
        Self::new(evaluator, config.into())
    }

    /// The wrapped evaluator.
    pub fn evaluator(&self) -> &Arc<E> {
        &self.evaluator
    }

    /// Evaluates a position, reusing cached or in-flight results.
    pub async fn evaluate(&self, fingerprint: &str) -> Result<EvaluationResult, EvaluatorError> {
        let fingerprint = key::normalize_fingerprint(fingerprint);
        let cache_key = key::evaluation(&fingerprint);
        let evaluator = Arc::clone(&self.evaluator);

        let analysis = self
            .cache
            .resolve(QueryKind::Evaluate, &cache_key, move || async move {
                evaluator
                    .evaluate(&fingerprint)
                    .await
                    .map(Analysis::Evaluation)
            })
            .await?;

        analysis
            .into_evaluation()
            .ok_or_else(|| self.kind_mismatch(&cache_key))
    }

    /// Finds the best move, reusing cached or in-flight results.
    ///
    /// Different time limits are cached under different keys. A `None`
    /// answer is cached too.
    pub async fn find_best_move(
        &self,
        fingerprint: &str,
        time_limit_ms: u64,
    ) -> Result<Option<Move>, EvaluatorError> {
        let fingerprint = key::normalize_fingerprint(fingerprint);
        let cache_key = key::best_move(&fingerprint, time_limit_ms);
        let evaluator = Arc::clone(&self.evaluator);

        let analysis = self
            .cache
            .resolve(QueryKind::BestMove, &cache_key, move || async move {
                evaluator
                    .find_best_move(&fingerprint, time_limit_ms)
                    .await
                    .map(Analysis::BestMove)
            })
            .await?;

        analysis
            .into_best_move()
            .ok_or_else(|| self.kind_mismatch(&cache_key))
    }

    fn kind_mismatch(&self, cache_key: &str) -> EvaluatorError {
        EvaluatorError::failed(
            self.evaluator.name(),
            format!("cached entry '{}' holds the wrong kind of result", cache_key),
        )
    }

    /// Evaluates up to the first ten positions concurrently, ignoring
    /// failures. Returns how many succeeded.
    pub async fn warmup(&self, fingerprints: &[String]) -> usize {
        let keys: Vec<String> = fingerprints.iter().map(|fp| key::evaluation(fp)).collect();
        let evaluator = &self.evaluator;

        self.cache
            .warmup(QueryKind::Evaluate, &keys, |cache_key| {
                let evaluator = Arc::clone(evaluator);
                let fingerprint = cache_key
                    .strip_prefix(EVALUATION_PREFIX)
                    .unwrap_or(cache_key)
                    .to_string();
                async move {
                    evaluator
                        .evaluate(&fingerprint)
                        .await
                        .map(Analysis::Evaluation)
                }
            })
            .await
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Precomputed evaluations
    // ═══════════════════════════════════════════════════════════════════════

    /// Stores an externally supplied evaluation, bypassing the evaluator.
    pub fn set_aux(&self, aux_key: &str, result: EvaluationResult) {
        self.cache.set_aux(aux_key, Analysis::Evaluation(result));
    }

    /// Looks up an externally supplied evaluation.
    pub fn get_aux(&self, aux_key: &str) -> Option<EvaluationResult> {
        self.cache.get_aux(aux_key).and_then(Analysis::into_evaluation)
    }

    /// Checks for an externally supplied evaluation.
    pub fn has_aux(&self, aux_key: &str) -> bool {
        self.cache.has_aux(aux_key)
    }

    /// Removes every externally supplied evaluation.
    pub fn clear_aux(&self) -> usize {
        self.cache.clear_aux()
    }

    /// Aggregated statistics.
    pub fn stats(&self) -> DedupStats {
        self.cache.stats()
    }

    /// Drops every cached result and resets counters.
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Stops background maintenance.
    pub fn shutdown(&mut self) {
        self.cache.shutdown();
    }
}
