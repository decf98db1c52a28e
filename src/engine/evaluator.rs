//! Evaluator contract.

use async_trait::async_trait;

use crate::types::analysis::{EvaluationResult, Move};
use crate::types::errors::EvaluatorError;

/// Asynchronous position analysis service.
///
/// Fingerprints passed in are already normalized. Timeouts are the
/// implementation's business: report them as [`EvaluatorError::Timeout`].
#[async_trait]
pub trait Evaluator: Send + Sync + 'static {
    /// Returns the evaluator name, for logs and errors.
    fn name(&self) -> &str;

    /// Evaluates a position.
    async fn evaluate(&self, fingerprint: &str) -> Result<EvaluationResult, EvaluatorError>;

    /// Searches for the best move within `time_limit_ms`.
    ///
    /// `Ok(None)` means the position has no move (mate or stalemate), not a
    /// failure.
    async fn find_best_move(
        &self,
        fingerprint: &str,
        time_limit_ms: u64,
    ) -> Result<Option<Move>, EvaluatorError>;
}
