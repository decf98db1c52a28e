//! Cache key construction.
//!
//! Every query type gets its own prefix so that, for the same position,
//! an evaluation and a best-move lookup never share a key.

/// Prefix for evaluation results.
pub const EVALUATION_PREFIX: &str = "eval:";

/// Prefix for best-move results.
pub const BEST_MOVE_PREFIX: &str = "best:";

/// Prefix for auxiliary, externally supplied results.
pub const AUX_PREFIX: &str = "aux:";

/// Normalizes a position fingerprint (trims and collapses whitespace).
pub fn normalize_fingerprint(fingerprint: &str) -> String {
    fingerprint.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Key for evaluating a position.
pub fn evaluation(fingerprint: &str) -> String {
    format!("{}{}", EVALUATION_PREFIX, normalize_fingerprint(fingerprint))
}

/// Key for a best-move lookup with a given time budget.
pub fn best_move(fingerprint: &str, time_limit_ms: u64) -> String {
    format!(
        "{}{}:{}",
        BEST_MOVE_PREFIX,
        time_limit_ms,
        normalize_fingerprint(fingerprint)
    )
}

/// Key for auxiliary data.
pub fn aux(key: &str) -> String {
    format!("{}{}", AUX_PREFIX, key)
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

    #[test]
    fn test_normalization() {
        let messy = format!("  {}  ", START.replace(' ', "   "));
        assert_eq!(evaluation(&messy), evaluation(START));
    }

    #[test]
    fn test_query_types_do_not_collide() {
        assert_ne!(evaluation(START), best_move(START, 1000));
        assert_ne!(best_move(START, 1000), best_move(START, 2000));
        assert_ne!(aux(START), evaluation(START));
    }
}
