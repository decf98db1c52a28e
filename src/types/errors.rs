//! Error types for evalcache.

use thiserror::Error;

/// Default result type for evalcache.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors raised by the cache layer.
///
/// Only [`CacheError::Evaluator`] ever reaches the caller of a cached
/// lookup; everything else is absorbed by the component that hit it.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "sqlite")]
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Durable storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error(transparent)]
    Evaluator(#[from] EvaluatorError),

    #[error("{0}")]
    Other(String),
}

impl CacheError {
    /// Creates a generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Self::Other(msg.into())
    }

    /// Creates a configuration error.
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a storage-unavailable error.
    pub fn unavailable<S: Into<String>>(msg: S) -> Self {
        Self::StorageUnavailable(msg.into())
    }
}

/// Failure reported by an [`Evaluator`](crate::engine::Evaluator).
///
/// Cloneable so a single failure can be delivered to every caller that
/// shared the in-flight request.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluatorError {
    #[error("Invalid position '{0}'")]
    InvalidPosition(String),

    #[error("Evaluator '{0}' failed: {1}")]
    Failed(String, String),

    #[error("Evaluator timed out after {0} ms")]
    Timeout(u64),

    #[error("Evaluation was cancelled: {0}")]
    Cancelled(String),
}

impl EvaluatorError {
    /// Creates a generic evaluator failure.
    pub fn failed<N: Into<String>, S: Into<String>>(evaluator: N, msg: S) -> Self {
        Self::Failed(evaluator.into(), msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evaluator_error_is_transparent() {
        let err: CacheError = EvaluatorError::InvalidPosition("8/8/8".into()).into();
        assert_eq!(err.to_string(), "Invalid position '8/8/8'");
    }

    #[test]
    fn test_helpers() {
        assert!(matches!(CacheError::config("x"), CacheError::Config(_)));
        assert!(matches!(
            CacheError::unavailable("disk gone"),
            CacheError::StorageUnavailable(_)
        ));
        assert_eq!(
            EvaluatorError::failed("stockfish", "crashed").to_string(),
            "Evaluator 'stockfish' failed: crashed"
        );
    }
}
