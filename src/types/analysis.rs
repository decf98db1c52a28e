//! Engine analysis types.

use serde::{Deserialize, Serialize};

/// A move in UCI long algebraic notation (`e2e4`, `e7e8q`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Move(pub String);

impl Move {
    /// Creates a new move.
    pub fn new(uci: impl Into<String>) -> Self {
        Self(uci.into())
    }

    /// Returns the UCI string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Move {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Engine score, from the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum Score {
    /// Centipawns.
    Centipawns(i32),
    /// Forced mate in N moves (negative when the side to move gets mated).
    Mate(i32),
}

impl std::fmt::Display for Score {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Score::Centipawns(cp) => write!(f, "{:+.2}", *cp as f64 / 100.0),
            Score::Mate(n) => write!(f, "#{}", n),
        }
    }
}

/// Result of evaluating a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Fingerprint of the evaluated position.
    pub fingerprint: String,

    /// Score from the side to move.
    pub score: Score,

    /// Search depth reached.
    pub depth: u32,

    /// Best move found, if any.
    #[serde(default)]
    pub best_move: Option<Move>,

    /// Principal variation.
    #[serde(default)]
    pub principal_variation: Vec<Move>,
}

impl EvaluationResult {
    /// Creates a result with a centipawn score.
    pub fn centipawns(fingerprint: impl Into<String>, cp: i32, depth: u32) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            score: Score::Centipawns(cp),
            depth,
            best_move: None,
            principal_variation: Vec::new(),
        }
    }

    /// Creates a result with a mate score.
    pub fn mate(fingerprint: impl Into<String>, moves: i32, depth: u32) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            score: Score::Mate(moves),
            depth,
            best_move: None,
            principal_variation: Vec::new(),
        }
    }

    /// Sets the best move.
    pub fn with_best_move(mut self, mv: Move) -> Self {
        self.best_move = Some(mv);
        self
    }

    /// Sets the principal variation.
    pub fn with_pv(mut self, pv: Vec<Move>) -> Self {
        self.principal_variation = pv;
        self
    }
}

/// Anything the analysis cache stores.
///
/// `BestMove(None)` is an explicit "engine found no move" answer and is
/// cached like any other result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analysis {
    /// Full evaluation of a position.
    Evaluation(EvaluationResult),
    /// Best-move lookup.
    BestMove(Option<Move>),
}

impl Analysis {
    /// Returns the evaluation, if this is one.
    pub fn into_evaluation(self) -> Option<EvaluationResult> {
        match self {
            Analysis::Evaluation(result) => Some(result),
            Analysis::BestMove(_) => None,
        }
    }

    /// Returns the best move answer, if this is one.
    pub fn into_best_move(self) -> Option<Option<Move>> {
        match self {
            Analysis::BestMove(mv) => Some(mv),
            Analysis::Evaluation(_) => None,
        }
    }
}
