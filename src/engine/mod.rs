//! Chess-facing layer: the evaluator contract and the analysis cache that
//! sits in front of it.

mod analysis_cache;
mod evaluator;

pub use analysis_cache::AnalysisCache;
pub use evaluator::Evaluator;
