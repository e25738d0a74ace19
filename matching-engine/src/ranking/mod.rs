pub mod relevance;
pub mod tfidf;

use crate::core::{Job, RankingOutcome, ScoredMatch, WorkerContext};
use crate::error::Result;

pub use relevance::{job_features, worker_terms, RelevanceRanker, DEFAULT_TOP_N};
pub use tfidf::{SparseVector, TfIdfVectorizer};

/// Trait for relevance ranking implementations
pub trait Ranker: Send + Sync {
    /// Rank jobs for a worker, best first, at most `top_n`
    fn rank(&self, worker: &WorkerContext, jobs: &[Job], top_n: usize) -> RankingOutcome<ScoredMatch>;

    /// Rank candidates by similarity to a reference job, best first, at most `top_n`
    fn rank_similar(&self, reference: &Job, candidates: &[Job], top_n: usize) -> RankingOutcome<ScoredMatch>;

    /// Rebuild any learned state from `jobs`
    fn retrain(&self, jobs: &[Job]) -> Result<()>;

    /// Get ranker name for logging
    fn name(&self) -> &str;
}
