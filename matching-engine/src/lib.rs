//! # KaamConnect Matcher
//!
//! Job matching engine for the KaamConnect marketplace:
//! - TF-IDF relevance ranking of open jobs against a worker's skills and history
//! - Similar-job lookup
//! - Nearby jobs (haversine distance) and Nominatim geocoding
//! - Skill suggestions from popular job tags
//! - SQLite storage behind async store traits
//! - Multiple interfaces: Rust library, Python bindings, HTTP API, CLI
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use kaamconnect_matcher::{MatchingEngine, WorkerId};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = MatchingEngine::new("kaamconnect.db").await?;
//!
//!     let outcome = engine.get_job_recommendations(WorkerId(42), 10).await?;
//!     for rec in outcome.as_slice() {
//!         println!("{} - {:.2} {:?}", rec.job.title, rec.score, rec.matching_skills);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod location;
pub mod ranking;
pub mod skills;
pub mod store;

// Re-export primary types
pub use config::MatcherConfig;
pub use core::{
    Job, JobId, JobStatus, NewJob, RankingOutcome, Recommendation, ScoredMatch, SimilarJob, Skill,
    WorkerContext, WorkerId, WorkerProfile,
};
pub use engine::MatchingEngine;
pub use error::{MatchingError, Result};
pub use location::{Coordinates, DistanceUnit, NearbyJob};
pub use ranking::{Ranker, RelevanceRanker};
pub use store::SqliteStore;

// Python bindings
#[cfg(feature = "python")]
pub mod python;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
