pub mod job;
pub mod matches;
pub mod worker;

pub use job::{Job, JobId, JobStatus, NewJob};
pub use matches::{RankingOutcome, Recommendation, ScoredMatch, SimilarJob};
pub use worker::{ApplicationRecord, Skill, WorkerContext, WorkerId, WorkerProfile};
