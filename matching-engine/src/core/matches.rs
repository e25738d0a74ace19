use serde::{Deserialize, Serialize};

use crate::core::{Job, JobId};

/// Score for one candidate job. Built fresh per ranking call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub job_id: JobId,
    /// Min-max scaled into [0, 1]; raw cosine when the batch had one job
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matching_skills: Option<Vec<String>>,
}

impl ScoredMatch {
    pub fn new(job_id: JobId, score: f64) -> Self {
        Self {
            job_id,
            score,
            matching_skills: None,
        }
    }
}

/// A recommended job for a worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub job: Job,
    pub score: f64,
    /// Worker skills that literally appear in the job's tags
    pub matching_skills: Vec<String>,
}

/// A job similar to some reference job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarJob {
    pub job: Job,
    pub score: f64,
}

/// Result of an advisory ranking call.
///
/// `Degraded` means the computation failed internally (for example the
/// vectorizer could not be trained). Callers that don't care about the
/// difference use [`RankingOutcome::into_vec`], which never fails.
#[derive(Debug, Clone, PartialEq)]
pub enum RankingOutcome<T> {
    Ranked(Vec<T>),
    Degraded { reason: String },
}

impl<T> RankingOutcome<T> {
    pub fn degraded(reason: impl Into<String>) -> Self {
        RankingOutcome::Degraded {
            reason: reason.into(),
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RankingOutcome::Degraded { .. })
    }

    /// Why ranking degraded, if it did
    pub fn reason(&self) -> Option<&str> {
        match self {
            RankingOutcome::Ranked(_) => None,
            RankingOutcome::Degraded { reason } => Some(reason),
        }
    }

    pub fn as_slice(&self) -> &[T] {
        match self {
            RankingOutcome::Ranked(items) => items,
            RankingOutcome::Degraded { .. } => &[],
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }

    pub fn into_vec(self) -> Vec<T> {
        match self {
            RankingOutcome::Ranked(items) => items,
            RankingOutcome::Degraded { .. } => Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> RankingOutcome<U> {
        match self {
            RankingOutcome::Ranked(items) => RankingOutcome::Ranked(f(items)),
            RankingOutcome::Degraded { reason } => RankingOutcome::Degraded { reason },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degraded_reads_as_empty() {
        let outcome: RankingOutcome<ScoredMatch> = RankingOutcome::degraded("empty vocabulary");
        assert!(outcome.is_degraded());
        assert!(outcome.is_empty());
        assert_eq!(outcome.reason(), Some("empty vocabulary"));
        assert!(outcome.into_vec().is_empty());
    }

    #[test]
    fn test_map_keeps_degraded_reason() {
        let outcome: RankingOutcome<u32> = RankingOutcome::degraded("boom");
        let mapped = outcome.map(|v| v.into_iter().map(|x| x * 2).collect::<Vec<_>>());
        assert_eq!(mapped, RankingOutcome::Degraded { reason: "boom".into() });
    }

    #[test]
    fn test_matching_skills_omitted_when_absent() {
        let json = serde_json::to_string(&ScoredMatch::new(JobId(1), 0.5)).unwrap();
        assert!(!json.contains("matching_skills"));
    }
}
