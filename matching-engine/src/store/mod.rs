pub mod fixture;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::core::{ApplicationRecord, Job, JobId, Skill, WorkerId};
use crate::error::Result;
use crate::location::BoundingBox;

pub use fixture::{Fixture, ImportSummary};
pub use sqlite::SqliteStore;

/// Filter for open-job queries. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct OpenJobsQuery {
    /// Jobs that must not be returned
    pub excluding: HashSet<JobId>,
    /// When set, a job needs at least one tag in this set (case-insensitive)
    pub tag_filter: Option<HashSet<String>>,
    pub limit: Option<usize>,
}

impl OpenJobsQuery {
    pub fn excluding(ids: impl IntoIterator<Item = JobId>) -> Self {
        Self {
            excluding: ids.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn with_tags(mut self, tags: impl IntoIterator<Item = String>) -> Self {
        self.tag_filter = Some(tags.into_iter().map(|t| t.to_lowercase()).collect());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Source of job records
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Open jobs matching `query`, ordered by `created_at` descending
    async fn get_open_jobs(&self, query: &OpenJobsQuery) -> Result<Vec<Job>>;

    /// Single job; `JobNotFound` when it does not exist
    async fn get_job(&self, id: JobId) -> Result<Job>;

    /// Jobs for the given ids, in id order; unknown ids are skipped
    async fn get_jobs(&self, ids: &[JobId]) -> Result<Vec<Job>>;

    /// Open jobs with a location inside `bounds`
    async fn get_open_jobs_within(&self, bounds: &BoundingBox) -> Result<Vec<Job>>;
}

/// Source of worker skills
#[async_trait]
pub trait UserProfileStore: Send + Sync {
    /// Skills in the order they were added; empty is valid
    async fn get_skills(&self, worker_id: WorkerId) -> Result<Vec<Skill>>;
}

/// Source of job applications
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Applications made by the worker, oldest first
    async fn get_applications(&self, worker_id: WorkerId) -> Result<Vec<ApplicationRecord>>;

    /// Ids of every job the worker applied to
    async fn get_applied_job_ids(&self, worker_id: WorkerId) -> Result<HashSet<JobId>> {
        Ok(self
            .get_applications(worker_id)
            .await?
            .into_iter()
            .map(|a| a.job_id)
            .collect())
    }
}

/// Tag usage counts backing skill suggestions
#[async_trait]
pub trait SkillCatalog: Send + Sync {
    /// Tags containing `fragment`, most used first
    async fn tag_popularity(&self, fragment: &str, limit: usize) -> Result<Vec<TagCount>>;

    /// Most used tags overall
    async fn top_tags(&self, limit: usize) -> Result<Vec<TagCount>>;
}

/// How many jobs carry a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCount {
    pub tag: String,
    pub count: u64,
}

/// A stored worker skill row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillRecord {
    pub id: i64,
    pub worker_id: WorkerId,
    pub skill: Skill,
}

/// Row counts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_jobs: u64,
    pub open_jobs: u64,
    pub workers_with_skills: u64,
    pub applications: u64,
}
