//! JSON seed data for the CLI `import` command and tests.
//!
//! ```json
//! {
//!   "jobs": [{ "key": "tap", "title": "Fix kitchen tap", "tags": ["plumber"] }],
//!   "skills": [{ "worker_id": 1, "name": "plumber", "experience_years": 3 }],
//!   "applications": [{ "worker_id": 1, "job": "tap" }]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::{JobId, NewJob, WorkerId};
use crate::error::{MatchingError, Result};
use crate::store::SqliteStore;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub jobs: Vec<FixtureJob>,
    pub skills: Vec<FixtureSkill>,
    pub applications: Vec<FixtureApplication>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureJob {
    /// Name used by `applications` to refer to this job
    #[serde(default)]
    pub key: Option<String>,
    #[serde(flatten)]
    pub job: NewJob,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureSkill {
    pub worker_id: WorkerId,
    pub name: String,
    #[serde(default)]
    pub experience_years: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureApplication {
    pub worker_id: WorkerId,
    /// Key of a job in the same fixture
    pub job: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub jobs: usize,
    pub skills: usize,
    pub skipped_skills: usize,
    pub applications: usize,
}

impl Fixture {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl SqliteStore {
    /// Insert everything in `fixture`. Skills the worker already has are skipped.
    pub async fn import(&self, fixture: &Fixture) -> Result<ImportSummary> {
        let mut summary = ImportSummary::default();
        let mut keys: HashMap<&str, JobId> = HashMap::new();

        for entry in &fixture.jobs {
            let job = self.create_job(&entry.job).await?;
            if let Some(key) = &entry.key {
                keys.insert(key.as_str(), job.id);
            }
            summary.jobs += 1;
        }

        for skill in &fixture.skills {
            match self.add_skill(skill.worker_id, &skill.name, skill.experience_years).await {
                Ok(_) => summary.skills += 1,
                Err(MatchingError::SkillExists(name)) => {
                    tracing::debug!("Worker {} already has skill '{}'", skill.worker_id, name);
                    summary.skipped_skills += 1;
                }
                Err(e) => return Err(e),
            }
        }

        for application in &fixture.applications {
            let job_id = keys.get(application.job.as_str()).copied().ok_or_else(|| {
                MatchingError::InvalidInput(format!("application refers to unknown job key '{}'", application.job))
            })?;
            if self.record_application(application.worker_id, job_id).await? {
                summary.applications += 1;
            }
        }

        tracing::info!(
            "Imported {} jobs, {} skills ({} skipped), {} applications",
            summary.jobs,
            summary.skills,
            summary.skipped_skills,
            summary.applications
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{ApplicationStore, UserProfileStore};

    const FIXTURE: &str = r#"{
        "jobs": [
            { "key": "tap", "title": "Fix kitchen tap", "description": "leaking tap", "tags": ["Plumber"] },
            { "title": "Paint bedroom", "tags": ["painter"], "location": { "latitude": 18.52, "longitude": 73.85 } }
        ],
        "skills": [
            { "worker_id": 1, "name": "plumber", "experience_years": 3 },
            { "worker_id": 1, "name": "Plumber" }
        ],
        "applications": [{ "worker_id": 1, "job": "tap" }]
    }"#;

    #[tokio::test]
    async fn test_import_fixture() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let fixture = Fixture::from_json(FIXTURE).unwrap();
        let summary = store.import(&fixture).await.unwrap();

        assert_eq!(
            summary,
            ImportSummary { jobs: 2, skills: 1, skipped_skills: 1, applications: 1 }
        );
        assert_eq!(store.get_skills(WorkerId(1)).await.unwrap().len(), 1);
        assert_eq!(store.get_applied_job_ids(WorkerId(1)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_key_is_rejected() {
        let store = SqliteStore::new(":memory:").await.unwrap();
        let fixture = Fixture::from_json(r#"{"applications": [{"worker_id": 1, "job": "nope"}]}"#).unwrap();
        let err = store.import(&fixture).await.unwrap_err();
        assert!(matches!(err, MatchingError::InvalidInput(_)));
    }

    #[test]
    fn test_bad_json_is_json_error() {
        assert!(matches!(Fixture::from_json("{"), Err(MatchingError::Json(_))));
    }
}
