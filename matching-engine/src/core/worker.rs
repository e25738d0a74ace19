use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::core::{Job, JobId};

/// Worker (user) identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkerId(pub i64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A skill listed on a worker profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    #[serde(default)]
    pub experience_years: u32,
}

impl Skill {
    pub fn new(name: impl Into<String>, experience_years: u32) -> Self {
        Self {
            name: name.into(),
            experience_years,
        }
    }
}

/// Worker identity plus skills, in profile order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerProfile {
    pub id: WorkerId,
    #[serde(default)]
    pub skills: Vec<Skill>,
}

impl WorkerProfile {
    pub fn new(id: i64, skills: Vec<Skill>) -> Self {
        Self {
            id: WorkerId(id),
            skills,
        }
    }

    pub fn has_skills(&self) -> bool {
        !self.skills.is_empty()
    }

    /// Lowercased skill names, deduplicated
    pub fn skill_names(&self) -> HashSet<String> {
        self.skills.iter().map(|s| s.name.to_lowercase()).collect()
    }
}

/// Marks that a worker already applied to a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub worker_id: WorkerId,
    pub job_id: JobId,
}

/// Everything the ranker needs to know about a worker for one call
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub profile: WorkerProfile,
    /// Jobs the worker has applied to; each contributes title and description
    pub applied_jobs: Vec<Job>,
}

impl WorkerContext {
    pub fn new(profile: WorkerProfile, applied_jobs: Vec<Job>) -> Self {
        Self {
            profile,
            applied_jobs,
        }
    }

    /// Context with no application history
    pub fn from_profile(profile: WorkerProfile) -> Self {
        Self::new(profile, Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skill_names_lowercased_and_deduplicated() {
        let profile = WorkerProfile::new(
            1,
            vec![Skill::new("Plumber", 3), Skill::new("plumber", 1), Skill::new("Electrician", 0)],
        );
        let names = profile.skill_names();
        assert_eq!(names.len(), 2);
        assert!(names.contains("plumber"));
        assert!(names.contains("electrician"));
    }

    #[test]
    fn test_skill_experience_defaults_to_zero() {
        let skill: Skill = serde_json::from_str(r#"{"name":"welding"}"#).unwrap();
        assert_eq!(skill.experience_years, 0);
    }
}
