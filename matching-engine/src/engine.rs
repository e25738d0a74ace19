use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::config::MatcherConfig;
use crate::core::{
    Job, JobId, RankingOutcome, Recommendation, ScoredMatch, SimilarJob, WorkerContext, WorkerId,
    WorkerProfile,
};
use crate::error::{MatchingError, Result};
use crate::location::{self, Address, BoundingBox, Coordinates, Geocoder, NearbyJob, NominatimGeocoder};
use crate::ranking::{Ranker, RelevanceRanker};
use crate::skills::{self, SkillSuggestion};
use crate::store::{
    ApplicationStore, JobStore, OpenJobsQuery, SkillCatalog, SqliteStore, TagCount, UserProfileStore,
};

/// Job matching orchestrator: recommendations, similar jobs, nearby jobs
/// and skill suggestions over injected stores.
pub struct MatchingEngine {
    jobs: Arc<dyn JobStore>,
    profiles: Arc<dyn UserProfileStore>,
    applications: Arc<dyn ApplicationStore>,
    catalog: Arc<dyn SkillCatalog>,
    ranker: Arc<dyn Ranker>,
    geocoder: Option<Arc<dyn Geocoder>>,
    config: MatcherConfig,
}

/// Worker skills (lowercased) that appear among the job's tags, in tag order
pub fn matching_skills(skill_names: &HashSet<String>, job: &Job) -> Vec<String> {
    let mut seen = HashSet::new();
    job.tags
        .iter()
        .map(|tag| tag.to_lowercase())
        .filter(|tag| skill_names.contains(tag) && seen.insert(tag.clone()))
        .collect()
}

impl MatchingEngine {
    /// Create engine over a SQLite database with default settings
    pub async fn new(db_path: impl AsRef<str>) -> Result<Self> {
        let config = MatcherConfig {
            database_path: db_path.as_ref().to_string(),
            ..MatcherConfig::default()
        };
        Self::from_config(config).await
    }

    /// Open the configured database and geocoder
    pub async fn from_config(config: MatcherConfig) -> Result<Self> {
        let store = Arc::new(SqliteStore::new(&config.database_path).await?);
        let mut engine = Self::with_sqlite(store, config);

        match NominatimGeocoder::new(
            engine.config.location.nominatim_url.clone(),
            &engine.config.location.user_agent,
            engine.config.location.timeout(),
        ) {
            Ok(geocoder) => {
                tracing::info!("Geocoder: {}", geocoder.name());
                engine.geocoder = Some(Arc::new(geocoder));
            }
            Err(e) => tracing::warn!("Geocoder unavailable, address lookups disabled: {}", e),
        }

        Ok(engine)
    }

    /// Use one SQLite store for every collaborator
    pub fn with_sqlite(store: Arc<SqliteStore>, config: MatcherConfig) -> Self {
        Self::with_stores(store.clone(), store.clone(), store.clone(), store, config)
    }

    pub fn with_stores(
        jobs: Arc<dyn JobStore>,
        profiles: Arc<dyn UserProfileStore>,
        applications: Arc<dyn ApplicationStore>,
        catalog: Arc<dyn SkillCatalog>,
        config: MatcherConfig,
    ) -> Self {
        Self {
            jobs,
            profiles,
            applications,
            catalog,
            ranker: Arc::new(RelevanceRanker::new()),
            geocoder: None,
            config,
        }
    }

    pub fn with_ranker(mut self, ranker: Arc<dyn Ranker>) -> Self {
        self.ranker = ranker;
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn ranker_name(&self) -> &str {
        self.ranker.name()
    }

    async fn profile(&self, worker_id: WorkerId) -> Result<WorkerProfile> {
        let skills = self.profiles.get_skills(worker_id).await?;
        Ok(WorkerProfile { id: worker_id, skills })
    }

    async fn applied_jobs(&self, applied: &HashSet<JobId>) -> Result<Vec<Job>> {
        let mut ids: Vec<JobId> = applied.iter().copied().collect();
        ids.sort();
        self.jobs.get_jobs(&ids).await
    }

    /// Recommend open jobs the worker has not applied to yet, best first.
    ///
    /// Jobs tagged with one of the worker's skills are candidates first,
    /// topped up with the newest other open jobs. A worker without skills gets
    /// the newest open jobs unranked (score 0). Store failures are errors;
    /// ranking failures come back as [`RankingOutcome::Degraded`].
    pub async fn get_job_recommendations(
        &self,
        worker_id: WorkerId,
        limit: usize,
    ) -> Result<RankingOutcome<Recommendation>> {
        if limit == 0 {
            return Ok(RankingOutcome::Ranked(Vec::new()));
        }

        let applied = self.applications.get_applied_job_ids(worker_id).await?;
        let profile = self.profile(worker_id).await?;

        if !profile.has_skills() {
            let recent = self
                .jobs
                .get_open_jobs(&OpenJobsQuery::excluding(applied.iter().copied()).limit(limit))
                .await?;
            tracing::debug!("Worker {} has no skills; returning {} recent jobs", worker_id, recent.len());
            return Ok(RankingOutcome::Ranked(
                recent
                    .into_iter()
                    .map(|job| Recommendation {
                        job,
                        score: 0.0,
                        matching_skills: Vec::new(),
                    })
                    .collect(),
            ));
        }

        let skill_names = profile.skill_names();
        let mut candidates = self
            .jobs
            .get_open_jobs(
                &OpenJobsQuery::excluding(applied.iter().copied()).with_tags(skill_names.iter().cloned()),
            )
            .await?;
        let tag_matched = candidates.len();

        if candidates.len() < limit {
            let excluded = applied.iter().copied().chain(candidates.iter().map(|j| j.id));
            let extra = self
                .jobs
                .get_open_jobs(&OpenJobsQuery::excluding(excluded).limit(limit - candidates.len()))
                .await?;
            candidates.extend(extra);
        }

        tracing::debug!(
            "Worker {}: {} tag-matched candidates, {} total",
            worker_id,
            tag_matched,
            candidates.len()
        );

        let context = WorkerContext::new(profile, self.applied_jobs(&applied).await?);
        let outcome = self.ranker.rank(&context, &candidates, limit);

        let mut by_id: HashMap<JobId, Job> = candidates.into_iter().map(|job| (job.id, job)).collect();
        Ok(outcome.map(|scored| {
            scored
                .into_iter()
                .filter_map(|m| {
                    let job = by_id.remove(&m.job_id)?;
                    let matching_skills = matching_skills(&skill_names, &job);
                    Some(Recommendation {
                        job,
                        score: m.score,
                        matching_skills,
                    })
                })
                .collect()
        }))
    }

    /// Rank a caller-supplied candidate set for a worker.
    /// Applied jobs are not excluded here.
    pub async fn score_candidates(
        &self,
        worker_id: WorkerId,
        candidates: &[Job],
        top_n: usize,
    ) -> Result<RankingOutcome<ScoredMatch>> {
        let applied = self.applications.get_applied_job_ids(worker_id).await?;
        let profile = self.profile(worker_id).await?;
        let skill_names = profile.skill_names();
        let context = WorkerContext::new(profile, self.applied_jobs(&applied).await?);

        let by_id: HashMap<JobId, &Job> = candidates.iter().map(|job| (job.id, job)).collect();
        Ok(self.ranker.rank(&context, candidates, top_n).map(|scored| {
            scored
                .into_iter()
                .map(|mut m| {
                    m.matching_skills = by_id.get(&m.job_id).map(|job| matching_skills(&skill_names, job));
                    m
                })
                .collect()
        }))
    }

    /// Open jobs most similar to `job_id`. Unknown ids are `JobNotFound`.
    pub async fn get_similar_jobs(&self, job_id: JobId, limit: usize) -> Result<RankingOutcome<SimilarJob>> {
        let reference = self.jobs.get_job(job_id).await?;

        let pool = self
            .jobs
            .get_open_jobs(&OpenJobsQuery::excluding([job_id]).limit(self.config.ranking.similar_pool_cap))
            .await?;
        tracing::debug!("Similar jobs for {}: {} candidates", job_id, pool.len());

        let outcome = self.ranker.rank_similar(&reference, &pool, limit);

        let mut by_id: HashMap<JobId, Job> = pool.into_iter().map(|job| (job.id, job)).collect();
        Ok(outcome.map(|scored| {
            scored
                .into_iter()
                .filter_map(|m| {
                    by_id.remove(&m.job_id).map(|job| SimilarJob { job, score: m.score })
                })
                .collect()
        }))
    }

    /// Open jobs within `radius_km` of `center`, nearest first
    pub async fn nearby_jobs(&self, center: Coordinates, radius_km: f64, limit: usize) -> Result<Vec<NearbyJob>> {
        if !radius_km.is_finite() || radius_km < 0.0 {
            return Err(MatchingError::InvalidInput(format!("radius must be >= 0 km, got {}", radius_km)));
        }
        let center = Coordinates::new(center.latitude, center.longitude)?;

        let bounds = BoundingBox::around(center, radius_km);
        let boxed = self.jobs.get_open_jobs_within(&bounds).await?;
        let nearby = location::filter_nearby(center, radius_km, boxed, limit);

        tracing::debug!(
            "Nearby ({:.4}, {:.4}) r={}km: {} jobs",
            center.latitude,
            center.longitude,
            radius_km,
            nearby.len()
        );
        Ok(nearby)
    }

    fn geocoder(&self) -> Result<&Arc<dyn Geocoder>> {
        self.geocoder
            .as_ref()
            .ok_or_else(|| MatchingError::Geocoder("no geocoder configured".to_string()))
    }

    pub async fn geocode(&self, address: &str) -> Result<Option<Coordinates>> {
        let geocoder = self.geocoder()?;
        tracing::debug!("Geocoding '{}' via {}", address, geocoder.name());
        geocoder.geocode(address).await
    }

    pub async fn reverse_geocode(&self, coordinates: Coordinates) -> Result<Option<Address>> {
        let geocoder = self.geocoder()?;
        tracing::debug!("Reverse geocoding {:?} via {}", coordinates, geocoder.name());
        geocoder.reverse(coordinates).await
    }

    /// Popular tags matching `query` that the worker doesn't list yet
    pub async fn suggest_skills(&self, worker_id: WorkerId, query: &str) -> Result<Vec<SkillSuggestion>> {
        let existing = self.profile(worker_id).await?.skill_names();
        skills::suggest(
            self.catalog.as_ref(),
            query,
            &existing,
            self.config.skills.suggestion_limit,
            self.config.skills.fuzzy_threshold,
        )
        .await
    }

    pub async fn top_skills(&self, limit: usize) -> Result<Vec<TagCount>> {
        self.catalog.top_tags(limit).await
    }

    /// Refit the ranker vocabulary on current open jobs
    pub async fn retrain_ranker(&self) -> Result<usize> {
        let jobs = self.jobs.get_open_jobs(&OpenJobsQuery::default()).await?;
        self.ranker.retrain(&jobs)?;
        Ok(jobs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NewJob;

    async fn engine() -> (MatchingEngine, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
        (MatchingEngine::with_sqlite(store.clone(), MatcherConfig::default()), store)
    }

    #[tokio::test]
    async fn test_engine_creation() {
        let result = MatchingEngine::new(":memory:").await;
        assert!(result.is_ok());
        assert_eq!(result.unwrap().ranker_name(), "tfidf");
    }

    #[test]
    fn test_matching_skills_case_insensitive_in_tag_order() {
        let skills = HashSet::from(["plumber".to_string(), "painter".to_string()]);
        let job = Job::new(1, "x", "").with_tags(["Painter", "urgent", "PLUMBER", "painter"]);
        assert_eq!(matching_skills(&skills, &job), vec!["painter", "plumber"]);
    }

    #[tokio::test]
    async fn test_zero_limit_is_empty() {
        let (engine, store) = engine().await;
        store.create_job(&NewJob::new("a", "b")).await.unwrap();
        let outcome = engine.get_job_recommendations(WorkerId(1), 0).await.unwrap();
        assert!(outcome.is_empty());
    }

    #[tokio::test]
    async fn test_top_up_with_untagged_jobs() {
        let (engine, store) = engine().await;
        store.add_skill(WorkerId(1), "plumber", 2).await.unwrap();
        store.create_job(&NewJob::new("Need a plumber", "pipe").tags(["plumber"])).await.unwrap();
        store.create_job(&NewJob::new("Paint fence", "white paint").tags(["painter"])).await.unwrap();
        store.create_job(&NewJob::new("Move sofa", "heavy lifting").tags(["mover"])).await.unwrap();

        let recs = engine.get_job_recommendations(WorkerId(1), 2).await.unwrap().into_vec();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].job.title, "Need a plumber");
        assert_eq!(recs[0].matching_skills, vec!["plumber"]);
        assert!(recs[1].matching_skills.is_empty());
    }

    #[tokio::test]
    async fn test_nearby_rejects_negative_radius() {
        let (engine, _) = engine().await;
        let center = Coordinates::new(19.0, 72.0).unwrap();
        let err = engine.nearby_jobs(center, -1.0, 10).await.unwrap_err();
        assert!(matches!(err, MatchingError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_geocode_without_geocoder() {
        let (engine, _) = engine().await;
        assert!(matches!(engine.geocode("Pune").await, Err(MatchingError::Geocoder(_))));
    }

    #[tokio::test]
    async fn test_retrain_ranker_counts_open_jobs() {
        let (engine, store) = engine().await;
        store.create_job(&NewJob::new("Fix tap", "kitchen sink")).await.unwrap();
        assert_eq!(engine.retrain_ranker().await.unwrap(), 1);
    }
}
