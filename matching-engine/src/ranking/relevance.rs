use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::core::{Job, RankingOutcome, ScoredMatch, WorkerContext};
use crate::ranking::tfidf::{tokenize, TfIdfVectorizer};
use crate::ranking::Ranker;

/// Default number of matches returned by [`RelevanceRanker::calculate_similarity`]
pub const DEFAULT_TOP_N: usize = 10;

/// Job text: title, description, then tags, lowercased
pub fn job_features(job: &Job) -> String {
    format!("{} {} {}", job.title, job.description, job.tags.join(" ")).to_lowercase()
}

fn bigram(a: &str, b: &str) -> String {
    format!("{} {}", a, b)
}

/// Worker term frequencies.
///
/// Equal to the n-gram counts of the text "each skill name repeated once per
/// year of experience (at least once), then title and description of every
/// applied job", computed without building the repeated text.
pub fn worker_terms(worker: &WorkerContext) -> HashMap<String, f64> {
    let mut weights: HashMap<String, f64> = HashMap::new();
    let mut add = |term: String, weight: f64| {
        if weight > 0.0 {
            *weights.entry(term).or_insert(0.0) += weight;
        }
    };

    // Last token emitted so far; the next segment's first token pairs with it
    let mut previous: Option<String> = None;

    for skill in &worker.profile.skills {
        let tokens = tokenize(&skill.name);
        let (Some(first), Some(last)) = (tokens.first(), tokens.last()) else {
            continue;
        };
        let repeats = f64::from(skill.experience_years.max(1));

        if let Some(prev) = previous.take() {
            add(bigram(&prev, first), 1.0);
        }
        for token in &tokens {
            add(token.clone(), repeats);
        }
        for pair in tokens.windows(2) {
            add(bigram(&pair[0], &pair[1]), repeats);
        }
        // Where one repetition of the name runs into the next
        add(bigram(last, first), repeats - 1.0);
        previous = Some(last.clone());
    }

    let applied: Vec<String> = worker
        .applied_jobs
        .iter()
        .map(|job| format!("{} {}", job.title, job.description))
        .collect();
    let tokens = tokenize(&applied.join(" "));

    if let (Some(prev), Some(first)) = (previous, tokens.first()) {
        add(bigram(&prev, first), 1.0);
    }
    for token in &tokens {
        add(token.clone(), 1.0);
    }
    for pair in tokens.windows(2) {
        add(bigram(&pair[0], &pair[1]), 1.0);
    }

    weights
}

/// Rescale into [0, 1]. A zero-range batch maps every score to 0.
fn min_max_normalize(scores: &mut [f64]) {
    let min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = max - min;
    for score in scores.iter_mut() {
        *score = if range > 0.0 { (*score - min) / range } else { 0.0 };
    }
}

/// Stable sort descending, then cap
fn take_top(mut matches: Vec<ScoredMatch>, n: usize) -> Vec<ScoredMatch> {
    matches.sort_by(|a, b| b.score.total_cmp(&a.score));
    matches.truncate(n);
    matches
}

/// TF-IDF relevance ranker with a lazily trained vocabulary.
///
/// The vocabulary is either untrained (`None`) or trained. Training happens
/// under the write lock, so no caller ever sees a half-built vocabulary;
/// scoring against a trained vocabulary only needs a read lock.
#[derive(Debug, Default)]
pub struct RelevanceRanker {
    vectorizer: RwLock<Option<Arc<TfIdfVectorizer>>>,
    trainings: AtomicUsize,
}

impl RelevanceRanker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_trained(&self) -> bool {
        self.vectorizer.read().map(|v| v.is_some()).unwrap_or(false)
    }

    /// How many vocabularies have been fitted so far
    pub fn training_count(&self) -> usize {
        self.trainings.load(Ordering::Relaxed)
    }

    /// Replace the vocabulary with one fitted on `jobs`
    pub fn retrain(&self, jobs: &[Job]) -> crate::error::Result<()> {
        let texts: Vec<String> = jobs.iter().map(job_features).collect();
        let fitted = Arc::new(TfIdfVectorizer::fit(&texts)?);
        tracing::info!(
            "TF-IDF vectorizer trained on {} jobs ({} terms)",
            fitted.documents(),
            fitted.vocabulary_size()
        );
        let mut guard = self
            .vectorizer
            .write()
            .map_err(|_| crate::error::MatchingError::Other("vectorizer lock poisoned".into()))?;
        *guard = Some(fitted);
        self.trainings.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Forget the vocabulary; the next call trains again
    pub fn reset(&self) {
        if let Ok(mut guard) = self.vectorizer.write() {
            *guard = None;
        }
    }

    /// Trained vocabulary, fitting on `training` first if there is none yet
    fn trained(&self, training: &[Job]) -> Result<Arc<TfIdfVectorizer>, String> {
        if let Ok(guard) = self.vectorizer.read() {
            if let Some(fitted) = guard.as_ref() {
                return Ok(Arc::clone(fitted));
            }
        }

        let mut guard = self
            .vectorizer
            .write()
            .map_err(|_| "vectorizer lock poisoned".to_string())?;
        // Another caller may have trained while we waited for the lock
        if let Some(fitted) = guard.as_ref() {
            return Ok(Arc::clone(fitted));
        }

        let texts: Vec<String> = training.iter().map(job_features).collect();
        let fitted = Arc::new(TfIdfVectorizer::fit(&texts).map_err(|e| e.to_string())?);
        tracing::info!(
            "TF-IDF vectorizer trained on {} jobs ({} terms)",
            fitted.documents(),
            fitted.vocabulary_size()
        );
        *guard = Some(Arc::clone(&fitted));
        self.trainings.fetch_add(1, Ordering::Relaxed);
        Ok(fitted)
    }

    /// Score `jobs` against a worker, best first, at most `top_n`.
    ///
    /// Scores are min-max scaled when more than one job is scored; a single
    /// job keeps its raw cosine. Never fails: internal errors come back as
    /// [`RankingOutcome::Degraded`].
    pub fn calculate_similarity(
        &self,
        worker: &WorkerContext,
        jobs: &[Job],
        top_n: usize,
    ) -> RankingOutcome<ScoredMatch> {
        if jobs.is_empty() {
            return RankingOutcome::Ranked(Vec::new());
        }

        let vectorizer = match self.trained(jobs) {
            Ok(v) => v,
            Err(reason) => {
                tracing::warn!("Error calculating job matches: {}", reason);
                return RankingOutcome::degraded(reason);
            }
        };

        let worker_vec = vectorizer.transform_weighted(worker_terms(worker));
        if worker_vec.is_zero() {
            tracing::debug!("Worker {} shares no terms with the vocabulary", worker.profile.id);
        }
        let mut scores: Vec<f64> = jobs
            .iter()
            .map(|job| worker_vec.cosine(&vectorizer.transform(&job_features(job))))
            .collect();

        if scores.len() > 1 {
            min_max_normalize(&mut scores);
        }

        let matches = jobs
            .iter()
            .zip(scores)
            .map(|(job, score)| ScoredMatch::new(job.id, score))
            .collect();

        RankingOutcome::Ranked(take_top(matches, top_n))
    }

    /// Score `candidates` against a reference job by raw cosine, best first
    pub fn score_job_pair_batch(&self, reference: &Job, candidates: &[Job], top_n: usize) -> RankingOutcome<ScoredMatch> {
        if candidates.is_empty() {
            return RankingOutcome::Ranked(Vec::new());
        }

        let mut training = Vec::with_capacity(candidates.len() + 1);
        training.push(reference.clone());
        training.extend_from_slice(candidates);

        let vectorizer = match self.trained(&training) {
            Ok(v) => v,
            Err(reason) => {
                tracing::warn!("Error finding similar jobs: {}", reason);
                return RankingOutcome::degraded(reason);
            }
        };

        let reference_vec = vectorizer.transform(&job_features(reference));
        if reference_vec.is_zero() {
            tracing::debug!("Job {} shares no terms with the vocabulary", reference.id);
        }
        let matches = candidates
            .iter()
            .map(|job| {
                let score = reference_vec.cosine(&vectorizer.transform(&job_features(job)));
                ScoredMatch::new(job.id, score)
            })
            .collect();

        RankingOutcome::Ranked(take_top(matches, top_n))
    }
}

impl Ranker for RelevanceRanker {
    fn rank(&self, worker: &WorkerContext, jobs: &[Job], top_n: usize) -> RankingOutcome<ScoredMatch> {
        self.calculate_similarity(worker, jobs, top_n)
    }

    fn rank_similar(&self, reference: &Job, candidates: &[Job], top_n: usize) -> RankingOutcome<ScoredMatch> {
        self.score_job_pair_batch(reference, candidates, top_n)
    }

    fn retrain(&self, jobs: &[Job]) -> crate::error::Result<()> {
        RelevanceRanker::retrain(self, jobs)
    }

    fn name(&self) -> &str {
        "tfidf"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{JobId, Skill, WorkerProfile};

    fn plumber() -> WorkerContext {
        WorkerContext::from_profile(WorkerProfile::new(1, vec![Skill::new("plumber", 3)]))
    }

    fn plumbing_job() -> Job {
        Job::new(1, "Need a plumber", "fix leaking pipe").with_tags(["plumber"])
    }

    fn design_job() -> Job {
        Job::new(2, "Graphic designer wanted", "logo design").with_tags(["design"])
    }

    #[test]
    fn test_job_features_order_and_case() {
        assert_eq!(job_features(&plumbing_job()), "need a plumber fix leaking pipe plumber");
    }

    #[test]
    fn test_worker_terms_count_repetitions() {
        let mut ctx = WorkerContext::from_profile(WorkerProfile::new(
            1,
            vec![Skill::new("Pipe Fitter", 3), Skill::new("Painter", 0)],
        ));
        ctx.applied_jobs.push(Job::new(9, "Fix Tap", "Kitchen"));

        // Same counts as "pipe fitter pipe fitter pipe fitter painter fix tap kitchen"
        let expected: HashMap<String, f64> = [
            ("pipe", 3.0),
            ("fitter", 3.0),
            ("pipe fitter", 3.0),
            ("fitter pipe", 2.0),
            ("fitter painter", 1.0),
            ("painter", 1.0),
            ("painter fix", 1.0),
            ("fix", 1.0),
            ("tap", 1.0),
            ("kitchen", 1.0),
            ("fix tap", 1.0),
            ("tap kitchen", 1.0),
        ]
        .into_iter()
        .map(|(t, w)| (t.to_string(), w))
        .collect();
        assert_eq!(worker_terms(&ctx), expected);
    }

    #[test]
    fn test_worker_vector_equals_repeated_text_vector() {
        let mut ctx = WorkerContext::from_profile(WorkerProfile::new(
            1,
            vec![Skill::new("plumber", 4), Skill::new("the", 2), Skill::new("tile setter", 2)],
        ));
        ctx.applied_jobs.push(Job::new(9, "Bathroom tiles", "plumber needed"));

        let text = "plumber plumber plumber plumber tile setter tile setter bathroom tiles plumber needed";
        let v = TfIdfVectorizer::fit(&[text, "logo design", "setter plumber"]).unwrap();
        assert_eq!(v.transform_weighted(worker_terms(&ctx)), v.transform(text));
    }

    #[test]
    fn test_experience_repetition_is_uncapped() {
        let ctx = WorkerContext::from_profile(WorkerProfile::new(1, vec![Skill::new("welder", 40)]));
        assert_eq!(worker_terms(&ctx)["welder"], 40.0);
    }

    #[test]
    fn test_huge_experience_ranks_without_blowing_up() {
        let veteran = WorkerContext::from_profile(WorkerProfile::new(1, vec![Skill::new("plumber", u32::MAX)]));
        let ranked = RelevanceRanker::new()
            .calculate_similarity(&veteran, &[design_job(), plumbing_job()], DEFAULT_TOP_N)
            .into_vec();
        assert_eq!(ranked[0].job_id, JobId(1));
        assert_eq!(ranked[0].score, 1.0);
    }

    #[test]
    fn test_plumber_ranks_plumbing_job_first() {
        let ranker = RelevanceRanker::new();
        let ranked = ranker
            .calculate_similarity(&plumber(), &[design_job(), plumbing_job()], DEFAULT_TOP_N)
            .into_vec();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].job_id, JobId(1));
        assert_eq!(ranked[0].score, 1.0);
        assert_eq!(ranked[1].score, 0.0);
    }

    #[test]
    fn test_empty_candidates_is_empty_not_degraded() {
        let outcome = RelevanceRanker::new().calculate_similarity(&plumber(), &[], 10);
        assert_eq!(outcome, RankingOutcome::Ranked(Vec::new()));
    }

    #[test]
    fn test_untrainable_batch_degrades() {
        let ranker = RelevanceRanker::new();
        let junk = Job::new(1, "the", "a an");
        let outcome = ranker.calculate_similarity(&plumber(), &[junk], 10);
        assert!(outcome.is_degraded());
        assert!(!ranker.is_trained());
    }

    #[test]
    fn test_single_job_keeps_raw_cosine() {
        let ranker = RelevanceRanker::new();
        let ranked = ranker.calculate_similarity(&plumber(), &[plumbing_job()], 10).into_vec();
        assert_eq!(ranked.len(), 1);

        let v = TfIdfVectorizer::fit(&[job_features(&plumbing_job())]).unwrap();
        let raw = v
            .transform_weighted(worker_terms(&plumber()))
            .cosine(&v.transform(&job_features(&plumbing_job())));
        assert!(raw > 0.0 && raw < 1.0);
        assert!((ranked[0].score - raw).abs() < 1e-12, "{} != {}", ranked[0].score, raw);
    }

    #[test]
    fn test_concurrent_first_calls_train_once() {
        let ranker = Arc::new(RelevanceRanker::new());
        let jobs = vec![design_job(), plumbing_job(), Job::new(3, "Pipe fitting", "new bathroom pipes")];

        let results: Vec<RankingOutcome<ScoredMatch>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let ranker = Arc::clone(&ranker);
                    let jobs = &jobs;
                    scope.spawn(move || ranker.calculate_similarity(&plumber(), jobs, 10))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(ranker.training_count(), 1);
        assert!(!results[0].is_degraded());
        assert!(results.iter().all(|r| r == &results[0]));
    }

    #[test]
    fn test_equal_scores_normalize_to_zero() {
        let ranker = RelevanceRanker::new();
        let a = Job::new(1, "logo design", "");
        let b = Job::new(2, "logo design", "");
        let ranked = ranker.calculate_similarity(&plumber(), &[a, b], 10).into_vec();
        assert!(ranked.iter().all(|m| m.score == 0.0));
    }

    #[test]
    fn test_ties_keep_input_order() {
        let ranker = RelevanceRanker::new();
        let jobs = vec![
            design_job(),
            Job::new(5, "Need a plumber", "fix leaking pipe").with_tags(["plumber"]),
            Job::new(3, "Need a plumber", "fix leaking pipe").with_tags(["plumber"]),
        ];
        let ids: Vec<i64> = ranker
            .calculate_similarity(&plumber(), &jobs, 10)
            .into_vec()
            .iter()
            .map(|m| m.job_id.0)
            .collect();
        assert_eq!(ids, vec![5, 3, 2]);
    }

    #[test]
    fn test_deterministic_and_bounded() {
        let ranker = RelevanceRanker::new();
        let jobs: Vec<Job> = (0..12)
            .map(|i| Job::new(i, format!("job {} plumber", i), format!("pipe number {}", i % 4)))
            .collect();
        let first = ranker.calculate_similarity(&plumber(), &jobs, 5).into_vec();
        let second = ranker.calculate_similarity(&plumber(), &jobs, 5).into_vec();
        assert_eq!(first, second);
        assert_eq!(first.len(), 5);
        assert!(first.iter().all(|m| (0.0..=1.0).contains(&m.score)));
    }

    #[test]
    fn test_trained_vocabulary_is_reused_until_retrain() {
        let ranker = RelevanceRanker::new();
        ranker.calculate_similarity(&plumber(), &[design_job()], 10);
        assert!(ranker.is_trained());

        // "plumber" is not in the design vocabulary, so nothing matches yet
        let stale = ranker.calculate_similarity(&plumber(), &[plumbing_job()], 10).into_vec();
        assert_eq!(stale[0].score, 0.0);

        ranker.retrain(&[plumbing_job(), design_job()]).unwrap();
        assert_eq!(ranker.training_count(), 2);
        let fresh = ranker.calculate_similarity(&plumber(), &[plumbing_job()], 10).into_vec();
        assert!(fresh[0].score > 0.0);

        ranker.reset();
        assert!(!ranker.is_trained());
    }

    #[test]
    fn test_job_pair_batch_prefers_shared_terms() {
        let ranker = RelevanceRanker::new();
        let reference = plumbing_job();
        let candidates = vec![
            design_job(),
            Job::new(3, "Plumber for bathroom", "leaking pipe under sink").with_tags(["plumber"]),
        ];
        let ranked = ranker.score_job_pair_batch(&reference, &candidates, 5).into_vec();
        assert_eq!(ranked[0].job_id, JobId(3));
        assert_eq!(ranked[1].score, 0.0);
        assert!(ranked.iter().all(|m| m.matching_skills.is_none()));
    }
}
