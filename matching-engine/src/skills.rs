//! Skill suggestions from the tags clients actually use.

use rapidfuzz::distance::jaro_winkler;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error::Result;
use crate::store::{SkillCatalog, TagCount};

/// Queries shorter than this return nothing
pub const MIN_QUERY_LEN: usize = 2;

/// How many popular tags the fuzzy fallback looks at
const FUZZY_POOL: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSuggestion {
    pub skill: String,
    /// Number of jobs tagged with this skill
    pub popularity: u64,
}

impl From<TagCount> for SkillSuggestion {
    fn from(tag: TagCount) -> Self {
        Self {
            skill: tag.tag,
            popularity: tag.count,
        }
    }
}

/// Jaro-Winkler similarity between two lowercased strings, 0.0 - 1.0
pub fn fuzzy_similarity(a: &str, b: &str) -> f64 {
    jaro_winkler::normalized_similarity(a.chars(), b.chars())
}

/// Suggest skills for a partially typed `query`.
///
/// Substring matches come first, ordered by popularity. When nothing
/// contains the query (usually a typo), popular tags are ranked by fuzzy
/// similarity instead and kept if they reach `fuzzy_threshold`. Skills in
/// `existing` are never suggested.
pub async fn suggest(
    catalog: &dyn SkillCatalog,
    query: &str,
    existing: &HashSet<String>,
    limit: usize,
    fuzzy_threshold: f64,
) -> Result<Vec<SkillSuggestion>> {
    let query = query.trim().to_lowercase();
    if query.chars().count() < MIN_QUERY_LEN || limit == 0 {
        return Ok(Vec::new());
    }

    // Over-fetch so that dropping the worker's own skills still leaves `limit`
    let fetch = limit + existing.len();
    let substring: Vec<SkillSuggestion> = catalog
        .tag_popularity(&query, fetch)
        .await?
        .into_iter()
        .filter(|t| !existing.contains(&t.tag))
        .take(limit)
        .map(SkillSuggestion::from)
        .collect();

    if !substring.is_empty() {
        return Ok(substring);
    }

    let mut fuzzy: Vec<(f64, SkillSuggestion)> = catalog
        .top_tags(FUZZY_POOL)
        .await?
        .into_iter()
        .filter(|t| !existing.contains(&t.tag))
        .filter_map(|t| {
            let score = fuzzy_similarity(&query, &t.tag);
            (score >= fuzzy_threshold).then(|| (score, SkillSuggestion::from(t)))
        })
        .collect();

    // Best match first; popularity order from the store breaks ties
    fuzzy.sort_by(|a, b| b.0.total_cmp(&a.0));
    tracing::debug!("Fuzzy skill fallback for '{}' found {} tags", query, fuzzy.len());

    Ok(fuzzy.into_iter().take(limit).map(|(_, s)| s).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FixedCatalog(Vec<TagCount>);

    #[async_trait]
    impl SkillCatalog for FixedCatalog {
        async fn tag_popularity(&self, fragment: &str, limit: usize) -> Result<Vec<TagCount>> {
            Ok(self.0.iter().filter(|t| t.tag.contains(fragment)).take(limit).cloned().collect())
        }

        async fn top_tags(&self, limit: usize) -> Result<Vec<TagCount>> {
            Ok(self.0.iter().take(limit).cloned().collect())
        }
    }

    fn catalog() -> FixedCatalog {
        FixedCatalog(vec![
            TagCount { tag: "plumber".into(), count: 9 },
            TagCount { tag: "painter".into(), count: 6 },
            TagCount { tag: "plumbing repair".into(), count: 2 },
            TagCount { tag: "electrician".into(), count: 1 },
        ])
    }

    #[tokio::test]
    async fn test_short_query_returns_nothing() {
        let result = suggest(&catalog(), " p ", &HashSet::new(), 10, 0.85).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_substring_matches_exclude_existing_skills() {
        let existing = HashSet::from(["plumber".to_string()]);
        let result = suggest(&catalog(), "PLUMB", &existing, 10, 0.85).await.unwrap();
        assert_eq!(
            result,
            vec![SkillSuggestion { skill: "plumbing repair".into(), popularity: 2 }]
        );
    }

    #[tokio::test]
    async fn test_fuzzy_fallback_catches_typos() {
        let result = suggest(&catalog(), "plumbr", &HashSet::new(), 10, 0.85).await.unwrap();
        assert_eq!(result[0].skill, "plumber");
        assert!(result.iter().all(|s| s.skill != "electrician"));
    }

    #[test]
    fn test_fuzzy_similarity_bounds() {
        assert_eq!(fuzzy_similarity("plumber", "plumber"), 1.0);
        assert!(fuzzy_similarity("plumber", "xyz") < 0.5);
    }
}
