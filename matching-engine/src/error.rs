use thiserror::Error;

use crate::core::JobId;

/// Main error type for the matching engine
#[derive(Error, Debug)]
pub enum MatchingError {
    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// HTTP request errors
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration could not be read or parsed
    #[error("Config error: {0}")]
    Config(String),

    /// Geocoding service errors
    #[error("Geocoder error: {0}")]
    Geocoder(String),

    /// Referenced job does not exist
    #[error("Job {0} not found")]
    JobNotFound(JobId),

    /// Worker already lists this skill
    #[error("Skill '{0}' already exists in profile")]
    SkillExists(String),

    /// Skill row does not exist for this worker
    #[error("Skill {0} not found")]
    SkillNotFound(i64),

    /// Caller supplied an out-of-range or malformed argument
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl MatchingError {
    /// Whether this is a lookup failure the caller should surface as "not found"
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::JobNotFound(_) | Self::SkillNotFound(_))
    }
}

impl From<String> for MatchingError {
    fn from(s: String) -> Self {
        MatchingError::Other(s)
    }
}

impl From<&str> for MatchingError {
    fn from(s: &str) -> Self {
        MatchingError::Other(s.to_string())
    }
}

impl From<serde_yaml::Error> for MatchingError {
    fn from(e: serde_yaml::Error) -> Self {
        MatchingError::Config(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, MatchingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(MatchingError::JobNotFound(JobId(7)).is_not_found());
        assert!(MatchingError::SkillNotFound(3).is_not_found());
        assert!(!MatchingError::InvalidInput("radius".into()).is_not_found());
    }

    #[test]
    fn test_display() {
        let err = MatchingError::JobNotFound(JobId(42));
        assert_eq!(err.to_string(), "Job 42 not found");
    }
}
