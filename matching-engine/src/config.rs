use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{MatchingError, Result};

/// Engine configuration.
///
/// Loaded from YAML; every field has a default so a partial file (or no
/// file at all) is fine. Environment variables win over the file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MatcherConfig {
    pub database_path: String,
    pub server: ServerConfig,
    pub ranking: RankingConfig,
    pub location: LocationConfig,
    pub skills: SkillsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RankingConfig {
    pub default_top_n: usize,
    pub similar_limit: usize,
    /// Most candidates considered for similar jobs
    pub similar_pool_cap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LocationConfig {
    pub default_radius_km: f64,
    pub default_limit: usize,
    pub nominatim_url: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SkillsConfig {
    pub suggestion_limit: usize,
    pub top_limit: usize,
    pub fuzzy_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            database_path: "kaamconnect.db".to_string(),
            server: ServerConfig::default(),
            ranking: RankingConfig::default(),
            location: LocationConfig::default(),
            skills: SkillsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8090,
        }
    }
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            default_top_n: 10,
            similar_limit: 5,
            similar_pool_cap: 100,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            default_radius_km: 10.0,
            default_limit: 20,
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: "kaamconnect".to_string(),
            timeout_secs: 10,
        }
    }
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            suggestion_limit: 10,
            top_limit: 20,
            fuzzy_threshold: 0.85,
        }
    }
}

impl LocationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl MatcherConfig {
    /// Parse YAML text
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: MatcherConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| MatchingError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&yaml)
    }

    /// File named by `MATCHER_CONFIG` (or defaults), then environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("MATCHER_CONFIG") {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `DB_PATH`, `HOST`, `PORT` and `NOMINATIM_URL` from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(db_path) = lookup("DB_PATH") {
            self.database_path = db_path;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| MatchingError::Config(format!("PORT is not a port number: {}", port)))?;
        }
        if let Some(url) = lookup("NOMINATIM_URL") {
            self.location.nominatim_url = url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.ranking.similar_pool_cap == 0 {
            return Err(MatchingError::Config("ranking.similar_pool_cap must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.skills.fuzzy_threshold) {
            return Err(MatchingError::Config(format!(
                "skills.fuzzy_threshold must be in [0, 1], got {}",
                self.skills.fuzzy_threshold
            )));
        }
        if self.location.default_radius_km < 0.0 {
            return Err(MatchingError::Config("location.default_radius_km must be >= 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::default();
        assert_eq!(config.ranking.default_top_n, 10);
        assert_eq!(config.ranking.similar_limit, 5);
        assert_eq!(config.ranking.similar_pool_cap, 100);
        assert_eq!(config.location.default_radius_km, 10.0);
        assert_eq!(config.skills.suggestion_limit, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = MatcherConfig::from_yaml(
            "database_path: /var/lib/kaam.db\nranking:\n  default_top_n: 25\n",
        )
        .unwrap();
        assert_eq!(config.database_path, "/var/lib/kaam.db");
        assert_eq!(config.ranking.default_top_n, 25);
        assert_eq!(config.ranking.similar_limit, 5);
        assert_eq!(config.server.port, 8090);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = MatcherConfig::from_yaml("ranking: [1, 2").unwrap_err();
        assert!(matches!(err, MatchingError::Config(_)));

        let err = MatcherConfig::from_yaml("skills:\n  fuzzy_threshold: 3.0\n").unwrap_err();
        assert!(matches!(err, MatchingError::Config(_)));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([("DB_PATH", "test.db"), ("PORT", "9000")]);
        let mut config = MatcherConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.database_path, "test.db");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");

        let mut config = MatcherConfig::default();
        let bad = config.apply_overrides(|key| (key == "PORT").then(|| "http".to_string()));
        assert!(bad.is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = MatcherConfig::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, MatchingError::Config(_)));
    }
}
