mod ranking;

pub use ranking::{
    BudgetConfig, ColdStartThresholds, ConfigSnapshot, ConfigStore, DiversityConfig,
    GroupSizeWeights, PopularityDimensionConfig, PopularityWeights, RankingConfig,
    ScoringWeights, SegmentBoostTable, UrbanWeights, VectorizationConfig,
};

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Process-level settings for the popularity refresh worker and caches
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service_name: String,

    // Redis (cache + feedback stream)
    pub redis_url: String,

    // Catalog snapshot consumed by the refresh job (JSON array of entities)
    pub catalog_snapshot_path: String,

    // Optional JSON file overriding the built-in RankingConfig
    #[serde(default)]
    pub ranking_config_path: Option<String>,

    // Popularity refresh schedule
    pub popularity_refresh_interval_secs: u64,
    pub run_once: bool,

    // Cache TTLs
    pub popularity_ttl_secs: u64,
    pub vector_ttl_secs: u64,
    pub response_ttl_secs: u64,

    // Interaction feedback stream
    pub feedback_stream_key: String,
    pub feedback_stream_maxlen: usize,

    // Observability
    pub log_format: String,
    /// Prometheus textfile written after each refresh pass
    #[serde(default)]
    pub metrics_textfile_path: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .set_default("service_name", "travel-ranking")?
            .set_default("redis_url", "redis://localhost:6379")?
            .set_default("catalog_snapshot_path", "data/catalog.json")?
            .set_default("popularity_refresh_interval_secs", 21_600)? // 6 hours
            .set_default("run_once", true)?
            .set_default("popularity_ttl_secs", ranking_cache::ttl::POPULARITY)?
            .set_default("vector_ttl_secs", ranking_cache::ttl::VECTOR)?
            .set_default("response_ttl_secs", ranking_cache::ttl::RECOMMENDATIONS)?
            .set_default("feedback_stream_key", "travel:feedback")?
            .set_default("feedback_stream_maxlen", 100_000)?
            .set_default("log_format", "text")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        config.try_deserialize()
    }

    pub fn validate(&self) -> Result<()> {
        if self.redis_url.is_empty() {
            return Err(anyhow!("Redis URL is required"));
        }

        if self.catalog_snapshot_path.is_empty() {
            return Err(anyhow!("Catalog snapshot path is required"));
        }

        if !self.run_once && self.popularity_refresh_interval_secs == 0 {
            return Err(anyhow!(
                "Popularity refresh interval must be greater than 0 when running continuously"
            ));
        }

        if self.popularity_ttl_secs == 0 || self.vector_ttl_secs == 0 || self.response_ttl_secs == 0
        {
            return Err(anyhow!("Cache TTLs must be greater than 0"));
        }

        if !matches!(self.log_format.as_str(), "text" | "json") {
            return Err(anyhow!(
                "LOG_FORMAT must be 'text' or 'json', got '{}'",
                self.log_format
            ));
        }

        Ok(())
    }

    /// Built-in ranking config, or the JSON override when configured
    pub fn load_ranking_config(&self) -> Result<RankingConfig> {
        match &self.ranking_config_path {
            Some(path) => RankingConfig::from_json_file(path)
                .map_err(|e| anyhow!("failed to load ranking config from {}: {}", path, e)),
            None => Ok(RankingConfig::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            service_name: "travel-ranking".to_string(),
            redis_url: "redis://localhost".to_string(),
            catalog_snapshot_path: "data/catalog.json".to_string(),
            ranking_config_path: None,
            popularity_refresh_interval_secs: 3600,
            run_once: false,
            popularity_ttl_secs: 3600,
            vector_ttl_secs: 3600,
            response_ttl_secs: 600,
            feedback_stream_key: "travel:feedback".to_string(),
            feedback_stream_maxlen: 1000,
            log_format: "json".to_string(),
            metrics_textfile_path: None,
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn test_zero_interval_rejected_when_looping() {
        let mut config = test_config();
        config.popularity_refresh_interval_secs = 0;
        assert!(config.validate().is_err());

        config.run_once = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_log_format_rejected() {
        let mut config = test_config();
        config.log_format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_ranking_config_without_override() {
        let ranking = test_config().load_ranking_config().unwrap();
        assert!(ranking.validate().is_ok());
    }
}
