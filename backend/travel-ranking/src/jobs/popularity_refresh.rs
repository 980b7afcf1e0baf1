// ============================================
// Popularity Refresh Job
// ============================================
//
// Periodic batch job that recomputes popularity for the whole catalog and
// swaps the cached generation.
//
// Workflow:
// 1. Load the catalog snapshot
// 2. Compute popularity for every entity (partial failures are logged)
// 3. Drop all popularity keys, then write global / category / segment
//    snapshots
//
// Usage:
//   RUN_ONCE=false POPULARITY_REFRESH_INTERVAL_SECS=21600 travel-ranking

use crate::config::{Config, ConfigStore};
use crate::metrics;
use crate::models::Entity;
use crate::services::popularity::{PopularityCache, PopularityEngine};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ranking_cache::CacheOperations;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Where the job reads catalog entities from
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn load(&self) -> Result<Vec<Entity>>;
}

/// Catalog exported as a JSON array of entities. Records that do not
/// deserialize are skipped.
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalog {
    async fn load(&self) -> Result<Vec<Entity>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read catalog {}", self.path.display()))?;
        let records: Vec<serde_json::Value> =
            serde_json::from_str(&raw).context("Catalog must be a JSON array")?;

        let total = records.len();
        let entities: Vec<Entity> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| match serde_json::from_value::<Entity>(record) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed catalog record");
                    None
                }
            })
            .collect();

        info!(
            path = %self.path.display(),
            loaded = entities.len(),
            skipped = total - entities.len(),
            "Catalog loaded"
        );
        Ok(entities)
    }
}

#[derive(Debug, Clone)]
pub struct RefreshJobConfig {
    /// Whether to run continuously or exit after one pass
    pub run_once: bool,
    /// Interval between passes (if not run_once)
    pub interval_secs: u64,
    /// Prometheus textfile refreshed after every pass
    pub metrics_textfile_path: Option<PathBuf>,
}

impl Default for RefreshJobConfig {
    fn default() -> Self {
        Self {
            run_once: true,
            interval_secs: 3600 * 6, // 6 hours
            metrics_textfile_path: None,
        }
    }
}

impl From<&Config> for RefreshJobConfig {
    fn from(config: &Config) -> Self {
        Self {
            run_once: config.run_once,
            interval_secs: config.popularity_refresh_interval_secs,
            metrics_textfile_path: config.metrics_textfile_path.as_ref().map(PathBuf::from),
        }
    }
}

/// Popularity refresh statistics
#[derive(Debug, Clone, Default)]
pub struct RefreshStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub config_version: u64,
    pub entities_loaded: usize,
    pub scores_computed: usize,
    pub entities_omitted: usize,
    pub snapshots_written: usize,
    pub total_duration_ms: u64,
}

pub struct PopularityRefreshJob<C: CacheOperations> {
    config: RefreshJobConfig,
    source: Arc<dyn CatalogSource>,
    cache: PopularityCache<C>,
    ranking_config: Arc<ConfigStore>,
}

impl<C: CacheOperations> PopularityRefreshJob<C> {
    pub fn new(
        config: RefreshJobConfig,
        source: Arc<dyn CatalogSource>,
        cache: PopularityCache<C>,
        ranking_config: Arc<ConfigStore>,
    ) -> Self {
        Self {
            config,
            source,
            cache,
            ranking_config,
        }
    }

    /// Run the job; returns after one pass when `run_once` is set
    pub async fn run(&self) -> Result<RefreshStats> {
        loop {
            let pass = self.run_single_pass().await;
            self.export_metrics(&pass).await;

            match pass {
                Ok(stats) => {
                    info!(
                        loaded = stats.entities_loaded,
                        computed = stats.scores_computed,
                        omitted = stats.entities_omitted,
                        snapshots = stats.snapshots_written,
                        duration_ms = stats.total_duration_ms,
                        "Popularity refresh pass completed"
                    );
                    if self.config.run_once {
                        return Ok(stats);
                    }
                }
                Err(e) => {
                    if self.config.run_once {
                        return Err(e);
                    }
                    error!(error = %e, "Popularity refresh pass failed, retrying next interval");
                }
            }

            info!(
                interval_secs = self.config.interval_secs,
                "Sleeping until next pass"
            );
            sleep(Duration::from_secs(self.config.interval_secs)).await;
        }
    }

    async fn export_metrics(&self, pass: &Result<RefreshStats>) {
        match pass {
            Ok(stats) => metrics::record_refresh_success(
                stats.scores_computed,
                stats.completed_at.unwrap_or_else(Utc::now).timestamp(),
            ),
            Err(_) => metrics::record_refresh_failure(),
        }

        if let Some(path) = &self.config.metrics_textfile_path {
            if let Err(e) = metrics::write_textfile(prometheus::default_registry(), path).await {
                warn!(path = %path.display(), error = %e, "Failed to export metrics");
            }
        }
    }

    /// Run a single refresh pass
    pub async fn run_single_pass(&self) -> Result<RefreshStats> {
        let start_time = Instant::now();
        let now = Utc::now();
        let snapshot = self.ranking_config.snapshot();
        let mut stats = RefreshStats {
            started_at: Some(now),
            config_version: snapshot.version,
            ..Default::default()
        };

        let entities = self.source.load().await?;
        stats.entities_loaded = entities.len();

        let batch = PopularityEngine::new(snapshot.config.popularity.clone())
            .compute_all(&entities, now);
        stats.scores_computed = batch.scores.len();
        stats.entities_omitted = batch.errors.len();

        stats.snapshots_written = self
            .cache
            .refresh(&batch, &snapshot.config.segment_boosts, now)
            .await
            .context("Failed to refresh popularity cache")?;

        stats.completed_at = Some(Utc::now());
        stats.total_duration_ms = start_time.elapsed().as_millis() as u64;
        Ok(stats)
    }
}
