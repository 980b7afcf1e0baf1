use anyhow::Context;
use ranking_cache::{RedisCache, SharedRedis};
use redis::aio::ConnectionManager;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use travel_ranking::{
    jobs::{JsonFileCatalog, PopularityRefreshJob, RefreshJobConfig},
    metrics,
    services::PopularityCache,
    Config, ConfigStore,
};

fn init_tracing(log_format: &str) {
    let registry = tracing_subscriber::registry().with(EnvFilter::from_default_env());
    if log_format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load config
    let config = Config::from_env().context("Failed to load config")?;

    // Initialize tracing
    init_tracing(&config.log_format);

    config.validate()?;
    let ranking_config = config.load_ranking_config()?;
    let store = Arc::new(ConfigStore::new(ranking_config)?);
    metrics::register(prometheus::default_registry()).context("Failed to register metrics")?;

    info!(
        service = %config.service_name,
        catalog = %config.catalog_snapshot_path,
        run_once = config.run_once,
        config_fingerprint = %store.snapshot().fingerprint,
        "Starting popularity refresh worker"
    );

    // Initialize Redis connection
    let client =
        redis::Client::open(config.redis_url.as_str()).context("Invalid Redis URL")?;
    let manager = ConnectionManager::new(client)
        .await
        .context("Failed to connect to Redis")?;
    let redis: SharedRedis = Arc::new(Mutex::new(manager));

    let cache = Arc::new(RedisCache::new(redis));
    let popularity = PopularityCache::new(cache, config.popularity_ttl_secs);

    let job = PopularityRefreshJob::new(
        RefreshJobConfig::from(&config),
        Arc::new(JsonFileCatalog::new(&config.catalog_snapshot_path)),
        popularity,
        store,
    );

    let stats = job.run().await?;
    info!(
        computed = stats.scores_computed,
        snapshots = stats.snapshots_written,
        "Popularity refresh worker finished"
    );

    Ok(())
}
