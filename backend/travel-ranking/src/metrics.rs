//! Prometheus metrics for the refresh worker.
//!
//! The worker has no HTTP surface, so the exposition is written to a
//! textfile (node exporter textfile collector format) after every pass.

use anyhow::{Context, Result};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use ranking_cache::CacheMetrics;
use std::path::Path;
use std::sync::OnceLock;

static METRICS: OnceLock<RefreshMetrics> = OnceLock::new();

struct RefreshMetrics {
    passes: IntCounterVec,
    last_success_timestamp: IntGauge,
    scores_computed: IntGauge,
}

impl RefreshMetrics {
    fn new() -> Self {
        Self {
            passes: IntCounterVec::new(
                Opts::new(
                    "travel_ranking_refresh_passes_total",
                    "Popularity refresh passes by outcome",
                ),
                &["outcome"],
            )
            .expect("valid metric definition"),
            last_success_timestamp: IntGauge::new(
                "travel_ranking_refresh_last_success_timestamp_seconds",
                "Unix time of the last successful popularity refresh",
            )
            .expect("valid metric definition"),
            scores_computed: IntGauge::new(
                "travel_ranking_refresh_scores_computed",
                "Popularity scores written by the last successful refresh",
            )
            .expect("valid metric definition"),
        }
    }
}

fn get_metrics() -> &'static RefreshMetrics {
    METRICS.get_or_init(RefreshMetrics::new)
}

/// Register worker and cache metrics with `registry`
pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
    let metrics = get_metrics();
    registry.register(Box::new(metrics.passes.clone()))?;
    registry.register(Box::new(metrics.last_success_timestamp.clone()))?;
    registry.register(Box::new(metrics.scores_computed.clone()))?;
    CacheMetrics::register(registry)
}

pub fn record_refresh_success(scores_computed: usize, completed_at_unix: i64) {
    let metrics = get_metrics();
    metrics.passes.with_label_values(&["success"]).inc();
    metrics.last_success_timestamp.set(completed_at_unix);
    metrics.scores_computed.set(scores_computed as i64);
}

pub fn record_refresh_failure() {
    get_metrics().passes.with_label_values(&["failure"]).inc();
}

/// Text exposition of everything registered with `registry`
pub fn render(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .context("Failed to encode metrics")?;
    String::from_utf8(buffer).context("Metrics exposition is not UTF-8")
}

/// Write the exposition next to `path` and rename it into place so the
/// collector never reads a partial file
pub async fn write_textfile(registry: &Registry, path: &Path) -> Result<()> {
    let body = render(registry)?;
    let tmp = path.with_extension("prom.tmp");
    tokio::fs::write(&tmp, body)
        .await
        .with_context(|| format!("Failed to write {}", tmp.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to move metrics into {}", path.display()))?;
    Ok(())
}
