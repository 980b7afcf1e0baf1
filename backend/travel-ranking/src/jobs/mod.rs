// ============================================
// Background Jobs Module
// ============================================
//
// Contains background job runners for:
// 1. Popularity refresh (catalog -> popularity cache)
//
// These jobs can be triggered via:
// - CronJob (Kubernetes) with RUN_ONCE=true
// - Long-running process with RUN_ONCE=false

pub mod popularity_refresh;

pub use popularity_refresh::{
    CatalogSource, JsonFileCatalog, PopularityRefreshJob, RefreshJobConfig, RefreshStats,
};
