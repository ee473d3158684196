use axum::{routing::get, Router};
use std::sync::Arc;

use super::controller::get_metrics;
use crate::services::metrics::MetricsRegistry;

/// Scrape endpoint mounted at `path`
pub fn metrics_routes<S>(path: &str, metrics: Arc<MetricsRegistry>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route(path, get(get_metrics))
        .with_state(metrics)
}
