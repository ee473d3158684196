pub mod config;
pub mod modules;
pub mod services;

use axum::{
    extract::{Request, State},
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

use config::MetricsConfig;
use modules::hello::{routes as hello, hello_routes};
use services::metrics::{MetricDescriptor, MetricKind, MetricsError};

pub use services::HttpMetrics;

/// Identifier of the page-view counter of the demo application
pub const PAGE_VIEWS: &str = "PV";

/// Build the metrics of the demo application: its hello routes plus a
/// page-view counter, on top of whatever `config` declares.
pub fn demo_metrics(config: &MetricsConfig) -> Result<Arc<HttpMetrics>, MetricsError> {
    let metrics = HttpMetrics::new(config)?;

    metrics.add_static_route(hello::HELLO)?;
    metrics.add_dynamic_route(hello::HELLO_NAME.0, hello::HELLO_NAME.1)?;
    metrics.add_dynamic_route(hello::CALL.0, hello::CALL.1)?;

    metrics.add_metric(MetricDescriptor::new(
        PAGE_VIEWS,
        "requests_pv",
        "requests pv",
        MetricKind::Counter,
    ))?;

    Ok(Arc::new(metrics))
}

pub fn create_app(metrics: Arc<HttpMetrics>) -> Router {
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(hello_routes());

    // page views include scrapes of the metrics endpoint
    metrics
        .attach(app)
        .layer(middleware::from_fn_with_state(metrics.clone(), count_page_views))
        .layer(RequestBodyLimitLayer::new(1024 * 100)) // 100KB max body
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Custom middleware recording straight into a metric fetched by id
async fn count_page_views(
    State(metrics): State<Arc<HttpMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(pv) = metrics.metric(PAGE_VIEWS) {
        if let Err(e) = pv.collector().inc(&[]) {
            tracing::debug!(error = %e, "failed to count page view");
        }
    }
    next.run(req).await
}

async fn root() -> &'static str {
    "Route Metrics Demo"
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
