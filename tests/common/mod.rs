use axum::{body::Body, http::Request, Router};
use axum_test::TestServer;
use route_metrics::config::MetricsConfig;
use route_metrics::services::metrics::types::{REQUESTS_TOTAL, REQUEST_DURATION_SECONDS};
use route_metrics::services::metrics::Collector;
use route_metrics::HttpMetrics;
use std::sync::Arc;

// Allow dead_code for utilities used by other test files
#[allow(dead_code)]
pub struct TestContext {
    pub app: Router,
    pub metrics: Arc<HttpMetrics>,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        Self::with_config(&MetricsConfig::default())
    }

    pub fn with_config(config: &MetricsConfig) -> Self {
        let metrics = route_metrics::demo_metrics(config).expect("Failed to build metrics");
        let app = route_metrics::create_app(metrics.clone());
        Self { app, metrics }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.app.clone()).expect("Failed to create test server")
    }

    /// Value of the request counter for `status, method, host, route`
    pub fn request_count(&self, labels: &[&str]) -> f64 {
        match self.metrics.metric(REQUESTS_TOTAL).unwrap().collector() {
            Collector::CounterVec(c) => c.with_label_values(labels).get(),
            other => panic!("unexpected collector {:?}", other),
        }
    }

    /// Number of latency samples for `method, host, route`
    pub fn duration_samples(&self, labels: &[&str]) -> u64 {
        match self.metrics.metric(REQUEST_DURATION_SECONDS).unwrap().collector() {
            Collector::SummaryVec(s) => s.with_label_values(labels).unwrap().sample_count(),
            other => panic!("unexpected collector {:?}", other),
        }
    }
}

#[allow(dead_code)]
pub fn get(uri: &str, host: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header("host", host)
        .body(Body::empty())
        .unwrap()
}
