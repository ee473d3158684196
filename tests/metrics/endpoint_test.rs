use prometheus::Registry;
use route_metrics::config::MetricsConfig;
use route_metrics::services::metrics::types::REQUESTS_TOTAL;
use route_metrics::services::metrics::MetricSpec;
use route_metrics::HttpMetrics;

use crate::common::TestContext;

// =============================================================================
// INTEGRATION TESTS - SCRAPE ENDPOINT
// =============================================================================

#[tokio::test]
async fn test_metrics_endpoint_exposes_requests() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server.get("/v1/hello").await.assert_status_ok();
    server.get("/v1/hello/alice").await.assert_status_ok();

    let response = server.get("/metrics").await;
    response.assert_status_ok();

    let output = response.text();
    assert!(output.contains("# TYPE http_requests_total counter"));
    assert!(output.contains("route=\"/v1/hello\""));
    assert!(output.contains("route=\"/v1/hello/:name\""));
    assert!(output.contains("# TYPE http_request_duration_seconds summary"));
    assert!(output.contains("http_response_size_bytes_count"));
    assert!(output.contains("http_requests_pv"));
}

#[tokio::test]
async fn test_scrapes_are_not_measured_by_default() {
    let ctx = TestContext::new();
    let server = ctx.server();

    server.get("/metrics").await.assert_status_ok();
    let output = server.get("/metrics").await.text();

    assert!(!output.contains("route=\"/metrics\""));
    // page views still see scrapes
    assert!(output.contains("http_requests_pv 2"));
}

#[tokio::test]
async fn test_custom_metrics_path() {
    let config = MetricsConfig {
        metrics_path: "/internal/prometheus".to_string(),
        ..MetricsConfig::default()
    };
    let ctx = TestContext::with_config(&config);
    let server = ctx.server();

    server.get("/internal/prometheus").await.assert_status_ok();
    server.get("/metrics").await.assert_status_not_found();
}

#[tokio::test]
async fn test_custom_metrics_from_config() {
    let custom: Vec<MetricSpec> = serde_json::from_str(
        r#"[
            {
                "id": "jobs", "name": "jobs_total", "help": "Jobs",
                "type": "counter_vec", "labels": ["queue"]
            },
            {"id": "temp", "name": "temperature", "type": "gauge"}
        ]"#,
    )
    .unwrap();
    let config = MetricsConfig {
        custom_metrics: custom,
        ..MetricsConfig::default()
    };
    let ctx = TestContext::with_config(&config);

    ctx.metrics.metric("jobs").unwrap().collector().inc(&["default"]).unwrap();
    ctx.metrics.metric("temp").unwrap().collector().set(&[], 21.5).unwrap();

    let output = ctx.server().get("/metrics").await.text();
    assert!(output.contains("http_jobs_total{queue=\"default\"} 1"));
    assert!(output.contains("http_temperature 21.5"));
}

#[test]
fn test_invalid_configuration_fails_loudly() {
    let config = MetricsConfig::default().with_dynamic_route("/v1/hello/:name", 9);
    assert!(route_metrics::demo_metrics(&config).is_err());

    let config = MetricsConfig::default().with_static_route("no-leading-slash");
    assert!(HttpMetrics::new(&config).is_err());

    let custom: Vec<MetricSpec> =
        serde_json::from_str(r#"[{"id": "x", "name": "x", "type": "meter"}]"#).unwrap();
    let config = MetricsConfig {
        custom_metrics: custom,
        ..MetricsConfig::default()
    };
    assert!(HttpMetrics::new(&config).is_err());
}

#[test]
fn test_failed_setup_leaves_shared_registry_clean() {
    let registry = Registry::new();

    let bad_route = MetricsConfig::default().with_static_route("no-leading-slash");
    assert!(HttpMetrics::with_registry(&bad_route, registry.clone()).is_err());
    assert!(registry.gather().is_empty());

    // custom id clashing with a default is only caught once the defaults exist
    let custom: Vec<MetricSpec> = serde_json::from_str(&format!(
        r#"[{{"id": "{}", "name": "clash_total", "type": "counter"}}]"#,
        REQUESTS_TOTAL
    ))
    .unwrap();
    let clash = MetricsConfig {
        custom_metrics: custom,
        ..MetricsConfig::default()
    };
    assert!(HttpMetrics::with_registry(&clash, registry.clone()).is_err());
    assert!(registry.gather().is_empty());

    let metrics = HttpMetrics::with_registry(&MetricsConfig::default(), registry.clone()).unwrap();
    assert_eq!(metrics.registry().ids().len(), 5);
}
