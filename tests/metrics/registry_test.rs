use route_metrics::services::metrics::types::{
    REQUESTS_IN_FLIGHT, REQUESTS_TOTAL, REQUEST_DURATION_SECONDS, REQUEST_SIZE_BYTES,
    RESPONSE_SIZE_BYTES,
};
use route_metrics::services::metrics::{
    Collector, MetricDescriptor, MetricKind, MetricPrefix, MetricSpec, MetricsError,
    MetricsRegistry,
};
use serial_test::serial;
use std::sync::Arc;

// =============================================================================
// INTEGRATION TESTS - METRICS REGISTRY
// =============================================================================

fn prefix() -> MetricPrefix {
    MetricPrefix::new(Some("gin_prom".to_string()), Some("test".to_string()))
}

#[test]
fn test_metrics_registry_initialization() {
    let metrics = MetricsRegistry::with_defaults(prefix()).unwrap();

    assert_eq!(
        metrics.ids(),
        vec![
            REQUEST_DURATION_SECONDS,
            REQUEST_SIZE_BYTES,
            REQUESTS_IN_FLIGHT,
            REQUESTS_TOTAL,
            RESPONSE_SIZE_BYTES,
        ]
    );

    let counter = metrics.get(REQUESTS_TOTAL).unwrap();
    assert_eq!(
        counter.descriptor().kind.labels(),
        ["status", "method", "host", "route"]
    );
}

#[test]
fn test_defaults_use_prefix() {
    let metrics = MetricsRegistry::with_defaults(prefix()).unwrap();

    metrics
        .get(REQUESTS_TOTAL)
        .unwrap()
        .collector()
        .inc(&["200", "GET", "localhost", "/v1/hello"])
        .unwrap();
    metrics
        .get(REQUEST_DURATION_SECONDS)
        .unwrap()
        .collector()
        .observe(&["GET", "localhost", "/v1/hello"], 0.012)
        .unwrap();

    let output = metrics.export().unwrap();
    assert!(output.contains("gin_prom_test_requests_total"));
    assert!(output.contains("status=\"200\""));
    assert!(output.contains("route=\"/v1/hello\""));
    assert!(output.contains("# TYPE gin_prom_test_request_duration_seconds summary"));
    assert!(output.contains("quantile=\"0.99\""));
}

#[test]
fn test_add_custom_metric() {
    let metrics = MetricsRegistry::with_defaults(MetricPrefix::default()).unwrap();

    let pv = metrics
        .add(MetricDescriptor::new("PV", "requests_pv", "requests pv", MetricKind::Counter))
        .unwrap();
    pv.collector().inc(&[]).unwrap();

    let fetched = metrics.get("PV").unwrap();
    assert!(Arc::ptr_eq(&pv, &fetched));

    let output = metrics.export().unwrap();
    assert!(output.contains("requests_pv 1"));
}

#[test]
fn test_duplicate_metric_is_rejected() {
    let metrics = MetricsRegistry::new(MetricPrefix::default());
    let first = metrics
        .add(MetricDescriptor::new("PV", "requests_pv", "requests pv", MetricKind::Counter))
        .unwrap();
    first.collector().inc(&[]).unwrap();

    let err = metrics
        .add(MetricDescriptor::new(
            "PV",
            "other_name",
            "different metric, same id",
            MetricKind::Gauge,
        ))
        .unwrap_err();
    assert!(matches!(err, MetricsError::DuplicateMetric(id) if id == "PV"));

    // first collector untouched
    let stored = metrics.get("PV").unwrap();
    assert!(Arc::ptr_eq(&first, &stored));
    assert_eq!(stored.descriptor().name, "requests_pv");
    match stored.collector() {
        Collector::Counter(c) => assert_eq!(c.get(), 1.0),
        other => panic!("unexpected collector {:?}", other),
    }
    assert!(!metrics.export().unwrap().contains("other_name"));
}

#[test]
fn test_counter_vec_without_labels_is_rejected() {
    let metrics = MetricsRegistry::new(MetricPrefix::default());

    let err = metrics
        .add(MetricDescriptor::new(
            "hits",
            "hits_total",
            "Hits",
            MetricKind::CounterVec { labels: vec![] },
        ))
        .unwrap_err();

    assert!(matches!(err, MetricsError::MissingLabels(id) if id == "hits"));
    assert!(!metrics.contains("hits"));
    assert!(metrics.registry().gather().is_empty());
}

#[test]
fn test_unsupported_kind_tag() {
    let spec: MetricSpec = serde_json::from_str(
        r#"{"id": "m", "name": "meter_total", "type": "meter"}"#,
    )
    .unwrap();

    let err = MetricDescriptor::try_from(spec).unwrap_err();
    assert!(matches!(err, MetricsError::UnsupportedKind(tag) if tag == "meter"));
}

#[test]
fn test_engine_rejection_is_propagated() {
    let metrics = MetricsRegistry::new(MetricPrefix::default());
    metrics
        .add(MetricDescriptor::new("a", "jobs_total", "Jobs", MetricKind::Counter))
        .unwrap();

    // different id, same fully-qualified name
    let err = metrics
        .add(MetricDescriptor::new("b", "jobs_total", "Jobs", MetricKind::Counter))
        .unwrap_err();

    assert!(matches!(err, MetricsError::Registration(_)));
    assert!(!metrics.contains("b"));
    assert!(metrics.contains("a"));
}

#[test]
fn test_histogram_with_buckets() {
    let metrics = MetricsRegistry::new(MetricPrefix::default());
    let spec: MetricSpec = serde_json::from_str(
        r#"{
            "id": "latency",
            "name": "job_latency_seconds",
            "help": "Job latency",
            "type": "histogram_vec",
            "labels": ["queue"],
            "buckets": [0.1, 0.5, 1.0]
        }"#,
    )
    .unwrap();

    let latency = metrics.add(MetricDescriptor::try_from(spec).unwrap()).unwrap();
    latency.collector().observe(&["default"], 0.3).unwrap();

    let output = metrics.export().unwrap();
    assert!(output.contains("job_latency_seconds_bucket{queue=\"default\",le=\"0.1\"} 0"));
    assert!(output.contains("job_latency_seconds_bucket{queue=\"default\",le=\"0.5\"} 1"));
    assert!(output.contains("job_latency_seconds_count{queue=\"default\"} 1"));
}

#[test]
fn test_concurrent_add_and_get() {
    let metrics = MetricsRegistry::with_defaults(MetricPrefix::default()).unwrap();

    std::thread::scope(|scope| {
        for i in 0..8 {
            let metrics = metrics.clone();
            scope.spawn(move || {
                let id = format!("custom_{}", i);
                metrics
                    .add(MetricDescriptor::new(id.clone(), id, "Custom", MetricKind::Gauge))
                    .unwrap();
            });
        }

        for _ in 0..4 {
            let metrics = metrics.clone();
            scope.spawn(move || {
                for _ in 0..100 {
                    assert!(metrics.get(REQUESTS_TOTAL).is_some());
                }
            });
        }
    });

    assert_eq!(metrics.ids().len(), 5 + 8);
}

#[test]
fn test_racing_duplicate_adds() {
    let metrics = Arc::new(MetricsRegistry::new(MetricPrefix::default()));

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let metrics = metrics.clone();
                scope.spawn(move || {
                    let descriptor =
                        MetricDescriptor::new("once", "once_total", "Once", MetricKind::Counter);
                    metrics.add(descriptor)
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, MetricsError::DuplicateMetric(_))));
}

#[serial]
#[test]
fn test_shared_default_registry() {
    let metrics = MetricsRegistry::with_registry(
        prometheus::default_registry().clone(),
        MetricPrefix::new(Some("route_metrics_shared".to_string()), None),
    );
    metrics.register_defaults().unwrap();

    metrics
        .get(REQUESTS_TOTAL)
        .unwrap()
        .collector()
        .inc(&["200", "GET", "localhost", "/"])
        .unwrap();

    assert!(prometheus::gather()
        .iter()
        .any(|mf| mf.get_name() == "route_metrics_shared_requests_total"));
}
