use prometheus::{Encoder, Registry, TextEncoder};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use super::collector::{Collector, MetricPrefix};
use super::types::{
    MetricDescriptor, MetricKind, MetricsError, REQUESTS_IN_FLIGHT, REQUESTS_TOTAL,
    REQUEST_COUNTER_LABELS, REQUEST_DURATION_SECONDS, REQUEST_LABELS, REQUEST_SIZE_BYTES,
    RESPONSE_SIZE_BYTES,
};

/// Registered metric: its descriptor and the live collector
#[derive(Debug)]
pub struct Metric {
    descriptor: MetricDescriptor,
    collector: Collector,
}

impl Metric {
    pub fn new(descriptor: MetricDescriptor, collector: Collector) -> Self {
        Self {
            descriptor,
            collector,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    pub fn descriptor(&self) -> &MetricDescriptor {
        &self.descriptor
    }

    pub fn collector(&self) -> &Collector {
        &self.collector
    }
}

/// Metrics of one application, keyed by identifier.
///
/// Lookups take a shared read lock and hand out an `Arc`, so request handlers
/// never wait on each other. Every collector is also registered with the
/// underlying prometheus registry, which backs the scrape endpoint.
pub struct MetricsRegistry {
    registry: Registry,
    prefix: MetricPrefix,
    metrics: RwLock<HashMap<String, Arc<Metric>>>,
}

impl MetricsRegistry {
    pub fn new(prefix: MetricPrefix) -> Self {
        Self::with_registry(Registry::new(), prefix)
    }

    /// Share an existing prometheus registry, e.g. `prometheus::default_registry()`
    pub fn with_registry(registry: Registry, prefix: MetricPrefix) -> Self {
        Self {
            registry,
            prefix,
            metrics: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the default HTTP metrics already registered
    pub fn with_defaults(prefix: MetricPrefix) -> Result<Arc<Self>, MetricsError> {
        let metrics = Self::new(prefix);
        metrics.register_defaults()?;
        Ok(Arc::new(metrics))
    }

    pub fn get(&self, id: &str) -> Option<Arc<Metric>> {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Insert or replace an entry without registering its collector.
    ///
    /// Returns the replaced entry, if any.
    pub fn set(&self, id: impl Into<String>, metric: Metric) -> Option<Arc<Metric>> {
        self.metrics
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.into(), Arc::new(metric))
    }

    /// Build, register and store the collector for `descriptor`.
    ///
    /// Fails without side effects when the identifier is taken, the descriptor
    /// is invalid or prometheus rejects the collector.
    pub fn add(&self, descriptor: MetricDescriptor) -> Result<Arc<Metric>, MetricsError> {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);

        if metrics.contains_key(&descriptor.id) {
            return Err(MetricsError::DuplicateMetric(descriptor.id));
        }

        let collector = Collector::build(&descriptor, &self.prefix)?;
        self.registry.register(collector.boxed())?;

        tracing::debug!(id = %descriptor.id, kind = %descriptor.kind, "metric registered");

        let metric = Arc::new(Metric::new(descriptor, collector));
        metrics.insert(metric.id().to_string(), metric.clone());
        Ok(metric)
    }

    /// Register the default HTTP request metrics under their well-known ids.
    ///
    /// Either all of them are registered or none.
    pub fn register_defaults(&self) -> Result<(), MetricsError> {
        let built = default_descriptors()
            .into_iter()
            .map(|descriptor| {
                Collector::build(&descriptor, &self.prefix)
                    .map(|collector| Metric::new(descriptor, collector))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (i, metric) in built.iter().enumerate() {
            if let Err(e) = self.registry.register(metric.collector().boxed()) {
                for registered in &built[..i] {
                    let _ = self.registry.unregister(registered.collector().boxed());
                }
                tracing::warn!(id = metric.id(), error = %e, "default metric rejected");
                return Err(e.into());
            }
        }

        for metric in built {
            self.set(metric.id().to_string(), metric);
        }
        tracing::debug!("default HTTP metrics registered");
        Ok(())
    }

    /// Unregister every stored collector and forget its entry
    pub fn clear(&self) {
        let mut metrics = self.metrics.write().unwrap_or_else(PoisonError::into_inner);
        for metric in metrics.values() {
            if let Err(e) = self.registry.unregister(metric.collector().boxed()) {
                tracing::debug!(id = metric.id(), error = %e, "metric was not registered");
            }
        }
        metrics.clear();
    }

    /// Sorted identifiers of every stored metric
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .metrics
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Export metrics in Prometheus text format
    pub fn export(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| MetricsError::Encoding(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
    }

    /// Get the underlying registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn prefix(&self) -> &MetricPrefix {
        &self.prefix
    }
}

/// Descriptors of the metrics recorded by the request interceptor
pub fn default_descriptors() -> Vec<MetricDescriptor> {
    let labels = |names: &[&str]| names.iter().map(|name| name.to_string()).collect::<Vec<_>>();

    vec![
        MetricDescriptor::new(
            REQUESTS_TOTAL,
            "requests_total",
            "How many HTTP requests processed, partitioned by status code, method, host and route.",
            MetricKind::CounterVec {
                labels: labels(&REQUEST_COUNTER_LABELS),
            },
        ),
        MetricDescriptor::new(
            REQUEST_DURATION_SECONDS,
            "request_duration_seconds",
            "The HTTP request latencies in seconds.",
            MetricKind::SummaryVec {
                labels: labels(&REQUEST_LABELS),
            },
        ),
        MetricDescriptor::new(
            REQUEST_SIZE_BYTES,
            "request_size_bytes",
            "The approximate HTTP request sizes in bytes.",
            MetricKind::SummaryVec {
                labels: labels(&REQUEST_LABELS),
            },
        ),
        MetricDescriptor::new(
            RESPONSE_SIZE_BYTES,
            "response_size_bytes",
            "The HTTP response sizes in bytes.",
            MetricKind::SummaryVec {
                labels: labels(&REQUEST_LABELS),
            },
        ),
        MetricDescriptor::new(
            REQUESTS_IN_FLIGHT,
            "requests_in_flight",
            "HTTP requests currently being served.",
            MetricKind::GaugeVec {
                labels: labels(&REQUEST_LABELS),
            },
        ),
    ]
}
