use axum::Router;
use prometheus::Registry;
use std::sync::Arc;

use crate::config::MetricsConfig;
use crate::modules::metrics::metrics_routes;
use crate::services::metrics::{
    Metric, MetricDescriptor, MetricPrefix, MetricsError, MetricsLayer, MetricsRegistry,
};
use crate::services::routes::{Classification, RouteError, RouteTable};

/// Route-classified HTTP metrics for an axum application.
///
/// Owns the metrics registry and the route table. Both are shared with the
/// [`MetricsLayer`] handed out by [`HttpMetrics::layer`], so routes and metrics
/// added later are picked up by running services.
pub struct HttpMetrics {
    metrics_path: String,
    registry: Arc<MetricsRegistry>,
    routes: Arc<RouteTable>,
}

impl HttpMetrics {
    pub fn new(config: &MetricsConfig) -> Result<Self, MetricsError> {
        Self::with_registry(config, Registry::new())
    }

    /// Build on top of an existing prometheus registry.
    ///
    /// The whole configuration is checked before anything is registered, and
    /// a failure leaves `registry` as it was.
    pub fn with_registry(config: &MetricsConfig, registry: Registry) -> Result<Self, MetricsError> {
        let routes = RouteTable::new();
        for path in &config.static_routes {
            routes.add_static(path)?;
        }
        for (template, index) in &config.dynamic_routes {
            routes.add_dynamic(template, *index)?;
        }

        let custom = config
            .custom_metrics
            .iter()
            .cloned()
            .map(MetricDescriptor::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        let prefix = MetricPrefix::new(config.namespace.clone(), config.subsystem.clone());
        let metrics = MetricsRegistry::with_registry(registry, prefix);
        metrics.register_defaults()?;

        for descriptor in custom {
            if let Err(e) = metrics.add(descriptor) {
                tracing::warn!(error = %e, "custom metric rejected, rolling back");
                metrics.clear();
                return Err(e);
            }
        }

        tracing::info!(
            metrics_path = %config.metrics_path,
            static_routes = config.static_routes.len(),
            dynamic_routes = config.dynamic_routes.len(),
            custom_metrics = config.custom_metrics.len(),
            "HTTP metrics initialized"
        );

        Ok(Self {
            metrics_path: config.metrics_path.clone(),
            registry: Arc::new(metrics),
            routes: Arc::new(routes),
        })
    }

    pub fn metrics_path(&self) -> &str {
        &self.metrics_path
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    pub fn routes(&self) -> &Arc<RouteTable> {
        &self.routes
    }

    pub fn add_static_route(&self, path: &str) -> Result<(), RouteError> {
        self.routes.add_static(path)
    }

    pub fn remove_static_route(&self, path: &str) {
        self.routes.remove_static(path)
    }

    pub fn add_dynamic_route(&self, template: &str, param_index: usize) -> Result<(), RouteError> {
        self.routes.add_dynamic(template, param_index)
    }

    pub fn remove_dynamic_route(&self, template: &str) {
        self.routes.remove_dynamic(template)
    }

    /// Register a metric next to the defaults
    pub fn add_metric(&self, descriptor: MetricDescriptor) -> Result<Arc<Metric>, MetricsError> {
        self.registry.add(descriptor)
    }

    /// Fetch a metric by identifier, for custom middleware to record into
    pub fn metric(&self, id: &str) -> Option<Arc<Metric>> {
        self.registry.get(id)
    }

    pub fn classify(&self, path: &str) -> Classification {
        self.routes.classify(path)
    }

    pub fn layer(&self) -> MetricsLayer {
        MetricsLayer::new(self.routes.clone(), self.registry.clone())
    }

    /// Add the scrape endpoint to `router` and instrument all of its routes
    pub fn attach<S>(&self, router: Router<S>) -> Router<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        router
            .merge(metrics_routes(&self.metrics_path, self.registry.clone()))
            .layer(self.layer())
    }
}
