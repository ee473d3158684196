use serde::Deserialize;
use std::fmt;

use crate::services::routes::RouteError;

/// Identifier of the request counter
pub const REQUESTS_TOTAL: &str = "requests_total";
/// Identifier of the request latency summary (seconds)
pub const REQUEST_DURATION_SECONDS: &str = "request_duration_seconds";
/// Identifier of the approximate request size summary
pub const REQUEST_SIZE_BYTES: &str = "request_size_bytes";
/// Identifier of the response size summary
pub const RESPONSE_SIZE_BYTES: &str = "response_size_bytes";
/// Identifier of the in-flight request gauge
pub const REQUESTS_IN_FLIGHT: &str = "requests_in_flight";

/// Labels of the request counter
pub const REQUEST_COUNTER_LABELS: [&str; 4] = ["status", "method", "host", "route"];
/// Labels of every other default metric
pub const REQUEST_LABELS: [&str; 3] = ["method", "host", "route"];

/// Collector kind together with its constructor parameters
#[derive(Debug, Clone, PartialEq)]
pub enum MetricKind {
    Counter,
    CounterVec { labels: Vec<String> },
    Gauge,
    GaugeVec { labels: Vec<String> },
    /// Falls back to the prometheus default buckets when `buckets` is `None`
    Histogram { buckets: Option<Vec<f64>> },
    HistogramVec {
        labels: Vec<String>,
        buckets: Option<Vec<f64>>,
    },
    Summary,
    SummaryVec { labels: Vec<String> },
}

impl MetricKind {
    /// Build a kind from its configuration tag, e.g. `"counter_vec"`
    pub fn from_tag(
        tag: &str,
        labels: Vec<String>,
        buckets: Option<Vec<f64>>,
    ) -> Result<Self, MetricsError> {
        let kind = match tag {
            "counter" => MetricKind::Counter,
            "counter_vec" => MetricKind::CounterVec { labels },
            "gauge" => MetricKind::Gauge,
            "gauge_vec" => MetricKind::GaugeVec { labels },
            "histogram" => MetricKind::Histogram { buckets },
            "histogram_vec" => MetricKind::HistogramVec { labels, buckets },
            "summary" => MetricKind::Summary,
            "summary_vec" => MetricKind::SummaryVec { labels },
            other => return Err(MetricsError::UnsupportedKind(other.to_string())),
        };
        Ok(kind)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::CounterVec { .. } => "counter_vec",
            MetricKind::Gauge => "gauge",
            MetricKind::GaugeVec { .. } => "gauge_vec",
            MetricKind::Histogram { .. } => "histogram",
            MetricKind::HistogramVec { .. } => "histogram_vec",
            MetricKind::Summary => "summary",
            MetricKind::SummaryVec { .. } => "summary_vec",
        }
    }

    /// Label names; empty for scalar kinds
    pub fn labels(&self) -> &[String] {
        match self {
            MetricKind::CounterVec { labels }
            | MetricKind::GaugeVec { labels }
            | MetricKind::HistogramVec { labels, .. }
            | MetricKind::SummaryVec { labels } => labels,
            _ => &[],
        }
    }

    pub fn is_vec(&self) -> bool {
        matches!(
            self,
            MetricKind::CounterVec { .. }
                | MetricKind::GaugeVec { .. }
                | MetricKind::HistogramVec { .. }
                | MetricKind::SummaryVec { .. }
        )
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Everything needed to construct and register one collector
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDescriptor {
    /// Registry key, unique per registry
    pub id: String,
    /// Metric name before namespace/subsystem prefixing
    pub name: String,
    pub help: String,
    pub kind: MetricKind,
}

impl MetricDescriptor {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        help: impl Into<String>,
        kind: MetricKind,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            help: help.into(),
            kind,
        }
    }
}

/// Metric definition as written in configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub help: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub buckets: Option<Vec<f64>>,
}

impl TryFrom<MetricSpec> for MetricDescriptor {
    type Error = MetricsError;

    fn try_from(spec: MetricSpec) -> Result<Self, Self::Error> {
        let kind = MetricKind::from_tag(&spec.kind, spec.labels, spec.buckets)?;
        let help = if spec.help.is_empty() {
            spec.name.clone()
        } else {
            spec.help
        };
        Ok(MetricDescriptor::new(spec.id, spec.name, help, kind))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Metric already registered: {0}")]
    DuplicateMetric(String),
    #[error("Unsupported metric kind: {0}")]
    UnsupportedKind(String),
    #[error("Metric {0} requires at least one label")]
    MissingLabels(String),
    #[error("{kind} does not support {operation}")]
    UnsupportedOperation {
        kind: &'static str,
        operation: &'static str,
    },
    #[error("Expected {expected} label values, got {got}")]
    LabelCardinality { expected: usize, got: usize },
    #[error("Counters cannot decrease (got {0})")]
    NegativeIncrement(f64),
    #[error("Registration error: {0}")]
    Registration(#[from] prometheus::Error),
    #[error("Route error: {0}")]
    Route(#[from] RouteError),
    #[error("Encoding error: {0}")]
    Encoding(String),
}
