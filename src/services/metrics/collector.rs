use prometheus::{
    core::Collector as PromCollector, Counter, CounterVec, Gauge, GaugeVec, Histogram,
    HistogramOpts, HistogramVec, Opts,
};
use std::fmt;

use super::summary::{Summary, SummaryVec};
use super::types::{MetricDescriptor, MetricKind, MetricsError};

/// Name prefix applied to every metric of a registry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricPrefix {
    pub namespace: Option<String>,
    pub subsystem: Option<String>,
}

impl MetricPrefix {
    pub fn new(namespace: Option<String>, subsystem: Option<String>) -> Self {
        Self {
            namespace: namespace.filter(|ns| !ns.is_empty()),
            subsystem: subsystem.filter(|sub| !sub.is_empty()),
        }
    }

    fn opts(&self, descriptor: &MetricDescriptor) -> Opts {
        let mut opts = Opts::new(descriptor.name.clone(), descriptor.help.clone());
        if let Some(namespace) = &self.namespace {
            opts = opts.namespace(namespace.clone());
        }
        if let Some(subsystem) = &self.subsystem {
            opts = opts.subsystem(subsystem.clone());
        }
        opts
    }

    fn histogram_opts(
        &self,
        descriptor: &MetricDescriptor,
        buckets: Option<&[f64]>,
    ) -> HistogramOpts {
        let mut opts = HistogramOpts::from(self.opts(descriptor));
        if let Some(buckets) = buckets {
            opts = opts.buckets(buckets.to_vec());
        }
        opts
    }
}

/// Live collector bound to one descriptor
#[derive(Clone)]
pub enum Collector {
    Counter(Counter),
    CounterVec(CounterVec),
    Gauge(Gauge),
    GaugeVec(GaugeVec),
    Histogram(Histogram),
    HistogramVec(HistogramVec),
    Summary(Summary),
    SummaryVec(SummaryVec),
}

impl Collector {
    /// Construct the collector described by `descriptor`.
    ///
    /// Nothing is registered here; calling this twice yields two independent
    /// collectors.
    pub fn build(
        descriptor: &MetricDescriptor,
        prefix: &MetricPrefix,
    ) -> Result<Self, MetricsError> {
        if descriptor.kind.is_vec() && descriptor.kind.labels().is_empty() {
            return Err(MetricsError::MissingLabels(descriptor.id.clone()));
        }

        let labels: Vec<&str> = descriptor.kind.labels().iter().map(String::as_str).collect();

        let collector = match &descriptor.kind {
            MetricKind::Counter => Collector::Counter(Counter::with_opts(prefix.opts(descriptor))?),
            MetricKind::CounterVec { .. } => {
                Collector::CounterVec(CounterVec::new(prefix.opts(descriptor), &labels)?)
            }
            MetricKind::Gauge => Collector::Gauge(Gauge::with_opts(prefix.opts(descriptor))?),
            MetricKind::GaugeVec { .. } => {
                Collector::GaugeVec(GaugeVec::new(prefix.opts(descriptor), &labels)?)
            }
            MetricKind::Histogram { buckets } => Collector::Histogram(Histogram::with_opts(
                prefix.histogram_opts(descriptor, buckets.as_deref()),
            )?),
            MetricKind::HistogramVec { buckets, .. } => Collector::HistogramVec(HistogramVec::new(
                prefix.histogram_opts(descriptor, buckets.as_deref()),
                &labels,
            )?),
            MetricKind::Summary => Collector::Summary(Summary::new(prefix.opts(descriptor))?),
            MetricKind::SummaryVec { .. } => {
                Collector::SummaryVec(SummaryVec::new(prefix.opts(descriptor), &labels)?)
            }
        };

        Ok(collector)
    }

    pub fn kind_tag(&self) -> &'static str {
        match self {
            Collector::Counter(_) => "counter",
            Collector::CounterVec(_) => "counter_vec",
            Collector::Gauge(_) => "gauge",
            Collector::GaugeVec(_) => "gauge_vec",
            Collector::Histogram(_) => "histogram",
            Collector::HistogramVec(_) => "histogram_vec",
            Collector::Summary(_) => "summary",
            Collector::SummaryVec(_) => "summary_vec",
        }
    }

    /// Boxed handle for registration with a prometheus registry
    pub fn boxed(&self) -> Box<dyn PromCollector> {
        match self {
            Collector::Counter(c) => Box::new(c.clone()),
            Collector::CounterVec(c) => Box::new(c.clone()),
            Collector::Gauge(g) => Box::new(g.clone()),
            Collector::GaugeVec(g) => Box::new(g.clone()),
            Collector::Histogram(h) => Box::new(h.clone()),
            Collector::HistogramVec(h) => Box::new(h.clone()),
            Collector::Summary(s) => Box::new(s.clone()),
            Collector::SummaryVec(s) => Box::new(s.clone()),
        }
    }

    /// Increment a counter or gauge by one
    pub fn inc(&self, labels: &[&str]) -> Result<(), MetricsError> {
        match self {
            Collector::Counter(c) => scalar(labels).map(|_| c.inc()),
            Collector::CounterVec(c) => c
                .get_metric_with_label_values(labels)
                .map(|m| m.inc())
                .map_err(engine),
            Collector::Gauge(g) => scalar(labels).map(|_| g.inc()),
            Collector::GaugeVec(g) => g
                .get_metric_with_label_values(labels)
                .map(|m| m.inc())
                .map_err(engine),
            _ => Err(self.unsupported("inc")),
        }
    }

    /// Add a non-negative amount to a counter, or any amount to a gauge
    pub fn inc_by(&self, labels: &[&str], v: f64) -> Result<(), MetricsError> {
        match self {
            Collector::Counter(_) | Collector::CounterVec(_) if v < 0.0 => {
                Err(MetricsError::NegativeIncrement(v))
            }
            Collector::Counter(c) => scalar(labels).map(|_| c.inc_by(v)),
            Collector::CounterVec(c) => {
                c.get_metric_with_label_values(labels).map(|m| m.inc_by(v)).map_err(engine)
            }
            Collector::Gauge(g) => scalar(labels).map(|_| g.add(v)),
            Collector::GaugeVec(g) => g
                .get_metric_with_label_values(labels)
                .map(|m| m.add(v))
                .map_err(engine),
            _ => Err(self.unsupported("inc_by")),
        }
    }

    pub fn dec(&self, labels: &[&str]) -> Result<(), MetricsError> {
        match self {
            Collector::Gauge(g) => scalar(labels).map(|_| g.dec()),
            Collector::GaugeVec(g) => g
                .get_metric_with_label_values(labels)
                .map(|m| m.dec())
                .map_err(engine),
            _ => Err(self.unsupported("dec")),
        }
    }

    pub fn set(&self, labels: &[&str], v: f64) -> Result<(), MetricsError> {
        match self {
            Collector::Gauge(g) => scalar(labels).map(|_| g.set(v)),
            Collector::GaugeVec(g) => g
                .get_metric_with_label_values(labels)
                .map(|m| m.set(v))
                .map_err(engine),
            _ => Err(self.unsupported("set")),
        }
    }

    /// Record one sample in a histogram or summary
    pub fn observe(&self, labels: &[&str], v: f64) -> Result<(), MetricsError> {
        match self {
            Collector::Histogram(h) => scalar(labels).map(|_| h.observe(v)),
            Collector::HistogramVec(h) => {
                h.get_metric_with_label_values(labels).map(|m| m.observe(v)).map_err(engine)
            }
            Collector::Summary(s) => scalar(labels).map(|_| s.observe(v)),
            Collector::SummaryVec(s) => s
                .with_label_values(labels)
                .map(|m| m.observe(v))
                .map_err(engine),
            _ => Err(self.unsupported("observe")),
        }
    }

    fn unsupported(&self, operation: &'static str) -> MetricsError {
        MetricsError::UnsupportedOperation {
            kind: self.kind_tag(),
            operation,
        }
    }
}

impl fmt::Debug for Collector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Collector").field(&self.kind_tag()).finish()
    }
}

fn scalar(labels: &[&str]) -> Result<(), MetricsError> {
    if labels.is_empty() {
        Ok(())
    } else {
        Err(MetricsError::LabelCardinality {
            expected: 0,
            got: labels.len(),
        })
    }
}

fn engine(err: prometheus::Error) -> MetricsError {
    match err {
        prometheus::Error::InconsistentCardinality { expect, got } => {
            MetricsError::LabelCardinality { expected: expect, got }
        }
        other => MetricsError::Registration(other),
    }
}
