use std::sync::Arc;
use std::time::Instant;

use super::types::{
    REQUESTS_IN_FLIGHT, REQUESTS_TOTAL, REQUEST_DURATION_SECONDS, REQUEST_SIZE_BYTES,
    RESPONSE_SIZE_BYTES,
};
use super::MetricsRegistry;

/// Labels shared by every observation of one request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestLabels {
    pub method: String,
    pub host: String,
    pub route: String,
}

impl RequestLabels {
    /// Values in `method, host, route` order
    pub fn values(&self) -> [&str; 3] {
        [&self.method, &self.host, &self.route]
    }
}

/// Measurements taken once the downstream handler returned
#[derive(Debug, Clone, PartialEq)]
pub struct RequestObservation {
    pub status: u16,
    pub duration_secs: f64,
    pub request_size: u64,
}

/// Collector for HTTP request metrics.
///
/// Metrics are looked up by their well-known ids on every call. A metric that
/// is not registered is skipped.
#[derive(Clone)]
pub struct HttpMetricsCollector {
    metrics: Arc<MetricsRegistry>,
}

impl HttpMetricsCollector {
    pub fn new(metrics: Arc<MetricsRegistry>) -> Self {
        Self { metrics }
    }

    pub fn record_request_started(&self, labels: &RequestLabels) {
        self.apply(REQUESTS_IN_FLIGHT, |c| c.inc(&labels.values()));
    }

    /// Downstream failed or was cancelled without producing a response
    pub fn record_request_aborted(&self, labels: &RequestLabels) {
        self.apply(REQUESTS_IN_FLIGHT, |c| c.dec(&labels.values()));
    }

    pub fn record_request_finished(
        &self,
        labels: &RequestLabels,
        observation: &RequestObservation,
    ) {
        let status = observation.status.to_string();
        let values = labels.values();

        self.apply(REQUESTS_IN_FLIGHT, |c| c.dec(&values));

        self.apply(REQUESTS_TOTAL, |c| {
            let [method, host, route] = values;
            c.inc(&[status.as_str(), method, host, route])
        });

        self.apply(REQUEST_DURATION_SECONDS, |c| {
            c.observe(&values, observation.duration_secs)
        });

        self.apply(REQUEST_SIZE_BYTES, |c| {
            c.observe(&values, observation.request_size as f64)
        });
    }

    /// Bytes of response body handed to the client
    pub fn record_response_size(&self, labels: &RequestLabels, bytes: u64) {
        self.apply(RESPONSE_SIZE_BYTES, |c| c.observe(&labels.values(), bytes as f64));
    }

    /// Take an in-flight slot for `labels`, released when the guard goes away
    pub fn track_in_flight(self, labels: RequestLabels) -> InFlightGuard {
        self.record_request_started(&labels);
        InFlightGuard {
            collector: self,
            labels,
            finished: false,
        }
    }

    fn apply<F>(&self, id: &str, record: F)
    where
        F: FnOnce(&super::Collector) -> Result<(), super::MetricsError>,
    {
        let Some(metric) = self.metrics.get(id) else {
            tracing::trace!(id, "metric not configured, skipping");
            return;
        };

        if let Err(e) = record(metric.collector()) {
            tracing::debug!(id, error = %e, "failed to record metric");
        }
    }
}

/// One request counted in the in-flight gauge.
///
/// Dropping the guard without calling [`InFlightGuard::finish`] only releases
/// the slot. This happens when the downstream service fails or when the
/// request future is dropped because the client went away.
pub struct InFlightGuard {
    collector: HttpMetricsCollector,
    labels: RequestLabels,
    finished: bool,
}

impl InFlightGuard {
    /// Release the slot and record the finished request
    pub fn finish(mut self, observation: &RequestObservation) -> RequestLabels {
        self.finished = true;
        self.collector.record_request_finished(&self.labels, observation);
        std::mem::take(&mut self.labels)
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.collector.record_request_aborted(&self.labels);
        }
    }
}

/// Timer helper for measuring durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }
}

impl Default for MetricsTimer {
    fn default() -> Self {
        Self::new()
    }
}
