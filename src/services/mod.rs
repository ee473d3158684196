pub mod http_metrics;
pub mod metrics;
pub mod routes;

pub use http_metrics::HttpMetrics;
