pub mod environment;
pub mod metrics;

pub use metrics::MetricsConfig;
