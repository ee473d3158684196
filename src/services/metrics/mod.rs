pub mod collector;
pub mod collectors;
pub mod middleware;
pub mod registry;
pub mod summary;
pub mod types;

pub use collector::{Collector, MetricPrefix};
pub use middleware::{MetricsLayer, MetricsService};
pub use registry::{Metric, MetricsRegistry};
pub use types::{MetricDescriptor, MetricKind, MetricSpec, MetricsError};
