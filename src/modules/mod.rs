pub mod hello;
pub mod metrics;
