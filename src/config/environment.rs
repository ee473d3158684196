use std::env;

use super::MetricsConfig;

/// Environment configuration
/// Loads and validates environment variables
pub struct Config {
    pub bind_addr: String,
    pub metrics: MetricsConfig,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let metrics = MetricsConfig::from_env()?;

        Ok(Self { bind_addr, metrics })
    }
}
