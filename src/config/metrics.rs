use serde::Deserialize;
use std::collections::BTreeMap;

use crate::services::metrics::MetricSpec;

pub const DEFAULT_METRICS_PATH: &str = "/metrics";
pub const DEFAULT_NAMESPACE: &str = "http";

/// Settings consumed once when building [`crate::HttpMetrics`]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Path of the scrape endpoint
    pub metrics_path: String,
    pub namespace: Option<String>,
    pub subsystem: Option<String>,

    /// Routes matched by exact path
    pub static_routes: Vec<String>,
    /// Route template -> 1-based parameter segment index
    pub dynamic_routes: BTreeMap<String, usize>,

    /// Metrics registered next to the defaults
    pub custom_metrics: Vec<MetricSpec>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            metrics_path: DEFAULT_METRICS_PATH.to_string(),
            namespace: Some(DEFAULT_NAMESPACE.to_string()),
            subsystem: None,
            static_routes: Vec::new(),
            dynamic_routes: BTreeMap::new(),
            custom_metrics: Vec::new(),
        }
    }
}

impl MetricsConfig {
    /// Load from environment variables
    pub fn from_env() -> Result<Self, String> {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("METRICS_PATH") {
            if !val.starts_with('/') {
                return Err(format!("Invalid METRICS_PATH: {} must start with '/'", val));
            }
            config.metrics_path = val;
        }

        if let Ok(val) = std::env::var("METRICS_NAMESPACE") {
            config.namespace = Some(val).filter(|ns| !ns.is_empty());
        }

        if let Ok(val) = std::env::var("METRICS_SUBSYSTEM") {
            config.subsystem = Some(val).filter(|sub| !sub.is_empty());
        }

        if let Ok(val) = std::env::var("METRICS_STATIC_ROUTES") {
            config.static_routes = parse_list(&val);
        }

        if let Ok(val) = std::env::var("METRICS_DYNAMIC_ROUTES") {
            config.dynamic_routes = parse_dynamic_routes(&val)
                .map_err(|e| format!("Invalid METRICS_DYNAMIC_ROUTES: {}", e))?;
        }

        if let Ok(val) = std::env::var("METRICS_CUSTOM") {
            config.custom_metrics = serde_json::from_str(&val)
                .map_err(|e| format!("Invalid METRICS_CUSTOM: {}", e))?;
        }

        Ok(config)
    }

    pub fn with_static_route(mut self, path: impl Into<String>) -> Self {
        self.static_routes.push(path.into());
        self
    }

    pub fn with_dynamic_route(mut self, template: impl Into<String>, param_index: usize) -> Self {
        self.dynamic_routes.insert(template.into(), param_index);
        self
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `"/v1/hello/:name=3,/hello/:sex/call=2"`
pub fn parse_dynamic_routes(value: &str) -> Result<BTreeMap<String, usize>, String> {
    parse_list(value)
        .into_iter()
        .map(|item| {
            let (template, index) = item
                .rsplit_once('=')
                .ok_or_else(|| format!("missing '=<index>' in {}", item))?;
            let index = index
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("bad index in {}: {}", item, e))?;
            Ok((template.trim().to_string(), index))
        })
        .collect()
}
