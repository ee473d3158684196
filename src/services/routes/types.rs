/// Result of classifying a request path against the route table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Canonical route template the path belongs to
    Matched(String),
    Unmatched,
}

impl Classification {
    pub fn is_matched(&self) -> bool {
        matches!(self, Classification::Matched(_))
    }

    /// Route label to record against, if the path was classified
    pub fn route(&self) -> Option<&str> {
        match self {
            Classification::Matched(route) => Some(route),
            Classification::Unmatched => None,
        }
    }

    pub fn into_route(self) -> Option<String> {
        match self {
            Classification::Matched(route) => Some(route),
            Classification::Unmatched => None,
        }
    }
}

/// A templated route with a single parameter segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicRoute {
    /// 1-based position of the parameter in the template's `/` split
    pub param_index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("Invalid route {path:?}: {reason}")]
    InvalidRoute { path: String, reason: String },
    #[error("Invalid parameter index {index} for {template:?} ({segments} segments)")]
    InvalidParamIndex {
        template: String,
        index: usize,
        segments: usize,
    },
}
