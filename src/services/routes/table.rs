use axum::http::uri::PathAndQuery;
use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};

use super::types::{Classification, DynamicRoute, RouteError};

/// Route table used to classify request paths into route labels.
///
/// Static routes match their exact path. Dynamic routes are templates with one
/// parameter segment at a declared 1-based index of the template's `/` split:
/// `/v1/hello/:name` with index 3 splits into `["", "v1", "hello", ":name"]`.
///
/// Dynamic templates are expected to be disjoint. When several templates match
/// a path, the first in lexical order wins.
#[derive(Debug, Default)]
pub struct RouteTable {
    static_routes: RwLock<HashSet<String>>,
    dynamic_routes: RwLock<BTreeMap<String, DynamicRoute>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a route matched by exact path
    pub fn add_static(&self, path: &str) -> Result<(), RouteError> {
        validate_path(path)?;

        self.static_routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_string());
        tracing::debug!(route = path, "static route added");
        Ok(())
    }

    /// Removing an unknown route is a no-op
    pub fn remove_static(&self, path: &str) {
        let removed = self
            .static_routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path);
        if removed {
            tracing::debug!(route = path, "static route removed");
        }
    }

    /// Register a templated route whose parameter sits at `param_index`.
    ///
    /// Re-adding a template replaces its index.
    pub fn add_dynamic(&self, template: &str, param_index: usize) -> Result<(), RouteError> {
        validate_path(template)?;

        let segments = template.split('/').count();
        if param_index == 0 || param_index >= segments {
            return Err(RouteError::InvalidParamIndex {
                template: template.to_string(),
                index: param_index,
                segments,
            });
        }

        self.dynamic_routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(template.to_string(), DynamicRoute { param_index });
        tracing::debug!(route = template, param_index, "dynamic route added");
        Ok(())
    }

    pub fn remove_dynamic(&self, template: &str) {
        let removed = self
            .dynamic_routes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(template);
        if removed.is_some() {
            tracing::debug!(route = template, "dynamic route removed");
        }
    }

    pub fn contains_static(&self, path: &str) -> bool {
        self.static_routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(path)
    }

    pub fn dynamic_index(&self, template: &str) -> Option<usize> {
        self.dynamic_routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(template)
            .map(|route| route.param_index)
    }

    pub fn is_empty(&self) -> bool {
        self.static_routes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
            && self
                .dynamic_routes
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .is_empty()
    }

    /// Map a request path to the route template it belongs to.
    ///
    /// Static routes are checked first. Dynamic templates are then compared
    /// segment by segment with the parameter position removed from both sides.
    /// When the request has no segment at that position nothing is removed on
    /// its side, so a shorter path can still match (`/a` against `/a/:id`).
    pub fn classify(&self, path: &str) -> Classification {
        if self.contains_static(path) {
            return Classification::Matched(path.to_string());
        }

        let dynamic = self
            .dynamic_routes
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        dynamic
            .iter()
            .find(|(template, route)| matches_template(path, template, route.param_index))
            .map(|(template, _)| Classification::Matched(template.clone()))
            .unwrap_or(Classification::Unmatched)
    }
}

/// Compare `path` and `template` with the segment at `index` dropped from each
/// side that has one.
fn matches_template(path: &str, template: &str, index: usize) -> bool {
    let path_skip = skip_position(path, index);
    let template_skip = skip_position(template, index);

    let path_segments = path
        .split('/')
        .enumerate()
        .filter(|(i, _)| Some(*i) != path_skip)
        .map(|(_, segment)| segment);
    let template_segments = template
        .split('/')
        .enumerate()
        .filter(|(i, _)| Some(*i) != template_skip)
        .map(|(_, segment)| segment);

    path_segments.eq(template_segments)
}

fn skip_position(path: &str, index: usize) -> Option<usize> {
    (path.split('/').count() > index).then_some(index)
}

fn validate_path(path: &str) -> Result<(), RouteError> {
    let invalid = |reason: &str| RouteError::InvalidRoute {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }

    let parsed: PathAndQuery = path
        .parse()
        .map_err(|e: axum::http::uri::InvalidUri| invalid(&e.to_string()))?;

    if parsed.query().is_some() || parsed.as_str() != path {
        return Err(invalid("must be a bare path without query or fragment"));
    }

    Ok(())
}
