pub mod builder;
pub mod range;

use serde::Deserialize;

/// Placeholder used for unset parameters in cache keys.
pub const UNSET: &str = "-";

/// Query parameters accepted by the dashboard endpoints.
///
/// Every field is optional at this level; endpoints that require a field
/// (`metric` for time series) check it themselves.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct DashboardQuery {
    pub range: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub pipeline_id: Option<String>,
    pub user_id: Option<String>,
    pub metric: Option<String>,
}

impl DashboardQuery {
    pub fn range(&self) -> Option<&str> {
        self.range.as_deref()
    }

    pub fn from(&self) -> Option<&str> {
        self.from.as_deref()
    }

    pub fn to(&self) -> Option<&str> {
        self.to.as_deref()
    }

    pub fn pipeline_id(&self) -> Option<&str> {
        self.pipeline_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn metric(&self) -> Option<&str> {
        self.metric.as_deref()
    }
}

/// Derive a cache key from an endpoint name and its parameters.
///
/// Parameters are serialized in the order given, each as `name=value`.
/// Unset parameters render as [`UNSET`] rather than being skipped, and values
/// are kept verbatim so differently-cased inputs produce different keys.
pub fn cache_key(endpoint: &str, params: &[(&str, Option<&str>)]) -> String {
    let mut key = String::from(endpoint);
    for (name, value) in params {
        key.push('|');
        key.push_str(name);
        key.push('=');
        key.push_str(value.unwrap_or(UNSET));
    }
    key
}
