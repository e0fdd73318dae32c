//! Per-request data source resolution

use axum::http::HeaderMap;

use crate::models::{DataSourceConfig, DEFAULT_INDEX_PATTERN};

/// Header naming the trace backend URL
pub const ENDPOINT_HEADER: &str = "x-trace-endpoint";
/// Header carrying the basic auth username
pub const USERNAME_HEADER: &str = "x-trace-username";
/// Header carrying the basic auth password
pub const PASSWORD_HEADER: &str = "x-trace-password";
/// Header naming the index pattern
pub const INDEX_HEADER: &str = "x-trace-index";

/// Resolve the data source for one request.
///
/// A request naming an endpoint in its headers uses that backend; otherwise
/// the configured fallback applies. `None` means no source is configured.
pub fn resolve_data_source(headers: &HeaderMap, fallback: Option<&DataSourceConfig>) -> Option<DataSourceConfig> {
    let Some(endpoint) = header_value(headers, ENDPOINT_HEADER) else {
        return fallback.cloned();
    };

    Some(DataSourceConfig {
        endpoint,
        username: header_value(headers, USERNAME_HEADER),
        password: header_value(headers, PASSWORD_HEADER),
        index_pattern: header_value(headers, INDEX_HEADER)
            .unwrap_or_else(|| DEFAULT_INDEX_PATTERN.to_string()),
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}
