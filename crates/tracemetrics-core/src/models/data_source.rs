//! Data source descriptor

use serde::{Deserialize, Serialize};

/// Index pattern used when a source names an endpoint but no index
pub const DEFAULT_INDEX_PATTERN: &str = "traces-*";

/// Where the spans of live runs are read from.
///
/// Resolved once per request and never mutated by the pipeline.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceConfig {
    /// Base URL of the trace backend
    pub endpoint: String,

    /// Basic auth username
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<String>,

    /// Index (or table) pattern holding the spans
    pub index_pattern: String,
}

impl DataSourceConfig {
    /// Create a source without credentials
    pub fn new(endpoint: impl Into<String>, index_pattern: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: None,
            password: None,
            index_pattern: index_pattern.into(),
        }
    }

    /// Attach basic auth credentials
    pub fn with_credentials(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.username = Some(username.into());
        self.password = password;
        self
    }
}

// Keeps the password out of logs.
impl std::fmt::Debug for DataSourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("index_pattern", &self.index_pattern)
            .finish()
    }
}
