//! Configuration management for TraceMetrics

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{DataSourceConfig, DEFAULT_INDEX_PATTERN};
use crate::pipeline::{DEFAULT_BATCH_SIZE, DEFAULT_SAMPLE_PREFIX};

/// Prefix for environment overrides, e.g. `TRACEMETRICS_SERVER__HTTP_PORT`
pub const ENV_PREFIX: &str = "TRACEMETRICS";

/// Main configuration struct
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,

    /// Trace backend configuration
    pub source: SourceConfig,

    /// Pipeline configuration
    pub pipeline: PipelineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from an optional file plus `TRACEMETRICS_*`
    /// environment variables. Missing values fall back to defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// HTTP API port
    pub http_port: u16,
    /// Port for the Prometheus exporter (disabled if unset)
    pub metrics_port: Option<u16>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 8080,
            metrics_port: None,
        }
    }
}

/// Trace backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Default backend URL used when a request names none
    pub endpoint: Option<String>,
    /// Basic auth username
    pub username: Option<String>,
    /// Basic auth password
    pub password: Option<String>,
    /// Index pattern holding the spans
    pub index_pattern: Option<String>,
    /// Document field holding the run identifier
    pub run_id_field: String,
    /// Document field holding the span start time
    pub start_time_field: String,
    /// Maximum number of spans fetched per run; runs with more spans fail
    pub max_spans: usize,
    /// Per-query timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            username: None,
            password: None,
            index_pattern: None,
            run_id_field: "run_id".to_string(),
            start_time_field: "started_at".to_string(),
            max_spans: 10_000,
            timeout: Duration::from_secs(30),
        }
    }
}

impl SourceConfig {
    /// The configured default data source, if an endpoint is set
    pub fn default_source(&self) -> Option<DataSourceConfig> {
        let endpoint = self.endpoint.as_deref().filter(|e| !e.trim().is_empty())?;

        Some(DataSourceConfig {
            endpoint: endpoint.to_string(),
            username: self.username.clone(),
            password: self.password.clone(),
            index_pattern: self
                .index_pattern
                .clone()
                .unwrap_or_else(|| DEFAULT_INDEX_PATTERN.to_string()),
        })
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of live runs queried concurrently per batch
    pub batch_size: usize,
    /// Run identifiers with this prefix are served from sample fixtures;
    /// the rest of the identifier names the fixture
    pub sample_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            sample_prefix: DEFAULT_SAMPLE_PREFIX.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (json or pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
