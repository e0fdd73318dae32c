//! Error types for TraceMetrics

use thiserror::Error;

/// Result type alias using TraceMetrics' Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for TraceMetrics operations
#[derive(Error, Debug)]
pub enum Error {
    /// A live run was requested but no data source was resolved
    #[error("data source not configured")]
    NotConfigured,

    /// A sample-namespaced run has no fixture
    #[error("no sample data found for run {run_id}")]
    NoSampleData {
        /// Requested run identifier
        run_id: String,
    },

    /// The trace backend returned zero spans for the run
    #[error("no data found for run {run_id}")]
    NoData {
        /// Requested run identifier
        run_id: String,
    },

    /// The trace backend could not be reached
    #[error("trace backend unreachable: {0}")]
    Unreachable(String),

    /// The trace query did not finish in time
    #[error("trace query timed out: {0}")]
    Timeout(String),

    /// The trace backend answered with data that could not be interpreted
    #[error("malformed span data: {0}")]
    Malformed(String),

    /// The trace backend matched more spans than it returned
    #[error("incomplete span data: backend returned {returned} of {total} spans")]
    Incomplete {
        /// Spans returned
        returned: usize,
        /// Spans matching the run
        total: u64,
    },

    /// The trace backend answered with a non-success status
    #[error("trace backend returned HTTP {status}: {body}")]
    Backend {
        /// HTTP status code
        status: u16,
        /// Response body, truncated
        body: String,
    },

    /// The caller supplied a malformed request
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a no-data error for a run
    pub fn no_data(run_id: impl Into<String>) -> Self {
        Self::NoData {
            run_id: run_id.into(),
        }
    }

    /// Create a missing-fixture error for a sample run
    pub fn no_sample_data(run_id: impl Into<String>) -> Self {
        Self::NoSampleData {
            run_id: run_id.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if err.is_connect() || err.is_request() {
            Self::Unreachable(err.to_string())
        } else {
            Self::Internal(err.to_string())
        }
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
