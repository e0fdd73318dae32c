//! Span sources
//!
//! A [`SpanSource`] returns the spans recorded for a run. The pipeline only
//! reads through this trait; retries and timeouts belong to implementations.

mod memory;
mod resolve;
mod search;

pub use memory::StaticSpanSource;
pub use resolve::{resolve_data_source, ENDPOINT_HEADER, INDEX_HEADER, PASSWORD_HEADER, USERNAME_HEADER};
pub use search::{SearchSpanSource, SearchSourceOptions};

use crate::error::Result;
use crate::models::{DataSourceConfig, Span};

/// Source of spans for live runs
#[async_trait::async_trait]
pub trait SpanSource: Send + Sync {
    /// Fetch every span tagged with `run_id` from the given data source
    async fn fetch_spans(&self, run_id: &str, data_source: &DataSourceConfig) -> Result<Vec<Span>>;
}
