//! In-memory span source

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::models::{DataSourceConfig, Span};

use super::SpanSource;

type ErrorFactory = Box<dyn Fn() -> Error + Send + Sync>;

enum Entry {
    Spans(Vec<Span>),
    Failure(ErrorFactory),
}

/// Span source backed by a fixed map of runs.
///
/// Unknown runs return no spans. Every query is recorded.
#[derive(Default)]
pub struct StaticSpanSource {
    runs: HashMap<String, Entry>,
    queries: Mutex<Vec<String>>,
}

impl StaticSpanSource {
    /// Serve `spans` for `run_id`
    pub fn with_run(mut self, run_id: impl Into<String>, spans: Vec<Span>) -> Self {
        self.runs.insert(run_id.into(), Entry::Spans(spans));
        self
    }

    /// Fail every query for `run_id` with the error built by `make_error`
    pub fn with_failure(
        mut self,
        run_id: impl Into<String>,
        make_error: impl Fn() -> Error + Send + Sync + 'static,
    ) -> Self {
        self.runs.insert(run_id.into(), Entry::Failure(Box::new(make_error)));
        self
    }

    /// Run identifiers queried so far, in query order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait::async_trait]
impl SpanSource for StaticSpanSource {
    async fn fetch_spans(&self, run_id: &str, _data_source: &DataSourceConfig) -> Result<Vec<Span>> {
        self.queries.lock().push(run_id.to_string());

        match self.runs.get(run_id) {
            Some(Entry::Spans(spans)) => Ok(spans.clone()),
            Some(Entry::Failure(make_error)) => Err(make_error()),
            None => Ok(Vec::new()),
        }
    }
}
