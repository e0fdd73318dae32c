//! Run metrics computation
//!
//! Reduces the spans of one run into a [`RunSummary`]. Live runs fetch their
//! spans from a [`SpanSource`]; sample runs read fixed fixtures. Both go
//! through the same reduction.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::models::{millis_between, DataSourceConfig, RunMetrics, RunSummary, Span, SpanStatus};
use crate::source::SpanSource;

use super::cost::CostCalculator;
use super::sample;

/// Computes metrics for individual runs
pub struct MetricsComputer {
    source: Arc<dyn SpanSource>,
    cost_calculator: CostCalculator,
    sample_prefix: String,
}

impl MetricsComputer {
    /// Create a computer reading live spans from `source`
    pub fn new(source: Arc<dyn SpanSource>) -> Self {
        Self {
            source,
            cost_calculator: CostCalculator::new(),
            sample_prefix: sample::DEFAULT_SAMPLE_PREFIX.to_string(),
        }
    }

    /// Use a different prefix for sample run identifiers
    pub fn with_sample_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.sample_prefix = prefix.into();
        self
    }

    /// Use a custom cost calculator
    pub fn with_cost_calculator(mut self, cost_calculator: CostCalculator) -> Self {
        self.cost_calculator = cost_calculator;
        self
    }

    /// Whether `run_id` belongs to the sample namespace
    pub fn is_sample_run(&self, run_id: &str) -> bool {
        run_id.starts_with(&self.sample_prefix)
    }

    /// Compute a live run's metrics from the trace backend
    #[instrument(skip(self, data_source), fields(index = %data_source.index_pattern))]
    pub async fn compute_metrics(&self, run_id: &str, data_source: &DataSourceConfig) -> Result<RunSummary> {
        let started = Instant::now();
        let spans = self.source.fetch_spans(run_id, data_source).await?;

        debug!(
            span_count = spans.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched spans"
        );

        self.reduce(run_id, &spans)
    }

    /// Compute a sample run's metrics without any I/O.
    ///
    /// The fixture is looked up by `run_id` without the sample prefix.
    /// Returns `None` when no fixture exists for `run_id`. A fixture without
    /// spans yields an error record.
    pub fn compute_metrics_from_sample_spans(&self, run_id: &str) -> Option<RunMetrics> {
        let name = run_id.strip_prefix(self.sample_prefix.as_str())?;
        let spans = sample::sample_spans(name)?;
        Some(RunMetrics::from_result(run_id, self.reduce(run_id, spans)))
    }

    /// Reduce the spans of one run
    pub fn reduce(&self, run_id: &str, spans: &[Span]) -> Result<RunSummary> {
        if spans.is_empty() {
            return Err(Error::no_data(run_id));
        }

        let mut summary = RunSummary {
            span_count: spans.len() as u64,
            ..RunSummary::default()
        };
        let mut window: Option<(DateTime<Utc>, DateTime<Utc>)> = None;
        let mut cost: Option<f64> = None;
        let mut unpriced_llm_calls = 0u64;

        for span in spans {
            validate(span)?;

            let end = span.effective_end();
            window = Some(match window {
                Some((first, last)) => (first.min(span.started_at), last.max(end)),
                None => (span.started_at, end),
            });

            if span.status == SpanStatus::Error {
                summary.error_spans += 1;
            }

            if span.is_tool_call() {
                summary.tool_calls += 1;
            }

            if !span.is_llm_call() {
                continue;
            }

            summary.llm_calls += 1;
            let tokens_in = span.tokens_in.unwrap_or(0);
            let tokens_out = span
                .tokens_out
                .unwrap_or(0)
                .saturating_add(span.tokens_reasoning.unwrap_or(0));
            summary.input_tokens = summary.input_tokens.saturating_add(tokens_in);
            summary.output_tokens = summary.output_tokens.saturating_add(tokens_out);
            summary.total_tokens = summary.total_tokens.saturating_add(span.total_tokens());

            match self.cost_calculator.span_cost(span) {
                Some(span_cost) => cost = Some(cost.unwrap_or(0.0) + span_cost),
                None => unpriced_llm_calls += 1,
            }
        }

        if unpriced_llm_calls > 0 {
            debug!(run_id, unpriced_llm_calls, "Some LLM calls could not be priced");
        }

        // No LLM calls means nothing to pay for.
        summary.cost_usd = if summary.llm_calls == 0 { Some(0.0) } else { cost };
        summary.duration_ms = window.map_or(0.0, |(first, last)| millis_between(first, last));

        Ok(summary)
    }
}

fn validate(span: &Span) -> Result<()> {
    if let Some(ended_at) = span.ended_at {
        if ended_at < span.started_at {
            return Err(Error::Malformed(format!(
                "span {} ends before it starts",
                span.span_id
            )));
        }
    }

    if let Some(cost) = span.cost_usd {
        if !cost.is_finite() || cost < 0.0 {
            return Err(Error::Malformed(format!(
                "span {} has invalid cost {cost}",
                span.span_id
            )));
        }
    }

    Ok(())
}
