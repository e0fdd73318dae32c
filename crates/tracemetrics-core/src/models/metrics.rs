//! Metrics data models

use serde::{Deserialize, Serialize};

/// Metrics computed for one run, or the reason they could not be
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    /// Caller-supplied run identifier
    pub run_id: String,

    /// Outcome of the computation
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// Outcome of computing one run's metrics.
///
/// Serialized with a `status` tag so an error record never carries numeric
/// fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RunOutcome {
    /// Metrics were computed
    Success(RunSummary),
    /// Metrics could not be computed
    Error {
        /// Human-readable reason
        message: String,
    },
}

/// Numeric metrics for a successfully computed run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Tokens used across all LLM calls
    pub total_tokens: u64,

    /// Input tokens across all LLM calls
    pub input_tokens: u64,

    /// Output and reasoning tokens across all LLM calls
    pub output_tokens: u64,

    /// Derived cost; absent when no LLM call could be priced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,

    /// Wall-clock duration from the earliest start to the latest end
    pub duration_ms: f64,

    /// Number of LLM invocation spans
    pub llm_calls: u64,

    /// Number of tool invocation spans
    pub tool_calls: u64,

    /// Number of spans in the run
    pub span_count: u64,

    /// Number of spans that reported an error status
    pub error_spans: u64,
}

impl RunMetrics {
    /// Create a successful record
    pub fn success(run_id: impl Into<String>, summary: RunSummary) -> Self {
        Self {
            run_id: run_id.into(),
            outcome: RunOutcome::Success(summary),
        }
    }

    /// Create an error record
    pub fn error(run_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            outcome: RunOutcome::Error {
                message: message.into(),
            },
        }
    }

    /// Build a record from the result of a computation
    pub fn from_result(run_id: impl Into<String>, result: crate::Result<RunSummary>) -> Self {
        match result {
            Ok(summary) => Self::success(run_id, summary),
            Err(e) => Self::error(run_id, e.to_string()),
        }
    }

    /// Check if the metrics were computed
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, RunOutcome::Success(_))
    }

    /// The numeric metrics, if computed
    pub fn summary(&self) -> Option<&RunSummary> {
        match &self.outcome {
            RunOutcome::Success(summary) => Some(summary),
            RunOutcome::Error { .. } => None,
        }
    }

    /// The error message, if the computation failed
    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            RunOutcome::Success(_) => None,
            RunOutcome::Error { message } => Some(message),
        }
    }
}

/// Cross-run summary over successfully computed runs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    /// Number of runs aggregated
    pub run_count: u64,

    /// Total tokens
    pub total_tokens: u64,

    /// Total input tokens
    pub total_input_tokens: u64,

    /// Total output tokens
    pub total_output_tokens: u64,

    /// Total cost over runs with a derivable cost
    pub total_cost_usd: f64,

    /// Runs whose cost could not be derived
    pub unpriced_runs: u64,

    /// Average cost per priced run
    pub avg_cost_usd: Option<f64>,

    /// Sum of run durations
    pub total_duration_ms: f64,

    /// Average run duration
    pub avg_duration_ms: Option<f64>,

    /// Shortest run
    pub min_duration_ms: Option<f64>,

    /// Longest run
    pub max_duration_ms: Option<f64>,

    /// Total LLM calls
    pub total_llm_calls: u64,

    /// Total tool calls
    pub total_tool_calls: u64,

    /// Average tokens per run
    pub avg_tokens_per_run: Option<f64>,
}

/// Per-run records in request order plus their aggregate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    /// One record per requested run, in request order
    pub runs: Vec<RunMetrics>,

    /// Aggregate over the successful records
    pub aggregate: AggregateMetrics,
}

impl BatchReport {
    /// Number of runs that failed
    pub fn failed_count(&self) -> usize {
        self.runs.iter().filter(|r| !r.is_success()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_success_serialization() {
        let record = RunMetrics::success(
            "run-1",
            RunSummary {
                total_tokens: 150,
                input_tokens: 100,
                output_tokens: 50,
                cost_usd: Some(0.25),
                duration_ms: 1200.0,
                llm_calls: 1,
                tool_calls: 2,
                span_count: 4,
                error_spans: 0,
            },
        );

        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({
                "runId": "run-1",
                "status": "success",
                "totalTokens": 150,
                "inputTokens": 100,
                "outputTokens": 50,
                "costUsd": 0.25,
                "durationMs": 1200.0,
                "llmCalls": 1,
                "toolCalls": 2,
                "spanCount": 4,
                "errorSpans": 0
            })
        );
    }

    #[test]
    fn test_error_record_has_no_numeric_fields() {
        let record = RunMetrics::error("run-2", "data source not configured");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(
            value,
            json!({
                "runId": "run-2",
                "status": "error",
                "message": "data source not configured"
            })
        );
        assert!(record.summary().is_none());
        assert_eq!(record.error_message(), Some("data source not configured"));
    }

    #[test]
    fn test_round_trip_through_json() {
        let record = RunMetrics::error("run-3", "boom");
        let text = serde_json::to_string(&record).unwrap();
        let back: RunMetrics = serde_json::from_str(&text).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_from_result() {
        let failed = RunMetrics::from_result("r", Err(crate::Error::no_data("r")));
        assert_eq!(failed.error_message(), Some("no data found for run r"));

        let ok = RunMetrics::from_result("r", Ok(RunSummary::default()));
        assert!(ok.is_success());
    }
}
