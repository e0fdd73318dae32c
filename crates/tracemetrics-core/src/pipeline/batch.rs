//! Batch orchestration
//!
//! Computes metrics for many runs at once. Sample runs resolve immediately,
//! live runs are queried in sequential batches with every run of a batch in
//! flight at the same time. A failing run becomes an error record and never
//! affects its siblings. Results are reassembled by run identifier, so the
//! output follows the request order whatever order queries complete in.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::models::{BatchReport, DataSourceConfig, RunMetrics};
use crate::source::SpanSource;

use super::aggregate::compute_aggregate_metrics;
use super::computer::MetricsComputer;

/// Live runs queried concurrently per batch unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Orchestrates metrics computation across many runs
pub struct BatchOrchestrator {
    computer: MetricsComputer,
    batch_size: usize,
}

impl BatchOrchestrator {
    /// Create an orchestrator with the default batch size
    pub fn new(computer: MetricsComputer) -> Self {
        Self {
            computer,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Create an orchestrator from pipeline configuration
    pub fn from_config(source: Arc<dyn SpanSource>, config: &PipelineConfig) -> Self {
        let computer = MetricsComputer::new(source).with_sample_prefix(config.sample_prefix.clone());
        Self::new(computer).with_batch_size(config.batch_size)
    }

    /// Set how many live runs are queried concurrently (at least one)
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// The per-run metrics computer
    pub fn computer(&self) -> &MetricsComputer {
        &self.computer
    }

    /// Compute one record per requested run, in request order.
    ///
    /// Never fails: every per-run problem is reported in that run's record.
    /// Repeated identifiers are computed once and share a record.
    pub async fn compute_batch(
        &self,
        run_ids: &[String],
        data_source: Option<&DataSourceConfig>,
    ) -> Vec<RunMetrics> {
        let mut records: HashMap<&str, RunMetrics> = HashMap::with_capacity(run_ids.len());
        let mut live: Vec<&str> = Vec::new();
        let mut queued: HashSet<&str> = HashSet::new();

        for run_id in run_ids {
            let run_id = run_id.as_str();
            if self.computer.is_sample_run(run_id) {
                records.insert(run_id, self.sample_record(run_id));
            } else if data_source.is_none() {
                records.insert(run_id, not_configured(run_id));
            } else if queued.insert(run_id) {
                live.push(run_id);
            }
        }

        if let Some(data_source) = data_source {
            for (batch, chunk) in live.chunks(self.batch_size).enumerate() {
                debug!(batch, size = chunk.len(), "Dispatching live batch");

                let results = join_all(chunk.iter().map(|&run_id| async move {
                    (run_id, self.live_record(run_id, data_source).await)
                }))
                .await;

                records.extend(results);
            }
        }

        run_ids
            .iter()
            .map(|run_id| {
                records.get(run_id.as_str()).cloned().unwrap_or_else(|| {
                    RunMetrics::error(run_id.as_str(), Error::internal("run was not scheduled").to_string())
                })
            })
            .collect()
    }

    /// Compute the record of a single run
    pub async fn compute_run(&self, run_id: &str, data_source: Option<&DataSourceConfig>) -> RunMetrics {
        if self.computer.is_sample_run(run_id) {
            return self.sample_record(run_id);
        }

        match data_source {
            Some(data_source) => self.live_record(run_id, data_source).await,
            None => not_configured(run_id),
        }
    }

    /// Compute a batch and aggregate its successful runs.
    ///
    /// Each distinct run counts once in the aggregate, however often it was
    /// requested.
    pub async fn run(&self, run_ids: &[String], data_source: Option<&DataSourceConfig>) -> BatchReport {
        let started = Instant::now();
        let runs = self.compute_batch(run_ids, data_source).await;

        let aggregate = {
            let mut counted = HashSet::new();
            compute_aggregate_metrics(
                runs.iter()
                    .filter(|record| counted.insert(record.run_id.as_str()))
                    .filter_map(RunMetrics::summary),
            )
        };

        let report = BatchReport { runs, aggregate };
        info!(
            requested = run_ids.len(),
            failed = report.failed_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Computed batch metrics"
        );
        report
    }

    fn sample_record(&self, run_id: &str) -> RunMetrics {
        let record = self
            .computer
            .compute_metrics_from_sample_spans(run_id)
            .unwrap_or_else(|| RunMetrics::error(run_id, Error::no_sample_data(run_id).to_string()));
        record_outcome(&record);
        record
    }

    async fn live_record(&self, run_id: &str, data_source: &DataSourceConfig) -> RunMetrics {
        let result = self.computer.compute_metrics(run_id, data_source).await;
        if let Err(e) = &result {
            warn!(run_id, error = %e, "Failed to compute run metrics");
        }

        let record = RunMetrics::from_result(run_id, result);
        record_outcome(&record);
        record
    }
}

fn not_configured(run_id: &str) -> RunMetrics {
    let record = RunMetrics::error(run_id, Error::NotConfigured.to_string());
    record_outcome(&record);
    record
}

fn record_outcome(record: &RunMetrics) {
    let status = if record.is_success() { "success" } else { "error" };
    metrics::counter!("tracemetrics_runs_total", "status" => status).increment(1);
}

/// Extract run identifiers from a batch request body.
///
/// Accepts `{"runIds": [...]}` (or `run_ids`). Anything else is a caller
/// error that rejects the whole batch.
pub fn parse_run_ids(body: &serde_json::Value) -> Result<Vec<String>> {
    let ids = body
        .get("runIds")
        .or_else(|| body.get("run_ids"))
        .ok_or_else(|| Error::invalid_input("runIds is required"))?;

    let ids = ids
        .as_array()
        .ok_or_else(|| Error::invalid_input("runIds must be an array"))?;

    ids.iter()
        .enumerate()
        .map(|(i, id)| {
            id.as_str()
                .map(String::from)
                .ok_or_else(|| Error::invalid_input(format!("runIds[{i}] must be a string")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Span, SpanKind};
    use crate::source::StaticSpanSource;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn llm_span(run_id: &str, tokens: u64) -> Span {
        let start = Utc.with_ymd_and_hms(2025, 2, 1, 9, 0, 0).unwrap();
        Span::new(run_id, "s", "chat", SpanKind::Llm, start, Some(start + chrono::Duration::milliseconds(250)))
            .with_usage("gpt-4o", tokens, 0)
    }

    fn data_source() -> DataSourceConfig {
        DataSourceConfig::new("http://localhost:9200", "traces-*")
    }

    fn ids(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    /// Source that answers every run after a per-run delay and records how
    /// many queries had completed when each one started.
    #[derive(Default)]
    struct RecordingSource {
        delays: HashMap<String, Duration>,
        failing: HashSet<String>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        completed: AtomicUsize,
        starts: Mutex<Vec<(String, usize)>>,
    }

    #[async_trait::async_trait]
    impl SpanSource for RecordingSource {
        async fn fetch_spans(&self, run_id: &str, _data_source: &DataSourceConfig) -> Result<Vec<Span>> {
            self.starts
                .lock()
                .push((run_id.to_string(), self.completed.load(Ordering::SeqCst)));
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = self.delays.get(run_id).copied().unwrap_or(Duration::from_millis(1));
            tokio::time::sleep(delay).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.fetch_add(1, Ordering::SeqCst);

            if self.failing.contains(run_id) {
                return Err(Error::Unreachable("connection reset".to_string()));
            }
            Ok(vec![llm_span(run_id, 100)])
        }
    }

    fn orchestrator(source: Arc<dyn SpanSource>) -> BatchOrchestrator {
        BatchOrchestrator::new(MetricsComputer::new(source))
    }

    #[tokio::test]
    async fn test_mixed_batch_without_data_source() {
        let source = Arc::new(StaticSpanSource::default());
        let orchestrator = orchestrator(source.clone());

        let report = orchestrator
            .run(&ids(&["demo-1", "run-abc", "demo-missing"]), None)
            .await;

        assert_eq!(report.runs.len(), 3);
        assert_eq!(report.runs[0].run_id, "demo-1");
        assert!(report.runs[0].is_success());
        assert_eq!(report.runs[1].run_id, "run-abc");
        assert_eq!(report.runs[1].error_message(), Some("data source not configured"));
        assert_eq!(report.runs[2].run_id, "demo-missing");
        assert_eq!(
            report.runs[2].error_message(),
            Some("no sample data found for run demo-missing")
        );

        // Only demo-1 contributes to the aggregate
        assert_eq!(report.aggregate.run_count, 1);
        assert_eq!(report.aggregate.total_tokens, 10_900);
        assert_eq!(report.failed_count(), 2);

        assert!(source.queries().is_empty());
    }

    #[tokio::test]
    async fn test_live_runs_without_data_source_never_query() {
        let source = Arc::new(StaticSpanSource::default().with_run("run-1", vec![llm_span("run-1", 5)]));
        let orchestrator = orchestrator(source.clone());

        let runs = orchestrator.compute_batch(&ids(&["run-1", "run-2"]), None).await;

        assert!(runs.iter().all(|r| r.error_message() == Some("data source not configured")));
        assert!(source.queries().is_empty());
    }

    #[tokio::test]
    async fn test_batches_of_ten_preserve_order() {
        let run_ids: Vec<String> = (0..25).map(|i| format!("run-{i:02}")).collect();
        // Later runs in a batch answer first
        let delays = run_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (id.clone(), Duration::from_millis(2 * (25 - i as u64))))
            .collect();
        let source = Arc::new(RecordingSource {
            delays,
            ..RecordingSource::default()
        });
        let orchestrator = orchestrator(source.clone());

        let runs = orchestrator.compute_batch(&run_ids, Some(&data_source())).await;

        let returned: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        let requested: Vec<&str> = run_ids.iter().map(String::as_str).collect();
        assert_eq!(returned, requested);
        assert!(runs.iter().all(RunMetrics::is_success));

        // Each batch starts only once the previous one has fully completed
        let starts = source.starts.lock().clone();
        let mut waves: HashMap<usize, usize> = HashMap::new();
        for (_, completed_before) in &starts {
            *waves.entry(*completed_before).or_default() += 1;
        }
        assert_eq!(waves, HashMap::from([(0, 10), (10, 10), (20, 5)]));
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_failure_is_isolated() {
        let run_ids = ids(&["run-1", "run-2", "run-3", "run-4", "run-5"]);
        let source = Arc::new(RecordingSource {
            failing: HashSet::from(["run-3".to_string()]),
            ..RecordingSource::default()
        });
        let orchestrator = orchestrator(source);

        let report = orchestrator.run(&run_ids, Some(&data_source())).await;

        assert_eq!(report.runs.len(), 5);
        assert_eq!(
            report.runs[2].error_message(),
            Some("trace backend unreachable: connection reset")
        );
        assert_eq!(report.runs.iter().filter(|r| r.is_success()).count(), 4);
        assert_eq!(report.aggregate.run_count, 4);
        assert_eq!(report.aggregate.total_tokens, 400);
    }

    #[tokio::test]
    async fn test_run_without_spans_is_error() {
        let source = Arc::new(StaticSpanSource::default());
        let orchestrator = orchestrator(source.clone());

        let runs = orchestrator.compute_batch(&ids(&["run-ghost"]), Some(&data_source())).await;

        assert_eq!(runs[0].error_message(), Some("no data found for run run-ghost"));
        assert_eq!(source.queries(), vec!["run-ghost".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_ids_share_one_record() {
        let source = Arc::new(StaticSpanSource::default().with_run("run-1", vec![llm_span("run-1", 42)]));
        let orchestrator = orchestrator(source.clone());

        let report = orchestrator
            .run(&ids(&["run-1", "run-1", "demo-2", "demo-2"]), Some(&data_source()))
            .await;

        assert_eq!(report.runs.len(), 4);
        assert_eq!(report.runs[0], report.runs[1]);
        assert_eq!(report.runs[2], report.runs[3]);
        assert_eq!(source.queries(), vec!["run-1".to_string()]);
        assert_eq!(report.aggregate.run_count, 2);
    }

    #[tokio::test]
    async fn test_sample_and_live_interleave_in_request_order() {
        let source = Arc::new(
            StaticSpanSource::default()
                .with_run("run-a", vec![llm_span("run-a", 1)])
                .with_run("run-b", vec![llm_span("run-b", 2)]),
        );
        let orchestrator = orchestrator(source);
        let run_ids = ids(&["run-b", "demo-2", "run-a", "demo-1"]);

        let runs = orchestrator.compute_batch(&run_ids, Some(&data_source())).await;

        let returned: Vec<&str> = runs.iter().map(|r| r.run_id.as_str()).collect();
        assert_eq!(returned, vec!["run-b", "demo-2", "run-a", "demo-1"]);
        assert_eq!(runs[0].summary().map(|s| s.total_tokens), Some(2));
        assert_eq!(runs[2].summary().map(|s| s.total_tokens), Some(1));
    }

    #[tokio::test]
    async fn test_batch_size_is_at_least_one() {
        let source = Arc::new(RecordingSource::default());
        let orchestrator = orchestrator(source.clone()).with_batch_size(0);

        let runs = orchestrator
            .compute_batch(&ids(&["run-1", "run-2", "run-3"]), Some(&data_source()))
            .await;

        assert_eq!(runs.len(), 3);
        assert_eq!(source.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_configured_sample_prefix() {
        let config = PipelineConfig {
            batch_size: 10,
            sample_prefix: "sample/".to_string(),
        };
        let source = Arc::new(StaticSpanSource::default());
        let orchestrator = BatchOrchestrator::from_config(source.clone(), &config);

        let report = orchestrator
            .run(&ids(&["sample/1", "sample/nope", "demo-1"]), None)
            .await;

        assert_eq!(report.runs[0].summary().map(|s| s.total_tokens), Some(10_900));
        assert_eq!(
            report.runs[1].error_message(),
            Some("no sample data found for run sample/nope")
        );
        // No longer in the sample namespace
        assert_eq!(report.runs[2].error_message(), Some("data source not configured"));
        assert!(source.queries().is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let orchestrator = orchestrator(Arc::new(StaticSpanSource::default()));

        let report = orchestrator.run(&[], Some(&data_source())).await;

        assert!(report.runs.is_empty());
        assert_eq!(report.aggregate.run_count, 0);
    }

    #[tokio::test]
    async fn test_compute_run() {
        let orchestrator = orchestrator(Arc::new(StaticSpanSource::default()));

        assert!(orchestrator.compute_run("demo-2", None).await.is_success());
        assert_eq!(
            orchestrator.compute_run("run-1", None).await.error_message(),
            Some("data source not configured")
        );
    }

    #[test]
    fn test_parse_run_ids() {
        assert_eq!(parse_run_ids(&json!({ "runIds": ["a", "b"] })).unwrap(), ids(&["a", "b"]));
        assert_eq!(parse_run_ids(&json!({ "run_ids": [] })).unwrap(), Vec::<String>::new());

        let missing = parse_run_ids(&json!({})).unwrap_err();
        assert_eq!(missing.to_string(), "invalid input: runIds is required");

        let not_array = parse_run_ids(&json!({ "runIds": "demo-1" })).unwrap_err();
        assert_eq!(not_array.to_string(), "invalid input: runIds must be an array");

        let bad_entry = parse_run_ids(&json!({ "runIds": ["a", 7] })).unwrap_err();
        assert_eq!(bad_entry.to_string(), "invalid input: runIds[1] must be a string");
    }
}
