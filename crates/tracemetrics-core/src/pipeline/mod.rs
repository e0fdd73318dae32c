//! Trace-to-metrics pipeline
//!
//! Spans of a run are reduced into a [`RunMetrics`](crate::models::RunMetrics)
//! record by the [`MetricsComputer`]; the [`BatchOrchestrator`] fans that out
//! over many runs and [`compute_aggregate_metrics`] rolls the successful ones
//! up.

mod aggregate;
mod batch;
mod computer;
mod cost;
mod sample;

pub use aggregate::compute_aggregate_metrics;
pub use batch::{parse_run_ids, BatchOrchestrator, DEFAULT_BATCH_SIZE};
pub use computer::MetricsComputer;
pub use cost::{CostCalculator, ModelPricing};
pub use sample::{sample_names, sample_spans, DEFAULT_SAMPLE_PREFIX};
