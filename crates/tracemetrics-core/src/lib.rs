//! # TraceMetrics
//!
//! Per-run metrics for AI agent executions, derived from trace spans.
//!
//! Each run is summarized from the spans recorded for it (token usage, cost,
//! wall-clock duration, LLM and tool call counts), and batches of runs are
//! rolled up into an aggregate.
//!
//! ## Architecture
//!
//! - **Source**: fetches the spans of a run from a trace search backend
//! - **Pipeline**: reduces spans into per-run metrics, runs batches and aggregates
//! - **API**: REST API over the pipeline
//!
//! ## Quick Start
//!
//! ```bash
//! # Start the API server
//! tracemetrics serve
//!
//! # Compute metrics for the bundled sample runs
//! tracemetrics metrics demo-1 demo-2
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod source;

pub use config::Config;
pub use error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::pipeline::{compute_aggregate_metrics, BatchOrchestrator, MetricsComputer};
    pub use crate::source::{SearchSpanSource, SpanSource};
}
