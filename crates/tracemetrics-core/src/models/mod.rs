//! Data models for TraceMetrics

mod data_source;
mod metrics;
mod span;

pub use data_source::*;
pub use metrics::*;
pub use span::*;

pub(crate) use span::millis_between;
