//! Offline sample runs
//!
//! Fixed spans for a handful of named fixtures so the pipeline can be shown
//! without a trace backend. A fixture is addressed by the run identifier
//! minus the sample prefix, so `demo-1` reads fixture `1`. Timestamps are
//! fixed, so results are identical on every call.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;

use crate::models::{Span, SpanKind, SpanStatus};

/// Prefix marking sample run identifiers unless configured otherwise
pub const DEFAULT_SAMPLE_PREFIX: &str = "demo-";

/// 2025-01-15T10:00:00Z
const SAMPLE_EPOCH_MS: i64 = 1_736_935_200_000;

static SAMPLE_RUNS: Lazy<HashMap<&'static str, Vec<Span>>> = Lazy::new(|| {
    HashMap::from([
        ("1", research_agent_run()),
        ("2", calculator_agent_run()),
        ("3", local_model_run()),
        ("empty", Vec::new()),
    ])
});

/// Spans of the fixture called `name`, or `None` if there is none
pub fn sample_spans(name: &str) -> Option<&'static [Span]> {
    SAMPLE_RUNS.get(name).map(Vec::as_slice)
}

/// Names of all fixtures, sorted
pub fn sample_names() -> Vec<&'static str> {
    let mut ids: Vec<_> = SAMPLE_RUNS.keys().copied().collect();
    ids.sort_unstable();
    ids
}

fn at(offset_ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(SAMPLE_EPOCH_MS).unwrap_or_default() + Duration::milliseconds(offset_ms)
}

fn span(run_id: &str, id: &str, name: &str, kind: SpanKind, start_ms: i64, end_ms: i64) -> Span {
    Span::new(run_id, id, name, kind, at(start_ms), Some(at(end_ms)))
}

// Plans, searches, reads, and answers with a hosted model.
fn research_agent_run() -> Vec<Span> {
    const RUN: &str = "demo-1";
    const MODEL: &str = "claude-3-5-sonnet-20241022";

    vec![
        span(RUN, "d1-root", "agent.run", SpanKind::Other, 0, 12_500),
        span(RUN, "d1-plan", "plan", SpanKind::Llm, 100, 2_100)
            .with_parent("d1-root")
            .with_usage(MODEL, 1_200, 300),
        span(RUN, "d1-search", "web_search", SpanKind::Tool, 2_200, 3_700)
            .with_parent("d1-root")
            .with_tool("web_search"),
        span(RUN, "d1-synth", "synthesize", SpanKind::Llm, 3_800, 7_800)
            .with_parent("d1-root")
            .with_usage(MODEL, 3_400, 800),
        span(RUN, "d1-read", "read_file", SpanKind::Tool, 7_900, 8_400)
            .with_parent("d1-root")
            .with_tool("read_file"),
        span(RUN, "d1-answer", "answer", SpanKind::Llm, 8_500, 12_400)
            .with_parent("d1-root")
            .with_usage(MODEL, 4_100, 1_100),
    ]
}

fn calculator_agent_run() -> Vec<Span> {
    const RUN: &str = "demo-2";
    const MODEL: &str = "gpt-4o-mini";

    vec![
        span(RUN, "d2-root", "agent.run", SpanKind::Other, 0, 4_000),
        span(RUN, "d2-think", "chat", SpanKind::Llm, 50, 1_500)
            .with_parent("d2-root")
            .with_usage(MODEL, 2_000, 500),
        span(RUN, "d2-calc", "calculator", SpanKind::Tool, 1_600, 1_700)
            .with_parent("d2-root")
            .with_tool("calculator"),
        span(RUN, "d2-reply", "chat", SpanKind::Llm, 1_800, 3_900)
            .with_parent("d2-root")
            .with_usage(MODEL, 2_600, 400),
    ]
}

// Self-hosted model without pricing, and a failing tool call.
fn local_model_run() -> Vec<Span> {
    const RUN: &str = "demo-3";
    const MODEL: &str = "local-llama-3-8b";

    let mut failed_fetch = span(RUN, "d3-fetch", "http_get", SpanKind::Tool, 900, 1_400)
        .with_parent("d3-root")
        .with_tool("http_get");
    failed_fetch.status = SpanStatus::Error;

    vec![
        span(RUN, "d3-root", "agent.run", SpanKind::Other, 0, 2_600),
        span(RUN, "d3-chat", "chat", SpanKind::Llm, 10, 800)
            .with_parent("d3-root")
            .with_usage(MODEL, 900, 300),
        failed_fetch,
        span(RUN, "d3-retry", "http_get", SpanKind::Tool, 1_450, 1_700)
            .with_parent("d3-root")
            .with_tool("http_get"),
        span(RUN, "d3-final", "chat", SpanKind::Llm, 1_750, 2_550)
            .with_parent("d3-root")
            .with_usage(MODEL, 700, 200),
    ]
}
