//! Span data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanStatus {
    /// Operation completed successfully
    #[default]
    Ok,
    /// Operation failed
    Error,
    /// Status not set
    Unset,
}

impl SpanStatus {
    /// Parse a backend status string, treating anything unknown as unset
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "ok" | "success" | "status_code_ok" => Self::Ok,
            "error" | "status_code_error" => Self::Error,
            _ => Self::Unset,
        }
    }
}

/// What a span represents within an agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanKind {
    /// A call to a language model
    Llm,
    /// A tool invocation
    Tool,
    /// Anything else (agent steps, chains, retrievers...)
    #[default]
    Other,
}

impl SpanKind {
    /// Classify a span.
    ///
    /// A recognised kind label recorded by the instrumentation wins.
    /// Otherwise a span naming a model is an LLM call and a span naming a
    /// tool is a tool call. Transport-level labels such as
    /// `SPAN_KIND_CLIENT` say nothing about the agent and are ignored.
    pub fn classify(label: Option<&str>, model_name: Option<&str>, tool_name: Option<&str>) -> Self {
        if let Some(label) = label {
            match label.trim().to_ascii_lowercase().as_str() {
                "llm" | "chat" | "completion" | "generation" | "text_completion" => return Self::Llm,
                "tool" | "execute_tool" | "function" => return Self::Tool,
                "agent" | "chain" | "workflow" | "task" | "retriever" | "embedding" | "reranker"
                | "guardrail" | "evaluator" => return Self::Other,
                _ => {}
            }
        }

        if model_name.is_some() {
            Self::Llm
        } else if tool_name.is_some() {
            Self::Tool
        } else {
            Self::Other
        }
    }
}

/// A span represents a single operation within an agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Span ID
    pub span_id: String,

    /// Trace ID this span belongs to
    pub trace_id: String,

    /// Run this span was recorded for
    pub run_id: String,

    /// Parent span ID (if any)
    pub parent_span_id: Option<String>,

    /// Name of the operation
    pub operation_name: String,

    /// Classification of the span
    pub kind: SpanKind,

    /// When the operation started
    pub started_at: DateTime<Utc>,

    /// When the operation ended (if completed)
    pub ended_at: Option<DateTime<Utc>>,

    /// Status of the operation
    pub status: SpanStatus,

    // AI-specific fields
    /// Model name (e.g., "gpt-4o", "claude-3-5-sonnet")
    pub model_name: Option<String>,

    /// Input tokens
    pub tokens_in: Option<u64>,

    /// Output tokens
    pub tokens_out: Option<u64>,

    /// Reasoning tokens (for o1-style models)
    pub tokens_reasoning: Option<u64>,

    /// Cost in USD, when recorded by the instrumentation
    pub cost_usd: Option<f64>,

    /// Tool name if this span represents a tool call
    pub tool_name: Option<String>,
}

impl Span {
    /// Create a span of the given kind; optional fields start empty
    pub fn new(
        run_id: impl Into<String>,
        span_id: impl Into<String>,
        operation_name: impl Into<String>,
        kind: SpanKind,
        started_at: DateTime<Utc>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Self {
        let run_id = run_id.into();
        Self {
            span_id: span_id.into(),
            trace_id: run_id.clone(),
            run_id,
            parent_span_id: None,
            operation_name: operation_name.into(),
            kind,
            started_at,
            ended_at,
            status: SpanStatus::Ok,
            model_name: None,
            tokens_in: None,
            tokens_out: None,
            tokens_reasoning: None,
            cost_usd: None,
            tool_name: None,
        }
    }

    /// Attach model usage to the span
    pub fn with_usage(mut self, model: impl Into<String>, tokens_in: u64, tokens_out: u64) -> Self {
        self.model_name = Some(model.into());
        self.tokens_in = Some(tokens_in);
        self.tokens_out = Some(tokens_out);
        self
    }

    /// Attach a tool name to the span
    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tool_name = Some(tool.into());
        self
    }

    /// Set the parent span
    pub fn with_parent(mut self, parent_span_id: impl Into<String>) -> Self {
        self.parent_span_id = Some(parent_span_id.into());
        self
    }

    /// Duration in milliseconds, if the span has ended
    pub fn duration_ms(&self) -> Option<f64> {
        self.ended_at.map(|ended_at| millis_between(self.started_at, ended_at))
    }

    /// End of the span; an open span ends where it started
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.ended_at.unwrap_or(self.started_at)
    }

    /// Check if this span represents an LLM call
    pub fn is_llm_call(&self) -> bool {
        self.kind == SpanKind::Llm
    }

    /// Check if this span represents a tool call
    pub fn is_tool_call(&self) -> bool {
        self.kind == SpanKind::Tool
    }

    /// Get total tokens used
    pub fn total_tokens(&self) -> u64 {
        self.tokens_in
            .unwrap_or(0)
            .saturating_add(self.tokens_out.unwrap_or(0))
            .saturating_add(self.tokens_reasoning.unwrap_or(0))
    }
}

/// Milliseconds from `start` to `end` with sub-millisecond precision
pub(crate) fn millis_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1000.0,
        None => delta.num_milliseconds() as f64,
    }
}
