//! OpenSearch/Elasticsearch-compatible span source

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::SourceConfig;
use crate::error::{Error, Result};
use crate::models::{DataSourceConfig, Span, SpanKind, SpanStatus};

use super::SpanSource;

/// Longest backend error body kept in error messages
const MAX_ERROR_BODY: usize = 512;

/// Query options for [`SearchSpanSource`]
#[derive(Debug, Clone)]
pub struct SearchSourceOptions {
    /// Document field holding the run identifier
    pub run_id_field: String,
    /// Document field holding the span start time, used for sorting
    pub start_time_field: String,
    /// Maximum number of spans fetched per run
    pub max_spans: usize,
    /// Per-query timeout
    pub timeout: Duration,
}

impl Default for SearchSourceOptions {
    fn default() -> Self {
        Self::from(&SourceConfig::default())
    }
}

impl From<&SourceConfig> for SearchSourceOptions {
    fn from(config: &SourceConfig) -> Self {
        Self {
            run_id_field: config.run_id_field.clone(),
            start_time_field: config.start_time_field.clone(),
            max_spans: config.max_spans,
            timeout: config.timeout,
        }
    }
}

/// Reads spans with the `_search` API of an OpenSearch or Elasticsearch
/// cluster
pub struct SearchSpanSource {
    client: Client,
    options: SearchSourceOptions,
}

impl SearchSpanSource {
    /// Create a new search source
    pub fn new(options: SearchSourceOptions) -> Result<Self> {
        let client = Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, options })
    }

    fn search_url(data_source: &DataSourceConfig) -> String {
        format!(
            "{}/{}/_search",
            data_source.endpoint.trim_end_matches('/'),
            data_source.index_pattern.trim_matches('/')
        )
    }

    fn query(&self, run_id: &str) -> serde_json::Value {
        let mut term = serde_json::Map::new();
        term.insert(self.options.run_id_field.clone(), json!({ "value": run_id }));

        let mut sort = serde_json::Map::new();
        sort.insert(
            self.options.start_time_field.clone(),
            json!({ "order": "asc", "unmapped_type": "date" }),
        );

        json!({
            "size": self.options.max_spans,
            "track_total_hits": true,
            "query": { "term": term },
            "sort": [sort]
        })
    }
}

#[async_trait::async_trait]
impl SpanSource for SearchSpanSource {
    async fn fetch_spans(&self, run_id: &str, data_source: &DataSourceConfig) -> Result<Vec<Span>> {
        let url = Self::search_url(data_source);
        debug!(run_id, url = %url, "Querying trace backend");

        let mut request = self.client.post(&url).json(&self.query(run_id));
        if let Some(username) = &data_source.username {
            request = request.basic_auth(username, data_source.password.as_deref());
        }

        metrics::counter!("tracemetrics_span_queries_total").increment(1);
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
                body.push_str("...");
            }
            warn!(run_id, status = status.as_u16(), "Trace backend rejected query");
            return Err(Error::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: SearchResponse = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Malformed(format!("unexpected search response: {e}")))?;

        if parsed.timed_out {
            return Err(Error::Timeout(format!("backend timed out searching {}", data_source.index_pattern)));
        }

        // Metrics are computed over every span of the run or not at all
        let returned = parsed.hits.hits.len();
        if let Some(total) = parsed.hits.total.as_ref().map(TotalHits::value) {
            if total > returned as u64 {
                warn!(run_id, total, returned, "Span query hit the result limit");
                return Err(Error::Incomplete { returned, total });
            }
        }

        parsed
            .hits
            .hits
            .into_iter()
            .map(|hit| hit.source.into_span(run_id))
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    timed_out: bool,
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    #[serde(default)]
    total: Option<TotalHits>,
    #[serde(default)]
    hits: Vec<SearchHit>,
}

/// `hits.total`: a bare count on older clusters, `{"value", "relation"}` on
/// newer ones
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TotalHits {
    Count(u64),
    Tracked { value: u64 },
}

impl TotalHits {
    fn value(&self) -> u64 {
        match self {
            Self::Count(value) | Self::Tracked { value } => *value,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_source")]
    source: SpanDocument,
}

/// A span as stored in the trace index
#[derive(Debug, Deserialize)]
struct SpanDocument {
    #[serde(alias = "spanId")]
    span_id: Option<String>,
    #[serde(alias = "traceId")]
    trace_id: Option<String>,
    #[serde(alias = "parentSpanId")]
    parent_span_id: Option<String>,
    #[serde(alias = "name", alias = "operationName")]
    operation_name: Option<String>,
    #[serde(alias = "kind", alias = "spanKind")]
    span_kind: Option<String>,
    #[serde(alias = "startTime", alias = "start_time")]
    started_at: Option<DateTime<Utc>>,
    #[serde(alias = "endTime", alias = "end_time")]
    ended_at: Option<DateTime<Utc>>,
    status: Option<serde_json::Value>,
    #[serde(alias = "model", alias = "modelName")]
    model_name: Option<String>,
    #[serde(alias = "inputTokens", alias = "prompt_tokens")]
    tokens_in: Option<u64>,
    #[serde(alias = "outputTokens", alias = "completion_tokens")]
    tokens_out: Option<u64>,
    #[serde(alias = "reasoningTokens")]
    tokens_reasoning: Option<u64>,
    #[serde(alias = "costUsd", alias = "cost")]
    cost_usd: Option<f64>,
    #[serde(alias = "toolName")]
    tool_name: Option<String>,
}

impl SpanDocument {
    fn into_span(self, run_id: &str) -> Result<Span> {
        let span_id = self.span_id.unwrap_or_default();
        let Some(started_at) = self.started_at else {
            return Err(Error::Malformed(format!("span '{span_id}' has no start time")));
        };

        let kind = SpanKind::classify(
            self.span_kind.as_deref(),
            self.model_name.as_deref(),
            self.tool_name.as_deref(),
        );

        // Status is either a plain string or an OTLP-style {"code": ..} object.
        let status = match &self.status {
            Some(serde_json::Value::String(s)) => SpanStatus::parse(s),
            Some(serde_json::Value::Object(o)) => o
                .get("code")
                .and_then(serde_json::Value::as_str)
                .map_or(SpanStatus::Unset, SpanStatus::parse),
            _ => SpanStatus::Unset,
        };

        Ok(Span {
            trace_id: self.trace_id.unwrap_or_default(),
            run_id: run_id.to_string(),
            parent_span_id: self.parent_span_id,
            operation_name: self.operation_name.unwrap_or_default(),
            kind,
            started_at,
            ended_at: self.ended_at,
            status,
            model_name: self.model_name,
            tokens_in: self.tokens_in,
            tokens_out: self.tokens_out,
            tokens_reasoning: self.tokens_reasoning,
            cost_usd: self.cost_usd,
            tool_name: self.tool_name,
            span_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn source_for(server: &MockServer) -> DataSourceConfig {
        DataSourceConfig::new(server.uri(), "agent-traces")
    }

    fn search_source(timeout: Duration) -> SearchSpanSource {
        SearchSpanSource::new(SearchSourceOptions {
            timeout,
            ..SearchSourceOptions::default()
        })
        .unwrap()
    }

    fn hits(documents: serde_json::Value) -> serde_json::Value {
        let total = documents.as_array().map_or(0, Vec::len);
        json!({
            "timed_out": false,
            "hits": {
                "total": { "value": total, "relation": "eq" },
                "hits": documents
            }
        })
    }

    #[tokio::test]
    async fn test_fetch_spans() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent-traces/_search"))
            .and(header("authorization", "Basic YWRtaW46c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hits(json!([
                { "_source": {
                    "span_id": "a",
                    "name": "chat",
                    "kind": "SPAN_KIND_CLIENT",
                    "startTime": "2025-01-15T10:00:00Z",
                    "endTime": "2025-01-15T10:00:01.250Z",
                    "model": "gpt-4o",
                    "prompt_tokens": 120,
                    "completion_tokens": 30,
                    "status": { "code": "STATUS_CODE_OK" }
                } },
                { "_source": {
                    "spanId": "b",
                    "operation_name": "search",
                    "span_kind": "tool",
                    "started_at": "2025-01-15T10:00:01.300Z",
                    "toolName": "web_search",
                    "status": "error"
                } }
            ]))))
            .mount(&server)
            .await;

        let data_source = source_for(&server).with_credentials("admin", Some("secret".to_string()));
        let spans = search_source(Duration::from_secs(5))
            .fetch_spans("run-1", &data_source)
            .await
            .unwrap();

        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].kind, SpanKind::Llm);
        assert_eq!(spans[0].tokens_in, Some(120));
        assert_eq!(spans[0].duration_ms(), Some(1250.0));
        assert_eq!(spans[0].status, SpanStatus::Ok);
        assert_eq!(spans[1].kind, SpanKind::Tool);
        assert_eq!(spans[1].status, SpanStatus::Error);
        assert!(spans.iter().all(|s| s.run_id == "run-1"));
    }

    #[tokio::test]
    async fn test_empty_hits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agent-traces/_search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hits(json!([]))))
            .mount(&server)
            .await;

        let spans = search_source(Duration::from_secs(5))
            .fetch_spans("run-1", &source_for(&server))
            .await
            .unwrap();
        assert!(spans.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_result_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timed_out": false,
                "hits": {
                    "total": { "value": 25_000, "relation": "eq" },
                    "hits": [
                        { "_source": { "span_id": "a", "started_at": "2025-01-15T10:00:00Z" } }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let err = search_source(Duration::from_secs(5))
            .fetch_spans("run-1", &source_for(&server))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Incomplete { returned: 1, total: 25_000 }), "{err}");
    }

    #[tokio::test]
    async fn test_legacy_total_count() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "hits": {
                    "total": 1,
                    "hits": [
                        { "_source": { "span_id": "a", "started_at": "2025-01-15T10:00:00Z" } }
                    ]
                }
            })))
            .mount(&server)
            .await;

        let spans = search_source(Duration::from_secs(5))
            .fetch_spans("run-1", &source_for(&server))
            .await
            .unwrap();
        assert_eq!(spans.len(), 1);
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let err = search_source(Duration::from_secs(5))
            .fetch_spans("run-1", &source_for(&server))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>proxy error</html>"))
            .mount(&server)
            .await;

        let err = search_source(Duration::from_secs(5))
            .fetch_spans("run-1", &source_for(&server))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Malformed(_)), "{err}");
    }

    #[tokio::test]
    async fn test_document_without_start_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(hits(json!([
                { "_source": { "span_id": "x", "name": "chat" } }
            ]))))
            .mount(&server)
            .await;

        let err = search_source(Duration::from_secs(5))
            .fetch_spans("run-1", &source_for(&server))
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "malformed span data: span 'x' has no start time");
    }

    #[tokio::test]
    async fn test_client_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(hits(json!([])))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let err = search_source(Duration::from_millis(50))
            .fetch_spans("run-1", &source_for(&server))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout(_)), "{err}");
    }

    #[tokio::test]
    async fn test_backend_reported_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "timed_out": true,
                "hits": { "hits": [] }
            })))
            .mount(&server)
            .await;

        let err = search_source(Duration::from_secs(5))
            .fetch_spans("run-1", &source_for(&server))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout(_)));
    }

    #[tokio::test]
    async fn test_unreachable_backend() {
        let data_source = DataSourceConfig::new("http://127.0.0.1:1", "agent-traces");

        let err = search_source(Duration::from_secs(5))
            .fetch_spans("run-1", &data_source)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Unreachable(_)), "{err}");
    }

    #[test]
    fn test_query_targets_run_field() {
        let query = search_source(Duration::from_secs(1)).query("run-9");

        assert_eq!(query["query"]["term"]["run_id"]["value"], "run-9");
        assert_eq!(query["size"], 10_000);
        assert_eq!(query["track_total_hits"], true);
        assert_eq!(query["sort"][0]["started_at"]["order"], "asc");
    }

    #[test]
    fn test_query_sorts_on_configured_start_field() {
        let source = SearchSpanSource::new(SearchSourceOptions {
            start_time_field: "startTime".to_string(),
            ..SearchSourceOptions::default()
        })
        .unwrap();

        let query = source.query("run-9");

        assert_eq!(query["sort"][0]["startTime"]["unmapped_type"], "date");
        assert!(query["sort"][0].get("started_at").is_none());
    }

    #[test]
    fn test_search_url() {
        let data_source = DataSourceConfig::new("http://search:9200/", "/traces-*");
        assert_eq!(SearchSpanSource::search_url(&data_source), "http://search:9200/traces-*/_search");
    }
}
