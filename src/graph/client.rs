//! LightRAG REST client.
//!
//! Thin façade over the remote knowledge-graph/RAG backend: document ingest,
//! track polling, workspace hygiene, graph fetch, and summary queries.
//! Every method issues one logical operation and surfaces any failure as
//! [`GraphServiceError`]; individual HTTP calls retry once more on transport
//! errors and bad status codes with a bounded random backoff.

use super::config::GraphConfig;
use super::error::GraphServiceError;
use super::traits::{GraphBackend, TrackDocument};
use async_trait::async_trait;
use rand::RngExt;
use reqwest::Method;
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

/// Attempts per individual HTTP call (first try + one retry).
const REQUEST_ATTEMPTS: u32 = 2;

/// Track statuses that still mean "the pipeline is working".
const PROCESSING_STATES: [&str; 5] = ["PENDING", "QUEUED", "PREPROCESSING", "PROCESSING", "RUNNING"];

/// Terminal-success document statuses.
const COMPLETED_STATES: [&str; 2] = ["PROCESSED", "PREPROCESSED"];

/// Terminal-failure document statuses.
const FAILURE_STATES: [&str; 2] = ["FAILED", "ERROR"];

/// Endpoints polled in a loop — logged at debug to keep the log readable.
const NOISY_PATHS: [&str; 2] = ["/documents/track_status", "/documents/status_counts"];

/// Client for the LightRAG REST API.
pub struct RemoteGraphClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    poll_interval: Duration,
    workspace_timeout: Duration,
    track_timeout: Duration,
    graph_max_depth: u32,
    graph_max_nodes: u32,
    clear_attempts: u32,
}

impl RemoteGraphClient {
    /// Build a client from typed configuration.
    ///
    /// Fails with `NotConfigured` when no base URL is present. The backend
    /// commonly sits behind a corporate proxy with a self-signed certificate,
    /// so the proxy is applied here and TLS verification is disabled.
    pub fn new(config: &GraphConfig) -> Result<Self, GraphServiceError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or(GraphServiceError::NotConfigured)?
            .trim_end_matches('/')
            .to_string();

        let mut builder = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .danger_accept_invalid_certs(true);

        if config.proxy_enabled {
            if let Some(proxy_url) = config.proxy_url.as_deref() {
                let proxy = reqwest::Proxy::all(proxy_url).map_err(|e| {
                    GraphServiceError::Request {
                        method: "PROXY".into(),
                        path: proxy_url.to_string(),
                        message: e.to_string(),
                    }
                })?;
                builder = builder.proxy(proxy);
            }
        }

        let http = builder.build().map_err(|e| GraphServiceError::Request {
            method: "INIT".into(),
            path: base_url.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            http,
            base_url,
            api_key: config.api_key.clone(),
            poll_interval: config.poll_interval,
            workspace_timeout: config.workspace_timeout,
            track_timeout: config.track_timeout,
            graph_max_depth: config.graph_max_depth,
            graph_max_nodes: config.graph_max_nodes,
            clear_attempts: config.max_retry_attempts.max(1),
        })
    }

    /// Wait until the workspace is idle and empty.
    ///
    /// While any document is still in a processing state, keep waiting. When
    /// only terminal leftovers remain (PROCESSED/FAILED debris from an
    /// earlier run), trigger a clear at most once per poll interval. Only a
    /// status-count sum of zero returns success; everything else times out
    /// after `workspace_timeout`.
    pub async fn ensure_workspace_empty(&self) -> Result<(), GraphServiceError> {
        let start = Instant::now();
        let clear_interval = self.poll_interval.max(Duration::from_secs(1));
        let mut last_clear: Option<Instant> = None;

        loop {
            let counts = self.get_status_counts().await?;
            let total: u64 = counts.values().sum();
            if total == 0 {
                return Ok(());
            }

            let processing: u64 = counts
                .iter()
                .filter(|(state, _)| {
                    PROCESSING_STATES.contains(&state.to_uppercase().as_str())
                })
                .map(|(_, count)| *count)
                .sum();

            if processing == 0
                && last_clear.map_or(true, |at| at.elapsed() >= clear_interval)
            {
                tracing::info!(
                    "[LightRAG] Workspace has only terminal documents, trying to clear before next graph job: {:?}",
                    counts
                );
                self.clear_documents().await;
                last_clear = Some(Instant::now());
            }

            if start.elapsed() > self.workspace_timeout {
                return Err(GraphServiceError::Timeout {
                    operation: "workspace idle wait".into(),
                    seconds: self.workspace_timeout.as_secs(),
                    detail: format!("status_counts={:?}", counts),
                });
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Current document counts per status. Missing or non-numeric values
    /// coerce to 0, never fail.
    pub async fn get_status_counts(&self) -> Result<HashMap<String, u64>, GraphServiceError> {
        let path = "/documents/status_counts";
        let body = self.request(Method::GET, path, Vec::new(), None).await?;
        let data = safe_json(path, &body)?;

        let raw = data
            .get("status_counts")
            .or_else(|| data.get("data"))
            .unwrap_or(&data);

        let mut counts = HashMap::new();
        if let Some(map) = raw.as_object() {
            for (key, value) in map {
                counts.insert(key.clone(), coerce_count(value));
            }
        }
        Ok(counts)
    }

    /// Submit a text document for ingestion. Returns the track id.
    pub async fn insert_text(
        &self,
        text: &str,
        file_source: Option<&str>,
    ) -> Result<String, GraphServiceError> {
        let path = "/documents/text";
        let mut body = json!({ "text": text });
        if let Some(source) = file_source {
            body["file_source"] = json!(source);
        }

        let response = self
            .request(Method::POST, path, Vec::new(), Some(&body))
            .await?;
        let data = safe_json(path, &response)?;

        data.get("track_id")
            .and_then(Value::as_str)
            .or_else(|| data.pointer("/data/track_id").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| GraphServiceError::InvalidResponse {
                path: path.into(),
                message: "insert_text response missing track_id".into(),
            })
    }

    /// Poll track status until all documents are processed.
    pub async fn wait_for_track_completion(
        &self,
        track_id: &str,
    ) -> Result<Vec<TrackDocument>, GraphServiceError> {
        let start = Instant::now();
        let path = format!("/documents/track_status/{}", track_id);
        let mut latest_documents: Vec<TrackDocument> = Vec::new();

        loop {
            let body = self.request(Method::GET, &path, Vec::new(), None).await?;
            let data = safe_json(&path, &body)?;

            let documents = data
                .get("documents")
                .or_else(|| data.pointer("/data/documents"))
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            if !documents.is_empty() {
                latest_documents = documents
                    .into_iter()
                    .map(|doc| serde_json::from_value(doc).unwrap_or_default())
                    .collect();

                let statuses: HashSet<String> = latest_documents
                    .iter()
                    .filter_map(|doc| doc.status.as_deref())
                    .filter(|status| !status.is_empty())
                    .map(str::to_uppercase)
                    .collect();

                if !statuses.is_empty()
                    && statuses
                        .iter()
                        .all(|status| COMPLETED_STATES.contains(&status.as_str()))
                {
                    return Ok(latest_documents);
                }
                if statuses
                    .iter()
                    .any(|status| FAILURE_STATES.contains(&status.as_str()))
                {
                    return Err(GraphServiceError::DocumentsFailed {
                        track_id: track_id.to_string(),
                        statuses: statuses.into_iter().collect(),
                    });
                }
            }

            if start.elapsed() > self.track_timeout {
                return Err(GraphServiceError::Timeout {
                    operation: format!("track {} completion wait", track_id),
                    seconds: self.track_timeout.as_secs(),
                    detail: format!("documents={}", latest_documents.len()),
                });
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Fetch the knowledge graph, resolving label priority and folding over
    /// the candidates: wildcard first, then labels the server reports for the
    /// document, then the caller-supplied candidates. Returns the first
    /// successful fetch; when every candidate fails, the error carries the
    /// tried labels and the last failure as its source.
    pub async fn fetch_graph_data(
        &self,
        doc_id: Option<&str>,
        label_candidates: &[String],
    ) -> Result<Value, GraphServiceError> {
        let mut labels = self.resolve_graph_labels(doc_id).await;
        labels.extend(label_candidates.iter().cloned());

        let mut tried = Vec::new();
        let mut last_error: Option<GraphServiceError> = None;

        for label in labels.into_iter().filter(|label| !label.is_empty()) {
            tracing::info!(
                "[LightRAG] Fetching graph with label='{}' doc_id='{}'",
                label,
                doc_id.unwrap_or("")
            );
            match self.fetch_graph_by_label(&label, doc_id).await {
                Ok(graph) => return Ok(graph),
                Err(err) => {
                    tracing::warn!("[LightRAG] Graph fetch failed for label '{}': {}", label, err);
                    tried.push(label);
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => Err(GraphServiceError::LabelsExhausted {
                tried,
                source: Box::new(err),
            }),
            None => Err(GraphServiceError::NoLabels),
        }
    }

    /// Labels the server knows for a document, preceded by the wildcard.
    /// A failed label listing is logged and degrades to wildcard-only.
    async fn resolve_graph_labels(&self, doc_id: Option<&str>) -> Vec<String> {
        let mut labels = vec!["*".to_string()];
        let Some(doc_id) = doc_id else {
            return labels;
        };

        let path = "/graph/label/list";
        let params = vec![("doc_id".to_string(), doc_id.to_string())];
        match self.request(Method::GET, path, params, None).await {
            Ok(body) => match safe_json(path, &body) {
                Ok(Value::Array(items)) => {
                    labels.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                }
                Ok(data) => {
                    if let Some(items) = data.get("labels").and_then(Value::as_array) {
                        labels.extend(items.iter().filter_map(Value::as_str).map(str::to_string));
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "[LightRAG] Failed to list labels for doc_id={}: {}",
                        doc_id,
                        err
                    );
                }
            },
            Err(err) => {
                tracing::warn!(
                    "[LightRAG] Failed to list labels for doc_id={}: {}",
                    doc_id,
                    err
                );
            }
        }

        labels.retain(|label| !label.is_empty());
        labels
    }

    async fn fetch_graph_by_label(
        &self,
        label: &str,
        doc_id: Option<&str>,
    ) -> Result<Value, GraphServiceError> {
        let path = "/graphs";
        let mut params = vec![
            ("label".to_string(), label.to_string()),
            ("max_depth".to_string(), self.graph_max_depth.to_string()),
            ("max_nodes".to_string(), self.graph_max_nodes.to_string()),
        ];
        if let Some(doc_id) = doc_id {
            params.push(("doc_id".to_string(), doc_id.to_string()));
        }

        let body = self.request(Method::GET, path, params, None).await?;
        let data = safe_json(path, &body)?;
        match data.get("graph") {
            Some(graph) if graph.is_object() => Ok(graph.clone()),
            _ => Ok(data),
        }
    }

    /// Run a natural-language query over the ingested context.
    pub async fn query_summary(
        &self,
        summary_prompt: &str,
    ) -> Result<Option<String>, GraphServiceError> {
        let path = "/query";
        let body = json!({
            "query": summary_prompt,
            "mode": "mix",
            "include_references": false,
            "response_type": "Multiple Paragraphs",
            "top_k": 40,
            "chunk_top_k": 20,
            "max_entity_tokens": 6000,
            "max_relation_tokens": 8000,
            "enable_rerank": true,
            "max_total_tokens": 30000,
        });

        let response = self
            .request(Method::POST, path, Vec::new(), Some(&body))
            .await?;
        let data = safe_json(path, &response)?;

        Ok(data
            .get("response")
            .and_then(Value::as_str)
            .or_else(|| data.get("data").and_then(Value::as_str))
            .map(str::to_string))
    }

    /// Delete every document in the workspace.
    ///
    /// Tolerates a `{"status": "busy"}` business response by retrying up to
    /// the configured attempt budget with a fixed delay. Exhaustion logs a
    /// warning and returns — leftover documents are recoverable by the next
    /// `ensure_workspace_empty` call, so cleanup never fails the caller.
    pub async fn clear_documents(&self) {
        let attempts = self.clear_attempts;
        let delay = self.poll_interval.max(Duration::from_secs(1));
        let mut last_error: Option<GraphServiceError> = None;

        for attempt in 1..=attempts {
            match self.request(Method::DELETE, "/documents", Vec::new(), None).await {
                Ok(body) => {
                    let data = match safe_json("/documents", &body) {
                        Ok(data) => data,
                        Err(_) => {
                            tracing::info!("[LightRAG] Cleared workspace with non-JSON response");
                            return;
                        }
                    };

                    let status = data
                        .get("status")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_lowercase();

                    if status == "busy" {
                        tracing::warn!(
                            "[LightRAG] Workspace busy on DELETE /documents (attempt {}/{}): {}",
                            attempt,
                            attempts,
                            data
                        );
                        last_error = Some(GraphServiceError::WorkspaceBusy(data.to_string()));
                        if attempt < attempts {
                            tokio::time::sleep(delay).await;
                            continue;
                        }
                    } else {
                        tracing::info!(
                            "[LightRAG] Cleared workspace successfully on attempt {}/{}: {}",
                            attempt,
                            attempts,
                            data
                        );
                        return;
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "[LightRAG] Failed to clear workspace on attempt {}/{}: {}",
                        attempt,
                        attempts,
                        err
                    );
                    last_error = Some(err);
                    if attempt < attempts {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                }
            }
        }

        if let Some(err) = last_error {
            tracing::warn!(
                "Failed to clear LightRAG workspace after {} attempts: {}",
                attempts,
                err
            );
        }
    }

    /// Issue one logical HTTP call with bounded retry.
    ///
    /// Transport errors and non-2xx statuses both count as retryable; after
    /// the attempt budget the last failure surfaces as `GraphServiceError`.
    async fn request(
        &self,
        method: Method,
        path: &str,
        mut params: Vec<(String, String)>,
        body: Option<&Value>,
    ) -> Result<String, GraphServiceError> {
        let url = format!("{}{}", self.base_url, path);
        if let Some(api_key) = &self.api_key {
            if !params.iter().any(|(key, _)| key == "api_key_header_value") {
                params.push(("api_key_header_value".to_string(), api_key.clone()));
            }
        }

        let mut last_error = GraphServiceError::Request {
            method: method.to_string(),
            path: path.to_string(),
            message: "request not attempted".into(),
        };

        for attempt in 1..=REQUEST_ATTEMPTS {
            let mut builder = self.http.request(method.clone(), &url).query(&params);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.unwrap_or_default();
                    if status.as_u16() < 400 {
                        log_response(&method, path, status.as_u16(), &text);
                        return Ok(text);
                    }
                    last_error = GraphServiceError::Request {
                        method: method.to_string(),
                        path: path.to_string(),
                        message: format!("status {}: {}", status.as_u16(), truncate(&text)),
                    };
                }
                Err(err) => {
                    last_error = GraphServiceError::Request {
                        method: method.to_string(),
                        path: path.to_string(),
                        message: err.to_string(),
                    };
                }
            }

            if attempt < REQUEST_ATTEMPTS {
                // Bounded random backoff between attempts
                let wait = rand::rng().random_range(1.0_f64..=3.0);
                tokio::time::sleep(Duration::from_secs_f64(wait)).await;
            }
        }

        Err(last_error)
    }
}

#[async_trait]
impl GraphBackend for RemoteGraphClient {
    async fn ensure_workspace_empty(&self) -> Result<(), GraphServiceError> {
        RemoteGraphClient::ensure_workspace_empty(self).await
    }

    async fn insert_text(
        &self,
        text: &str,
        file_source: Option<&str>,
    ) -> Result<String, GraphServiceError> {
        RemoteGraphClient::insert_text(self, text, file_source).await
    }

    async fn wait_for_track_completion(
        &self,
        track_id: &str,
    ) -> Result<Vec<TrackDocument>, GraphServiceError> {
        RemoteGraphClient::wait_for_track_completion(self, track_id).await
    }

    async fn fetch_graph_data(
        &self,
        doc_id: Option<&str>,
        label_candidates: &[String],
    ) -> Result<Value, GraphServiceError> {
        RemoteGraphClient::fetch_graph_data(self, doc_id, label_candidates).await
    }

    async fn query_summary(&self, prompt: &str) -> Result<Option<String>, GraphServiceError> {
        RemoteGraphClient::query_summary(self, prompt).await
    }

    async fn clear_documents(&self) {
        RemoteGraphClient::clear_documents(self).await
    }
}

/// Parse a response body as JSON or fail with `InvalidResponse`.
fn safe_json(path: &str, body: &str) -> Result<Value, GraphServiceError> {
    serde_json::from_str(body).map_err(|err| GraphServiceError::InvalidResponse {
        path: path.to_string(),
        message: format!("invalid JSON: {}", err),
    })
}

/// Coerce a JSON value into a document count; anything non-numeric is 0.
fn coerce_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.parse().unwrap_or(0),
        _ => 0,
    }
}

fn truncate(body: &str) -> String {
    if body.chars().count() > 800 {
        let head: String = body.chars().take(800).collect();
        format!("{}...", head)
    } else {
        body.to_string()
    }
}

fn log_response(method: &Method, path: &str, status: u16, body: &str) {
    let safe_body = if body.is_empty() {
        "<empty-body>".to_string()
    } else {
        truncate(body)
    };
    if NOISY_PATHS.iter().any(|noisy| path.starts_with(noisy)) {
        tracing::debug!("[LightRAG] {} {} -> {} {}", method, path, status, safe_body);
    } else {
        tracing::info!("[LightRAG] {} {} -> {} {}", method, path, status, safe_body);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_requires_base_url() {
        let result = RemoteGraphClient::new(&GraphConfig::default());
        assert!(matches!(result, Err(GraphServiceError::NotConfigured)));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = GraphConfig {
            base_url: Some("http://lightrag:9621/".into()),
            ..Default::default()
        };
        let client = RemoteGraphClient::new(&config).unwrap();
        assert_eq!(client.base_url, "http://lightrag:9621");
    }

    #[test]
    fn test_coerce_count() {
        assert_eq!(coerce_count(&json!(3)), 3);
        assert_eq!(coerce_count(&json!("7")), 7);
        assert_eq!(coerce_count(&json!("not-a-number")), 0);
        assert_eq!(coerce_count(&json!(null)), 0);
        assert_eq!(coerce_count(&json!(-2)), 0);
    }

    #[test]
    fn test_truncate_long_body() {
        let body = "x".repeat(1200);
        let truncated = truncate(&body);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 803);
    }
}
