//! Graph bundle orchestration.
//!
//! Produces a `(graph_data, graph_summary)` pair for one incident by driving
//! the remote backend through the full ingest → wait → fetch → summarize →
//! cleanup sequence, with bounded attempt-level retries.
//!
//! The remote workspace is a shared, single-tenant resource: two concurrent
//! jobs would corrupt each other's documents, and debris from a previous job
//! must never leak into the next job's graph fetch. A process-wide build
//! mutex plus mandatory pre/post cleanup enforce both.

use super::config::GraphConfig;
use super::error::GraphServiceError;
use super::prompts::{load_prompt_template, DEFAULT_SUMMARY_PROMPT};
use super::traits::GraphBackend;
use crate::incident::models::{stringify_value, Alert, Incident};
use serde_json::Value;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Alerts beyond this many are left out of the ingest payload.
const MAX_ALERTS: usize = 10;

/// Fallback graph labels appended after incident/alert-derived candidates.
const FALLBACK_LABELS: [&str; 3] = ["incident", "event", "alert"];

/// Orchestrates the LightRAG workflow for incident graphs.
pub struct GraphBundleOrchestrator {
    backend: Arc<dyn GraphBackend>,
    /// One graph build globally, at a time.
    build_lock: Mutex<()>,
    max_attempts: u32,
    retry_delay: Duration,
    prompt_override: Option<String>,
    prompts_path: PathBuf,
    proxy_enabled: bool,
}

impl GraphBundleOrchestrator {
    pub fn new(backend: Arc<dyn GraphBackend>, config: &GraphConfig) -> Self {
        Self {
            backend,
            build_lock: Mutex::new(()),
            max_attempts: config.max_retry_attempts.max(1),
            retry_delay: config.poll_interval,
            prompt_override: config.prompt.clone(),
            prompts_path: config.prompts_path.clone(),
            proxy_enabled: config.proxy_enabled,
        }
    }

    /// Generate the graph bundle for one incident.
    ///
    /// Fails with the last attempt's error once the attempt budget is spent.
    /// The workspace is cleared after a success and after any attempt that
    /// managed to insert a document, so a failed run cannot poison the next.
    pub async fn generate_graph_bundle(
        &self,
        incident: &Incident,
        alerts: &[Alert],
    ) -> Result<(Value, Option<String>), GraphServiceError> {
        let _guard = self.build_lock.lock().await;

        let payload_text = build_insert_payload(incident, alerts);
        let label_candidates = build_graph_label_candidates(incident, alerts);
        let file_source = build_file_source(incident);
        let summary_prompt = self.build_summary_prompt(incident, &payload_text);

        let mut attempt = 1;
        loop {
            let mut has_documents = false;
            match self
                .run_attempt(
                    &payload_text,
                    &label_candidates,
                    &file_source,
                    &summary_prompt,
                    &mut has_documents,
                )
                .await
            {
                Ok((graph_data, graph_summary)) => {
                    tracing::info!(
                        "[EventGraph] Generated graph for incident {} (nodes={}, edges={})",
                        incident.id,
                        json_len(&graph_data, "nodes"),
                        json_len(&graph_data, "edges"),
                    );
                    self.backend.clear_documents().await;
                    return Ok((graph_data, graph_summary));
                }
                Err(err) => {
                    tracing::warn!(
                        "[EventGraph] Attempt {}/{} failed for incident {}: {}",
                        attempt,
                        self.max_attempts,
                        incident.id,
                        err
                    );
                    if has_documents {
                        self.backend.clear_documents().await;
                    }
                    if attempt >= self.max_attempts {
                        return Err(err);
                    }
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        payload_text: &str,
        label_candidates: &[String],
        file_source: &str,
        summary_prompt: &str,
        has_documents: &mut bool,
    ) -> Result<(Value, Option<String>), GraphServiceError> {
        self.backend.ensure_workspace_empty().await?;

        let track_id = self
            .backend
            .insert_text(payload_text, Some(file_source))
            .await?;
        *has_documents = true;

        let documents = self.backend.wait_for_track_completion(&track_id).await?;
        let doc_id = documents.first().and_then(|doc| doc.id.clone());

        let graph_data = self
            .backend
            .fetch_graph_data(doc_id.as_deref(), label_candidates)
            .await?;
        let graph_summary = self.backend.query_summary(summary_prompt).await?;

        Ok((graph_data, graph_summary))
    }

    /// Resolve the summary prompt: site template file → configured override →
    /// hardcoded default, then append the incident-context header.
    fn build_summary_prompt(&self, incident: &Incident, incident_context: &str) -> String {
        let template = load_prompt_template(&self.prompts_path, self.proxy_enabled)
            .or_else(|| self.prompt_override.clone())
            .unwrap_or_else(|| DEFAULT_SUMMARY_PROMPT.to_string());
        let prompt = template.trim().to_string();

        if incident_context.trim().is_empty() {
            return prompt;
        }
        let incident_id = if incident.id.is_empty() {
            "-"
        } else {
            incident.id.as_str()
        };
        format!("{}\n\nIncident Context (ID={}):\n", prompt, incident_id)
    }
}

/// Combine incident and alert context into a single text payload for ingest.
fn build_insert_payload(incident: &Incident, alerts: &[Alert]) -> String {
    let mut parts: Vec<String> = Vec::new();

    let description = incident
        .description
        .as_ref()
        .map(stringify_value)
        .unwrap_or_default();
    let labels_text = incident
        .labels
        .as_ref()
        .map(|labels| labels.display())
        .unwrap_or_else(|| "-".to_string());

    parts.push(format!("Incident ID: {}", incident.id));
    parts.push(format!("Incident Title: {}", incident.display_title()));
    parts.push(format!(
        "Incident Severity: {}",
        incident.severity.as_deref().unwrap_or("-")
    ));
    parts.push(format!(
        "Incident Status: {}",
        incident.handle_status.as_deref().unwrap_or("-")
    ));
    parts.push(format!("Incident Labels: {}", labels_text));
    parts.push(format!("Incident Description: {}", description));

    if let Some(owner) = incident.owner.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("Owner: {}", owner));
    }
    if let Some(person) = incident
        .responsible_person
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        parts.push(format!("Responsible Person: {}", person));
    }
    if let Some(dept) = incident
        .responsible_dept
        .as_deref()
        .filter(|s| !s.is_empty())
    {
        parts.push(format!("Responsible Department: {}", dept));
    }

    if !alerts.is_empty() {
        parts.push("Associated Alerts:".to_string());
        for (idx, alert) in alerts.iter().take(MAX_ALERTS).enumerate() {
            let alert_desc = alert
                .description
                .as_ref()
                .map(stringify_value)
                .unwrap_or_default();
            parts.push(format!(
                "  Alert {} Title: {}",
                idx + 1,
                alert.title.as_deref().unwrap_or("-")
            ));
            parts.push(format!(
                "  Alert Severity: {}, Status: {}",
                alert.severity.as_deref().unwrap_or("-"),
                alert.handle_status.as_deref().unwrap_or("-")
            ));
            if !alert_desc.is_empty() {
                parts.push(format!("  Alert Description: {}", alert_desc));
            }
            if let Some(source) = alert
                .data_source_product_name
                .as_deref()
                .filter(|s| !s.is_empty())
            {
                parts.push(format!("  Data Source: {}", source));
            }
            parts.push(String::new());
        }
    }

    parts.join("\n").trim().to_string()
}

/// Ordered, de-duplicated graph label candidates: incident title/name/id,
/// each alert's title/id, then the fixed fallbacks.
fn build_graph_label_candidates(incident: &Incident, alerts: &[Alert]) -> Vec<String> {
    let mut candidates: Vec<String> = Vec::new();
    {
        let mut add = |value: Option<&str>| {
            if let Some(value) = value {
                let value = value.trim();
                if !value.is_empty() {
                    candidates.push(value.to_string());
                }
            }
        };

        add(incident.title.as_deref());
        add(incident.name.as_deref());
        add(Some(incident.id.as_str()));

        for alert in alerts {
            add(alert.title.as_deref());
            add(Some(alert.id.as_str()));
        }

        for fallback in FALLBACK_LABELS {
            add(Some(fallback));
        }
    }

    let mut seen = HashSet::new();
    candidates.retain(|candidate| seen.insert(candidate.clone()));
    candidates
}

/// Workspace tag for the ingested document.
fn build_file_source(incident: &Incident) -> String {
    let incident_id = if incident.id.is_empty() {
        "unknown"
    } else {
        incident.id.as_str()
    };
    format!("incident::{}", incident_id)
}

fn json_len(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_array)
        .map(|items| items.len().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
