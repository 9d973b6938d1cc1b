//! GraphBackend trait definition
//!
//! The seam between the orchestrator and the remote LightRAG service.
//! `RemoteGraphClient` is the production implementation; tests script the
//! backend with an in-memory mock.

use super::error::GraphServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One ingested document's processing state as reported by a track status
/// poll. Unknown fields from the backend are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackDocument {
    pub id: Option<String>,
    pub status: Option<String>,
}

/// Abstract interface over the remote graph/RAG backend.
#[async_trait]
pub trait GraphBackend: Send + Sync {
    /// Block until the remote workspace is idle and empty, clearing terminal
    /// leftovers along the way. Fails with a timeout after the configured
    /// workspace budget.
    async fn ensure_workspace_empty(&self) -> Result<(), GraphServiceError>;

    /// Submit a text document for ingestion; returns the track id.
    async fn insert_text(
        &self,
        text: &str,
        file_source: Option<&str>,
    ) -> Result<String, GraphServiceError>;

    /// Poll the track until every document reaches a terminal state.
    async fn wait_for_track_completion(
        &self,
        track_id: &str,
    ) -> Result<Vec<TrackDocument>, GraphServiceError>;

    /// Fetch the knowledge graph, trying label candidates in priority order.
    async fn fetch_graph_data(
        &self,
        doc_id: Option<&str>,
        label_candidates: &[String],
    ) -> Result<Value, GraphServiceError>;

    /// Run a natural-language query against the ingested context.
    async fn query_summary(&self, prompt: &str) -> Result<Option<String>, GraphServiceError>;

    /// Delete every document in the workspace. Best-effort: exhausting the
    /// retry budget logs a warning and returns normally.
    async fn clear_documents(&self);
}
