//! Error type for the LightRAG graph subsystem.

use thiserror::Error;

/// Failures raised by the graph client and orchestrator.
///
/// Everything the remote backend can do wrong — transport failures, bad
/// status codes, malformed bodies, failed document processing, poll-loop
/// timeouts — collapses into this one type; callers only ever distinguish
/// "retry", "give up", or "not configured".
#[derive(Debug, Error)]
pub enum GraphServiceError {
    #[error("LightRAG base_url is not configured")]
    NotConfigured,

    #[error("LightRAG {method} {path} failed: {message}")]
    Request {
        method: String,
        path: String,
        message: String,
    },

    #[error("LightRAG API returned invalid response for {path}: {message}")]
    InvalidResponse { path: String, message: String },

    #[error("LightRAG document processing failed for track {track_id}: {statuses:?}")]
    DocumentsFailed {
        track_id: String,
        statuses: Vec<String>,
    },

    #[error("{operation} exceeded {seconds}s: {detail}")]
    Timeout {
        operation: String,
        seconds: u64,
        detail: String,
    },

    #[error("LightRAG workspace busy when clearing documents: {0}")]
    WorkspaceBusy(String),

    #[error("unable to fetch graph with labels {tried:?}: {source}")]
    LabelsExhausted {
        tried: Vec<String>,
        #[source]
        source: Box<GraphServiceError>,
    },

    #[error("no valid label provided to fetch graph data")]
    NoLabels,
}
