//! API request handlers

use crate::graph::GraphRefresher;
use crate::incident::store::SnapshotStore;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// Shared server state
pub struct ServerState {
    pub store: Arc<dyn SnapshotStore>,
    /// `None` when the graph service is not configured.
    pub refresher: Option<Arc<GraphRefresher>>,
}

pub type ConsoleState = Arc<ServerState>;

/// Health check endpoint
pub async fn health() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// List open incident snapshots with their bundle presence flags.
pub async fn list_incidents(State(state): State<ConsoleState>) -> impl IntoResponse {
    match state.store.list_open_incident_snapshots().await {
        Ok(snapshots) => Json(snapshots).into_response(),
        Err(err) => {
            tracing::error!("Failed to list incident snapshots: {:#}", err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to list incidents"})),
            )
                .into_response()
        }
    }
}

/// Fetch the stored graph bundle for one incident.
pub async fn get_incident_graph(
    State(state): State<ConsoleState>,
    Path(incident_id): Path<String>,
) -> impl IntoResponse {
    match state.store.get_graph_bundle(&incident_id).await {
        Ok(Some(bundle)) => Json(bundle).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "no graph bundle for incident"})),
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Failed to read graph bundle for {}: {:#}", incident_id, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "failed to read graph bundle"})),
            )
                .into_response()
        }
    }
}

/// Schedule a background graph rebuild for one incident.
///
/// Responds as soon as the job is queued; `scheduled: false` means a build
/// for this incident is already in flight. Build errors never surface here —
/// they are logged by the worker.
pub async fn regenerate_incident_graph(
    State(state): State<ConsoleState>,
    Path(incident_id): Path<String>,
) -> impl IntoResponse {
    match &state.refresher {
        Some(refresher) => {
            let scheduled = refresher.request_rebuild(&incident_id);
            (
                StatusCode::ACCEPTED,
                Json(json!({"scheduled": scheduled})),
            )
                .into_response()
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"error": "graph service is not configured"})),
        )
            .into_response(),
    }
}
