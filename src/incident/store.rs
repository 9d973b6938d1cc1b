//! SnapshotStore trait definition
//!
//! Abstract interface over the local incident snapshot persistence. The sync
//! scheduler and the graph refresher only ever touch snapshots through this
//! trait, so the backing store can be swapped without touching the core.

use super::models::{GraphBundle, Incident, IncidentSnapshot, SnapshotSummary};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Abstract interface for incident snapshot persistence.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// List summaries for every cached incident that is still open.
    async fn list_open_incident_snapshots(&self) -> Result<Vec<SnapshotSummary>>;

    /// Create or overwrite the snapshot for an incident from a freshly
    /// retrieved SIEM payload. Preserves any stored graph bundle.
    async fn upsert_incident(&self, incident: &Incident) -> Result<()>;

    /// Fetch the full snapshot for one incident.
    async fn get_snapshot(&self, incident_id: &str) -> Result<Option<IncidentSnapshot>>;

    /// Fetch the stored graph bundle, if the snapshot has a complete one.
    async fn get_graph_bundle(&self, incident_id: &str) -> Result<Option<GraphBundle>>;

    /// Store a freshly generated graph bundle. Both halves are written in one
    /// operation — callers never write `graph_data` and `graph_summary`
    /// independently.
    async fn update_graph_bundle(
        &self,
        incident_id: &str,
        graph_data: Value,
        graph_summary: Option<String>,
    ) -> Result<()>;

    /// Drop the stored bundle so the next sweep regenerates it.
    async fn clear_graph_bundle(&self, incident_id: &str) -> Result<()>;
}
