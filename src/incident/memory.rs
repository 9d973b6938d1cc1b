//! In-memory implementation of SnapshotStore.
//!
//! Backs the service when no external database is wired in; also the store
//! used throughout the test suite. Open/closed state follows the incident's
//! `handle_status`: anything other than `Closed` counts as open.

use super::models::{GraphBundle, Incident, IncidentSnapshot, SnapshotSummary};
use super::store::SnapshotStore;
use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Clone)]
struct SnapshotRow {
    snapshot: IncidentSnapshot,
    handle_status: Option<String>,
}

/// In-memory snapshot store keyed by incident id.
#[derive(Default)]
pub struct MemorySnapshotStore {
    rows: RwLock<HashMap<String, SnapshotRow>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn is_open(row: &SnapshotRow) -> bool {
        !matches!(row.handle_status.as_deref(), Some("Closed"))
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn list_open_incident_snapshots(&self) -> Result<Vec<SnapshotSummary>> {
        let rows = self.rows.read().await;
        let mut summaries: Vec<SnapshotSummary> = rows
            .values()
            .filter(|row| Self::is_open(row))
            .map(|row| SnapshotSummary {
                incident_id: row.snapshot.incident_id.clone(),
                alert_list: row.snapshot.alert_list.clone(),
                has_graph_data: row.snapshot.graph_data.is_some(),
                has_graph_summary: row.snapshot.graph_summary.is_some(),
            })
            .collect();
        // Deterministic sweep order
        summaries.sort_by(|a, b| a.incident_id.cmp(&b.incident_id));
        Ok(summaries)
    }

    async fn upsert_incident(&self, incident: &Incident) -> Result<()> {
        let mut rows = self.rows.write().await;
        let existing = rows.get(&incident.id);
        let (graph_data, graph_summary) = existing
            .map(|row| {
                (
                    row.snapshot.graph_data.clone(),
                    row.snapshot.graph_summary.clone(),
                )
            })
            .unwrap_or((None, None));

        rows.insert(
            incident.id.clone(),
            SnapshotRow {
                snapshot: IncidentSnapshot {
                    incident_id: incident.id.clone(),
                    alert_list: incident.alert_list.clone(),
                    graph_data,
                    graph_summary,
                    updated_at: Utc::now(),
                },
                handle_status: incident.handle_status.clone(),
            },
        );
        Ok(())
    }

    async fn get_snapshot(&self, incident_id: &str) -> Result<Option<IncidentSnapshot>> {
        let rows = self.rows.read().await;
        Ok(rows.get(incident_id).map(|row| row.snapshot.clone()))
    }

    async fn get_graph_bundle(&self, incident_id: &str) -> Result<Option<GraphBundle>> {
        let rows = self.rows.read().await;
        Ok(rows.get(incident_id).and_then(|row| {
            row.snapshot.graph_data.as_ref().map(|data| GraphBundle {
                graph_data: data.clone(),
                graph_summary: row.snapshot.graph_summary.clone(),
            })
        }))
    }

    async fn update_graph_bundle(
        &self,
        incident_id: &str,
        graph_data: Value,
        graph_summary: Option<String>,
    ) -> Result<()> {
        let mut rows = self.rows.write().await;
        match rows.get_mut(incident_id) {
            Some(row) => {
                row.snapshot.graph_data = Some(graph_data);
                row.snapshot.graph_summary = graph_summary;
                row.snapshot.updated_at = Utc::now();
                Ok(())
            }
            None => anyhow::bail!("no snapshot for incident {}", incident_id),
        }
    }

    async fn clear_graph_bundle(&self, incident_id: &str) -> Result<()> {
        let mut rows = self.rows.write().await;
        if let Some(row) = rows.get_mut(incident_id) {
            row.snapshot.graph_data = None;
            row.snapshot.graph_summary = None;
            row.snapshot.updated_at = Utc::now();
        }
        Ok(())
    }
}
