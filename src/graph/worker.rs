//! Fire-and-forget graph refresh dispatch.
//!
//! On-demand rebuild requests go onto a bounded queue drained by a single
//! background task, so the HTTP caller gets an immediate answer while build
//! failures still end up in the log. The sync sweep uses the synchronous
//! entry point instead and shares the same per-incident admission.

use super::coordinator::BuildCoordinator;
use super::orchestrator::GraphBundleOrchestrator;
use crate::incident::models::Incident;
use crate::incident::source::IncidentSource;
use crate::incident::store::SnapshotStore;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Schedules and runs graph bundle refreshes.
pub struct GraphRefresher {
    orchestrator: Arc<GraphBundleOrchestrator>,
    store: Arc<dyn SnapshotStore>,
    coordinator: Arc<BuildCoordinator>,
    queue_tx: mpsc::Sender<String>,
}

impl GraphRefresher {
    /// Create the refresher and spawn its worker task. The task lives until
    /// the refresher (and with it the queue sender) is dropped.
    pub fn new(
        orchestrator: Arc<GraphBundleOrchestrator>,
        store: Arc<dyn SnapshotStore>,
        source: Arc<dyn IncidentSource>,
        coordinator: Arc<BuildCoordinator>,
        queue_capacity: usize,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel::<String>(queue_capacity.max(1));
        tokio::spawn(Self::run_loop(
            orchestrator.clone(),
            store.clone(),
            source,
            coordinator.clone(),
            queue_rx,
        ));
        Self {
            orchestrator,
            store,
            coordinator,
            queue_tx,
        }
    }

    /// Schedule a background rebuild for one incident.
    ///
    /// Returns `false` when a build for this incident is already in flight
    /// (a no-op, not an error) or the queue cannot take the request.
    pub fn request_rebuild(&self, incident_id: &str) -> bool {
        if !self.coordinator.try_acquire(incident_id) {
            tracing::debug!(
                "Graph build already in flight for {}, ignoring trigger",
                incident_id
            );
            return false;
        }
        if let Err(err) = self.queue_tx.try_send(incident_id.to_string()) {
            tracing::warn!(
                "Dropping graph rebuild request for {}: queue unavailable ({})",
                incident_id,
                err
            );
            self.coordinator.release(incident_id);
            return false;
        }
        true
    }

    /// Refresh one incident's bundle inline (the sync sweep path).
    /// Skips silently when a build for this incident is already in flight.
    pub async fn refresh_incident(&self, incident: &Incident) {
        if !self.coordinator.try_acquire(&incident.id) {
            tracing::debug!(
                "Graph build already in flight for {}, skipping sweep refresh",
                incident.id
            );
            return;
        }
        refresh_bundle(&self.orchestrator, &self.store, incident).await;
        self.coordinator.release(&incident.id);
    }

    /// Worker loop: one rebuild at a time, slot released on every outcome.
    async fn run_loop(
        orchestrator: Arc<GraphBundleOrchestrator>,
        store: Arc<dyn SnapshotStore>,
        source: Arc<dyn IncidentSource>,
        coordinator: Arc<BuildCoordinator>,
        mut queue_rx: mpsc::Receiver<String>,
    ) {
        while let Some(incident_id) = queue_rx.recv().await {
            match source.retrieve_incident_by_id(&incident_id).await {
                Ok(incident) => {
                    // Refresh the local snapshot first; a build against stale
                    // data is worse than no build.
                    match store.upsert_incident(&incident).await {
                        Ok(()) => refresh_bundle(&orchestrator, &store, &incident).await,
                        Err(err) => tracing::warn!(
                            "Failed to update local snapshot for {}: {:#}",
                            incident_id,
                            err
                        ),
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "Failed to fetch incident {} for graph rebuild: {:#}",
                        incident_id,
                        err
                    );
                }
            }
            coordinator.release(&incident_id);
        }
    }
}

/// Run one bundle generation and persist the result. Both halves of the
/// bundle are written in a single store call, or not at all.
async fn refresh_bundle(
    orchestrator: &GraphBundleOrchestrator,
    store: &Arc<dyn SnapshotStore>,
    incident: &Incident,
) {
    match orchestrator
        .generate_graph_bundle(incident, &incident.associated_alerts)
        .await
    {
        Ok((graph_data, graph_summary)) => {
            match store
                .update_graph_bundle(&incident.id, graph_data, graph_summary)
                .await
            {
                Ok(()) => tracing::info!("Refreshed graph bundle for {}", incident.id),
                Err(err) => tracing::warn!(
                    "Failed to store graph bundle for {}: {:#}",
                    incident.id,
                    err
                ),
            }
        }
        Err(err) => {
            tracing::warn!("Graph generation failed for {}: {}", incident.id, err);
        }
    }
}
