//! Periodic incident graph synchronization.
//!
//! Keeps cached incident snapshots in sync with the live SIEM by diffing
//! alert-list cardinality, and regenerates missing or stale graph bundles.
//!
//! ## Design
//!
//! One tick scans every open snapshot. Per incident: fetch the live payload
//! (skip on failure — partial failure must not abort the sweep), compare
//! alert counts, treat a half-written bundle as missing, persist the refreshed
//! snapshot before any graph work, then refresh the bundle when the graph
//! service is configured. Ticks are serialized by an internal lock and missed
//! ticks coalesce instead of queueing catch-up runs.
//!
//! Count-only drift detection is deliberate: an alert added and another
//! removed in the same window is invisible here, and the live payload is
//! fetched anyway before anything is rebuilt.

use crate::graph::GraphRefresher;
use crate::incident::models::SnapshotSummary;
use crate::incident::source::IncidentSource;
use crate::incident::store::SnapshotStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

/// Periodic job that keeps incident graph data in sync when alert lists
/// change on the remote side.
pub struct IncidentSyncScheduler {
    store: Arc<dyn SnapshotStore>,
    source: Arc<dyn IncidentSource>,
    /// `None` when the graph service is not configured — the sweep still
    /// refreshes snapshots, it just skips bundle generation.
    refresher: Option<Arc<GraphRefresher>>,
    tick_lock: Mutex<()>,
    interval: Duration,
}

impl IncidentSyncScheduler {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        source: Arc<dyn IncidentSource>,
        refresher: Option<Arc<GraphRefresher>>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            source,
            refresher,
            tick_lock: Mutex::new(()),
            interval,
        }
    }

    /// Spawn the interval loop. `run()` is awaited inline, so a long sweep
    /// simply delays the next tick; skipped ticks are not replayed.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tracing::info!(
            "Registered incident graph sync job (every {}s)",
            self.interval.as_secs()
        );
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval fires immediately; the first sweep should wait one period
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.run().await;
            }
        })
    }

    /// One synchronization sweep over all open incidents.
    pub async fn run(&self) {
        let _guard = self.tick_lock.lock().await;

        let snapshots = match self.store.list_open_incident_snapshots().await {
            Ok(snapshots) => snapshots,
            Err(err) => {
                tracing::warn!("Failed to list incident snapshots: {:#}", err);
                return;
            }
        };

        tracing::debug!(
            "Scanning {} open incidents for alert changes",
            snapshots.len()
        );
        for snapshot in snapshots {
            if snapshot.incident_id.is_empty() {
                continue;
            }
            self.sync_one(&snapshot).await;
        }
    }

    async fn sync_one(&self, snapshot: &SnapshotSummary) {
        let incident_id = &snapshot.incident_id;

        let remote = match self.source.retrieve_incident_by_id(incident_id).await {
            Ok(remote) => remote,
            Err(err) => {
                tracing::warn!("Failed to fetch incident {}: {:#}", incident_id, err);
                return;
            }
        };

        let alerts_changed = snapshot.alert_list.len() != remote.alert_list.len();
        let graph_missing = snapshot.graph_bundle_missing();

        if !alerts_changed && !graph_missing {
            return;
        }

        if alerts_changed {
            tracing::info!(
                "Detected alert count change for {}: local={} remote={}",
                incident_id,
                snapshot.alert_list.len(),
                remote.alert_list.len()
            );
            if let Err(err) = self.store.upsert_incident(&remote).await {
                tracing::warn!(
                    "Failed to update local snapshot for {}: {:#}",
                    incident_id,
                    err
                );
                return;
            }
        } else {
            tracing::info!(
                "Missing graph bundle for {} (graph_data={}, graph_summary={})",
                incident_id,
                if snapshot.has_graph_data { "present" } else { "missing" },
                if snapshot.has_graph_summary { "present" } else { "missing" },
            );
        }

        match &self.refresher {
            Some(refresher) => refresher.refresh_incident(&remote).await,
            None => {
                tracing::debug!(
                    "Graph service disabled, skip graph refresh for {}",
                    incident_id
                );
            }
        }
    }
}
