//! In-memory mock implementation of IncidentSource for testing.

use super::models::Incident;
use super::source::IncidentSource;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Scriptable SIEM stand-in: seeded incidents plus ids that fail retrieval.
pub(crate) struct MockIncidentSource {
    incidents: Mutex<HashMap<String, Incident>>,
    fail_ids: Mutex<HashSet<String>>,
    pub calls: AtomicU32,
}

impl MockIncidentSource {
    pub fn new() -> Self {
        Self {
            incidents: Mutex::new(HashMap::new()),
            fail_ids: Mutex::new(HashSet::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn insert(&self, incident: Incident) {
        self.incidents
            .lock()
            .unwrap()
            .insert(incident.id.clone(), incident);
    }

    /// Make retrieval for this id fail with an error.
    pub fn fail(&self, incident_id: &str) {
        self.fail_ids.lock().unwrap().insert(incident_id.to_string());
    }
}

#[async_trait]
impl IncidentSource for MockIncidentSource {
    async fn retrieve_incident_by_id(&self, incident_id: &str) -> Result<Incident> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_ids.lock().unwrap().contains(incident_id) {
            anyhow::bail!("scripted retrieval failure for {}", incident_id);
        }
        self.incidents
            .lock()
            .unwrap()
            .get(incident_id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("incident {} not found", incident_id))
    }
}
