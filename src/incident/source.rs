//! IncidentSource trait definition
//!
//! Seam over the remote SIEM: the sync scheduler and the graph refresher
//! fetch live incidents through this trait so tests can script the remote
//! side without a SecMaster instance.

use super::models::Incident;
use anyhow::Result;
use async_trait::async_trait;

/// Abstract interface for retrieving live incidents from the SIEM.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    /// Fetch one incident by id, with its associated alerts hydrated.
    /// Fails on network/auth errors; callers treat a failure as "skip this
    /// incident for now", never as fatal.
    async fn retrieve_incident_by_id(&self, incident_id: &str) -> Result<Incident>;
}
