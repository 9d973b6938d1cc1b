//! Per-incident build admission.
//!
//! Tracks which incidents currently have a graph build in flight so that a
//! second trigger for the same incident becomes a no-op instead of a queued
//! duplicate. Distinct from the orchestrator's global build lock, which
//! serializes builds for *different* incidents.

use std::collections::HashSet;
use std::sync::Mutex;

/// Mutex-guarded set of incident ids with a build in flight.
///
/// Entries are purely in-memory: a restart forgets them, and the next
/// scheduler sweep re-detects missing bundles and reschedules.
#[derive(Default)]
pub struct BuildCoordinator {
    in_flight: Mutex<HashSet<String>>,
}

impl BuildCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the build slot for an incident. Returns `false` when a build is
    /// already in flight for it.
    pub fn try_acquire(&self, incident_id: &str) -> bool {
        self.in_flight
            .lock()
            .expect("in-flight set poisoned")
            .insert(incident_id.to_string())
    }

    /// Release the slot once the build finished, successfully or not.
    pub fn release(&self, incident_id: &str) {
        self.in_flight
            .lock()
            .expect("in-flight set poisoned")
            .remove(incident_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_fails_until_release() {
        let coordinator = BuildCoordinator::new();
        assert!(coordinator.try_acquire("i-1"));
        assert!(!coordinator.try_acquire("i-1"));

        coordinator.release("i-1");
        assert!(coordinator.try_acquire("i-1"));
    }

    #[test]
    fn test_distinct_incidents_do_not_contend() {
        let coordinator = BuildCoordinator::new();
        assert!(coordinator.try_acquire("i-1"));
        assert!(coordinator.try_acquire("i-2"));
    }

    #[test]
    fn test_release_unknown_id_is_noop() {
        let coordinator = BuildCoordinator::new();
        coordinator.release("never-acquired");
        assert!(coordinator.try_acquire("never-acquired"));
    }
}
