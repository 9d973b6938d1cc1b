//! Incident domain model, snapshot persistence, and SIEM retrieval seams

pub mod memory;
pub mod models;
pub mod source;
pub mod store;

pub use memory::MemorySnapshotStore;
pub use models::*;
pub use source::IncidentSource;
pub use store::SnapshotStore;

#[cfg(test)]
pub(crate) mod mock;
