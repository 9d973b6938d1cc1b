//! SecMaster SIEM integration

pub mod client;

pub use client::{SecMasterClient, SecMasterConfig};
