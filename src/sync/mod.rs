//! Client-authoritative reconciliation of file hash maps.

pub mod reconciler;
pub mod types;

pub use reconciler::Reconciler;
pub use types::{SyncReport, SyncRequest};
