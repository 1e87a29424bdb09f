//! Optimistic-concurrency sync and the caller-facing Upkeep service.
//!
//! [`SyncCoordinator`] moves whole record sets between memory, a
//! [`LocalCache`](upkeep_core::cache::LocalCache) and a
//! [`RemoteStore`](upkeep_core::remote::RemoteStore) using compare-and-swap
//! writes. [`Upkeep`] wraps it with the maintenance operations a front end
//! calls.

pub mod coordinator;
pub mod error;
pub mod service;

pub use coordinator::{PushReport, SyncCoordinator, SyncOptions, SyncState, SyncStatus};
pub use error::{Error, Result};
pub use service::{DueItem, StatusFilter, Upkeep, UpkeepOptions};

#[cfg(test)]
mod tests;
