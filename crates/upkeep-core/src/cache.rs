//! The `LocalCache` trait — durable local copy of the encoded workbook.
//!
//! Local durability never depends on the remote: every mutation is saved
//! here first and flagged as pending until a push commits.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::remote::{Version, VersionToken};

/// The most recently saved local snapshot.
#[derive(Debug, Clone)]
pub struct CachedSnapshot {
  pub content:        Vec<u8>,
  /// `true` while the snapshot has not been committed remotely.
  pub pending_sync:   bool,
  /// The remote version this snapshot was last synced with.
  pub remote_version: Version,
  pub saved_at:       DateTime<Utc>,
}

/// Abstraction over the local snapshot store (e.g. `upkeep-cache-sqlite`).
pub trait LocalCache: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist `content` as the latest snapshot. The last known remote version
  /// is kept as-is.
  fn save(
    &self,
    content: Vec<u8>,
    pending_sync: bool,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The latest snapshot, or `None` for a fresh cache.
  fn load(
    &self,
  ) -> impl Future<Output = Result<Option<CachedSnapshot>, Self::Error>> + Send + '_;

  /// Record that the latest snapshot is now the remote's `version`.
  fn mark_synced(
    &self,
    version: VersionToken,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
