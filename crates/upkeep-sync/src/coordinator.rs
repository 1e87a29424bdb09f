//! [`SyncCoordinator`] — one push or pull cycle between the in-memory
//! records, the local cache and the remote document.
//!
//! A push walks the states
//!
//! ```text
//! Idle → Fetching → Encoding → Writing → Committed | Conflict | Failed
//! ```
//!
//! and loops from `Fetching` after every lost compare-and-swap, so each write
//! carries the token of the fetch immediately before it. Whole-document
//! overwrite: the candidate is always this client's full record set, never a
//! merge with what the remote holds.

use std::{future::Future, time::Duration};

use strum::Display;
use upkeep_core::{
  RecordStore,
  cache::{CachedSnapshot, LocalCache},
  remote::{RemoteDocument, RemoteStore, Version, VersionToken, WriteOutcome},
};

use crate::{Error, Result};

// ─── Options ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
  /// Conditional writes attempted per push before giving up.
  pub max_attempts: u32,
  /// Applies to each remote call separately.
  pub timeout:      Duration,
}

impl Default for SyncOptions {
  fn default() -> Self { Self { max_attempts: 3, timeout: Duration::from_secs(30) } }
}

// ─── State & reports ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SyncState {
  #[default]
  Idle,
  Fetching,
  Encoding,
  Writing,
  Committed,
  Conflict,
  Failed,
}

/// A successful push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushReport {
  pub version:  VersionToken,
  /// Conditional writes it took, including the one that committed.
  pub attempts: u32,
  /// `true` when this push created the remote document.
  pub created:  bool,
}

/// Local view of synchronisation, read from the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStatus {
  /// Local changes not yet committed remotely.
  pub pending:        bool,
  /// Remote version the local snapshot was last synced with.
  pub remote_version: Version,
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

pub struct SyncCoordinator<R, C> {
  remote:  R,
  cache:   C,
  options: SyncOptions,
  state:   SyncState,
}

impl<R, C> SyncCoordinator<R, C>
where
  R: RemoteStore,
  C: LocalCache,
{
  pub fn new(remote: R, cache: C, options: SyncOptions) -> Self {
    let options = SyncOptions { max_attempts: options.max_attempts.max(1), ..options };
    Self { remote, cache, options, state: SyncState::Idle }
  }

  pub fn remote(&self) -> &R { &self.remote }

  pub fn cache(&self) -> &C { &self.cache }

  pub fn options(&self) -> &SyncOptions { &self.options }

  /// State reached by the most recent push or pull.
  pub fn state(&self) -> SyncState { self.state }

  fn transition(&mut self, next: SyncState) {
    tracing::debug!(from = %self.state, to = %next, "sync state");
    self.state = next;
  }

  async fn timed<T, E>(&self, call: impl Future<Output = Result<T, E>>) -> Result<T>
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    match tokio::time::timeout(self.options.timeout, call).await {
      Ok(result) => result.map_err(Error::connectivity),
      Err(elapsed) => Err(Error::connectivity(elapsed)),
    }
  }

  // ── Local cache ───────────────────────────────────────────────────────────

  /// Encode `store` and save it locally as pending.
  pub async fn save_local(&self, store: &RecordStore) -> Result<()> {
    let bytes = upkeep_workbook::encode(store)?;
    self.cache.save(bytes, true).await.map_err(Error::storage)
  }

  /// The cached snapshot decoded into records, or `None` for a fresh cache.
  pub async fn load_local(&self) -> Result<Option<(RecordStore, CachedSnapshot)>> {
    let Some(snapshot) = self.cache.load().await.map_err(Error::storage)? else {
      return Ok(None);
    };
    let store = upkeep_workbook::decode(&snapshot.content)?;
    Ok(Some((store, snapshot)))
  }

  pub async fn status(&self) -> Result<SyncStatus> {
    let snapshot = self.cache.load().await.map_err(Error::storage)?;
    Ok(snapshot.map_or(
      SyncStatus { pending: false, remote_version: Version::Absent },
      |s| SyncStatus { pending: s.pending_sync, remote_version: s.remote_version },
    ))
  }

  // ── Push ──────────────────────────────────────────────────────────────────

  /// Save `store` locally, then make it the remote document.
  ///
  /// The local save happens first and does not depend on the remote. A
  /// failed local save is reported as [`Error::Storage`] once the remote
  /// attempt has finished, whatever its outcome.
  pub async fn push(&mut self, store: &RecordStore, message: &str) -> Result<PushReport> {
    let saved = self.save_local(store).await;
    if let Err(e) = &saved {
      tracing::error!(error = %e, "local save failed; still attempting remote push");
    }

    let pushed = self.push_remote(store, message).await;
    if let Err(e) = &pushed
      && !matches!(e, Error::Conflict { .. })
    {
      self.transition(SyncState::Failed);
    }
    saved?;
    let report = pushed?;

    self
      .cache
      .mark_synced(report.version.clone())
      .await
      .map_err(Error::storage)?;
    Ok(report)
  }

  async fn push_remote(&mut self, store: &RecordStore, message: &str) -> Result<PushReport> {
    let mut attempts = 0;
    loop {
      attempts += 1;

      self.transition(SyncState::Fetching);
      let current = self.timed(self.remote.fetch()).await?;

      self.transition(SyncState::Encoding);
      let candidate = upkeep_workbook::encode(store)?;

      self.transition(SyncState::Writing);
      let outcome = self
        .timed(self.remote.write_if_matches(&candidate, &current.version, message))
        .await?;

      match outcome {
        WriteOutcome::Committed { version, created } => {
          self.transition(SyncState::Committed);
          tracing::info!(%version, attempts, created, "remote document committed");
          return Ok(PushReport { version, attempts, created });
        }
        WriteOutcome::Conflict if attempts < self.options.max_attempts => {
          tracing::warn!(attempt = attempts, expected = %current.version, "remote changed; refetching");
        }
        WriteOutcome::Conflict => {
          let remote = self.latest_remote(current).await;
          self.transition(SyncState::Conflict);
          tracing::warn!(attempts, remote = %remote.version, "giving up on conflicting remote");
          return Err(Error::Conflict { attempts, local: candidate, remote });
        }
      }
    }
  }

  /// Best effort: the remote as it is now, or `fallback` if it cannot be
  /// read.
  async fn latest_remote(&self, fallback: RemoteDocument) -> RemoteDocument {
    match self.timed(self.remote.fetch()).await {
      Ok(doc) => doc,
      Err(e) => {
        tracing::debug!(error = %e, "could not refetch after conflict");
        fallback
      }
    }
  }

  // ── Pull ──────────────────────────────────────────────────────────────────

  /// Download the remote document and make it the local snapshot.
  ///
  /// Returns `None`, leaving the cache alone, when the remote does not exist
  /// yet.
  pub async fn pull(&mut self) -> Result<Option<RecordStore>> {
    self.transition(SyncState::Fetching);
    let doc = match self.timed(self.remote.fetch()).await {
      Ok(doc) => doc,
      Err(e) => {
        self.transition(SyncState::Failed);
        return Err(e);
      }
    };
    let (Some(content), Version::Token(version)) = (doc.content, doc.version) else {
      self.transition(SyncState::Idle);
      tracing::info!("remote document does not exist yet");
      return Ok(None);
    };

    let store = match upkeep_workbook::decode(&content) {
      Ok(store) => store,
      Err(e) => {
        self.transition(SyncState::Failed);
        return Err(e.into());
      }
    };
    self.cache.save(content, false).await.map_err(Error::storage)?;
    self.cache.mark_synced(version.clone()).await.map_err(Error::storage)?;

    self.transition(SyncState::Committed);
    tracing::info!(%version, "pulled remote document");
    Ok(Some(store))
  }
}
