//! [`MemoryRemote`] — an in-process document with the same compare-and-swap
//! rules as the HTTP protocol.
//!
//! Clones share one document, so several services in a test can act as
//! independent writers against the same remote.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use upkeep_core::remote::{
  RemoteDocument, RemoteStore, Version, VersionToken, WriteOutcome,
};

use crate::{Error, Result, wire::version_token};

#[derive(Debug, Default)]
struct State {
  content:    Option<Vec<u8>>,
  version:    Version,
  generation: u64,
  offline:    bool,
  writes:     usize,
  rejections: usize,
  messages:   Vec<String>,
}

impl State {
  fn commit(&mut self, content: Vec<u8>) -> VersionToken {
    self.generation += 1;
    let token = version_token(self.generation, &content);
    self.version = Version::Token(token.clone());
    self.content = Some(content);
    token
  }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryRemote {
  state: Arc<Mutex<State>>,
}

impl MemoryRemote {
  pub fn new() -> Self { Self::default() }

  /// A remote that already holds `content`.
  pub fn with_content(content: impl Into<Vec<u8>>) -> Self {
    let remote = Self::new();
    remote.lock().commit(content.into());
    remote
  }

  fn lock(&self) -> MutexGuard<'_, State> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// While offline every call fails with [`Error::Offline`].
  pub fn set_offline(&self, offline: bool) { self.lock().offline = offline; }

  /// Replace the document unconditionally, as an out-of-band writer would.
  pub fn overwrite(&self, content: impl Into<Vec<u8>>) -> VersionToken {
    self.lock().commit(content.into())
  }

  /// The current document, bypassing the offline switch.
  pub fn snapshot(&self) -> RemoteDocument {
    let state = self.lock();
    RemoteDocument { content: state.content.clone(), version: state.version.clone() }
  }

  /// Number of committed conditional writes.
  pub fn writes(&self) -> usize { self.lock().writes }

  /// Number of conditional writes refused with a conflict.
  pub fn rejections(&self) -> usize { self.lock().rejections }

  /// Messages of committed writes, oldest first.
  pub fn messages(&self) -> Vec<String> { self.lock().messages.clone() }
}

impl RemoteStore for MemoryRemote {
  type Error = Error;

  async fn fetch(&self) -> Result<RemoteDocument> {
    let state = self.lock();
    if state.offline {
      return Err(Error::Offline);
    }
    Ok(RemoteDocument { content: state.content.clone(), version: state.version.clone() })
  }

  async fn write_if_matches<'a>(
    &'a self,
    content: &'a [u8],
    expected: &'a Version,
    message: &'a str,
  ) -> Result<WriteOutcome> {
    let mut state = self.lock();
    if state.offline {
      return Err(Error::Offline);
    }
    if state.version != *expected {
      state.rejections += 1;
      return Ok(WriteOutcome::Conflict);
    }

    let created = state.content.is_none();
    let version = state.commit(content.to_vec());
    state.writes += 1;
    state.messages.push(message.to_owned());
    Ok(WriteOutcome::Committed { version, created })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn empty_remote_is_absent() {
    let remote = MemoryRemote::new();
    let doc = remote.fetch().await.unwrap();
    assert!(doc.content.is_none());
    assert_eq!(doc.version, Version::Absent);
  }

  #[tokio::test]
  async fn create_requires_absent_expectation() {
    let remote = MemoryRemote::new();
    let outcome = remote.write_if_matches(b"v1", &Version::Absent, "create").await.unwrap();
    let WriteOutcome::Committed { version, created } = outcome else {
      panic!("expected commit");
    };
    assert!(created);

    let doc = remote.fetch().await.unwrap();
    assert_eq!(doc.content.as_deref(), Some(&b"v1"[..]));
    assert_eq!(doc.version, Version::Token(version));

    let again = remote.write_if_matches(b"v2", &Version::Absent, "create").await.unwrap();
    assert_eq!(again, WriteOutcome::Conflict);
    assert_eq!(remote.rejections(), 1);
  }

  #[tokio::test]
  async fn stale_token_is_rejected_and_nothing_changes() {
    let remote = MemoryRemote::with_content("base");
    let stale = remote.fetch().await.unwrap().version;
    remote.overwrite("someone else");

    let outcome = remote.write_if_matches(b"mine", &stale, "edit").await.unwrap();
    assert_eq!(outcome, WriteOutcome::Conflict);
    assert_eq!(remote.snapshot().content.as_deref(), Some(&b"someone else"[..]));
    assert_eq!(remote.writes(), 0);
  }

  #[tokio::test]
  async fn identical_rewrite_still_changes_the_token() {
    let remote = MemoryRemote::with_content("same");
    let first = remote.fetch().await.unwrap().version;
    let outcome = remote.write_if_matches(b"same", &first, "noop").await.unwrap();
    let WriteOutcome::Committed { version, created } = outcome else {
      panic!("expected commit");
    };
    assert!(!created);
    assert_ne!(Version::Token(version), first);
    assert_eq!(remote.messages(), vec!["noop".to_owned()]);
  }

  #[tokio::test]
  async fn offline_remote_fails_every_call() {
    let remote = MemoryRemote::new();
    remote.set_offline(true);
    assert!(matches!(remote.fetch().await, Err(Error::Offline)));
    assert!(matches!(
      remote.write_if_matches(b"x", &Version::Absent, "m").await,
      Err(Error::Offline)
    ));

    remote.set_offline(false);
    assert!(remote.fetch().await.is_ok());
  }

  #[tokio::test]
  async fn clones_share_the_document() {
    let a = MemoryRemote::new();
    let b = a.clone();
    a.write_if_matches(b"shared", &Version::Absent, "m").await.unwrap();
    assert_eq!(b.snapshot().content.as_deref(), Some(&b"shared"[..]));
  }
}
