//! The `RemoteStore` trait — a single shared document behind a
//! compare-and-swap write.
//!
//! Implemented by transports in `upkeep-remote`. The coordinator in
//! `upkeep-sync` depends on this abstraction, not on any concrete backend.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};

// ─── Version tokens ──────────────────────────────────────────────────────────

/// Opaque identifier of one exact state of the remote document. Only ever
/// compared for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
  pub fn new(token: impl Into<String>) -> Self { Self(token.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for VersionToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// What a writer claims the remote currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Version {
  /// The document does not exist yet.
  #[default]
  Absent,
  Token(VersionToken),
}

impl Version {
  pub fn token(&self) -> Option<&VersionToken> {
    match self {
      Self::Absent => None,
      Self::Token(t) => Some(t),
    }
  }
}

impl From<Option<VersionToken>> for Version {
  fn from(token: Option<VersionToken>) -> Self {
    token.map_or(Self::Absent, Self::Token)
  }
}

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Absent => f.write_str("<absent>"),
      Self::Token(t) => t.fmt(f),
    }
  }
}

// ─── Protocol values ─────────────────────────────────────────────────────────

/// The remote document as observed by one `fetch`.
#[derive(Debug, Clone, Default)]
pub struct RemoteDocument {
  /// `None` when the document does not exist yet.
  pub content: Option<Vec<u8>>,
  pub version: Version,
}

impl RemoteDocument {
  pub fn absent() -> Self { Self::default() }
}

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
  /// The remote accepted the write and now holds the new content.
  Committed {
    version: VersionToken,
    /// `true` when the write created the document.
    created: bool,
  },
  /// The remote's current version no longer equals the expected one;
  /// nothing changed remotely.
  Conflict,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a remote single-document store with conditional writes.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait RemoteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the current bytes and the token identifying that exact state.
  fn fetch(
    &self,
  ) -> impl Future<Output = Result<RemoteDocument, Self::Error>> + Send + '_;

  /// Replace the document with `content` only if the remote is still at
  /// `expected`. `message` is a short human-readable change description.
  fn write_if_matches<'a>(
    &'a self,
    content: &'a [u8],
    expected: &'a Version,
    message: &'a str,
  ) -> impl Future<Output = Result<WriteOutcome, Self::Error>> + Send + 'a;
}
