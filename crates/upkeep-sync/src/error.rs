//! Error type for `upkeep-sync`: the caller-facing error kinds.

use thiserror::Error;
use upkeep_core::remote::RemoteDocument;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input; nothing was changed.
  #[error(transparent)]
  Validation(upkeep_core::Error),

  /// A machine or task id that does not exist.
  #[error(transparent)]
  NotFound(upkeep_core::Error),

  /// A document could not be decoded into the required structure.
  #[error("document schema error: {0}")]
  Schema(#[from] upkeep_workbook::Error),

  /// Local persistence failed. The in-memory records are unchanged, so the
  /// save can be retried.
  #[error("local storage error: {0}")]
  Storage(#[source] BoxError),

  /// The remote could not be reached in time. Local state is intact and
  /// remains pending.
  #[error("remote unreachable: {0}")]
  Connectivity(#[source] BoxError),

  /// Every conditional write lost to a concurrent writer.
  #[error("remote document kept changing; gave up after {attempts} attempts")]
  Conflict {
    attempts: u32,
    /// The document this client tried to write.
    local:    Vec<u8>,
    /// The latest remote state observed.
    remote:   RemoteDocument,
  },
}

impl From<upkeep_core::Error> for Error {
  fn from(e: upkeep_core::Error) -> Self {
    if e.is_not_found() { Self::NotFound(e) } else { Self::Validation(e) }
  }
}

impl Error {
  pub(crate) fn storage(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Storage(Box::new(e))
  }

  pub(crate) fn connectivity(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Connectivity(Box::new(e))
  }

  /// `true` when retrying the same sync later may succeed unchanged.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Connectivity(_) | Self::Conflict { .. } | Self::Storage(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
