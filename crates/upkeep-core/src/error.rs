//! Error types for `upkeep-core`.

use thiserror::Error;

use crate::{machine::MachineId, task::TaskId};

#[derive(Debug, Error)]
pub enum Error {
  /// Malformed input rejected before any mutation took place.
  #[error("validation failed: {0}")]
  Validation(String),

  #[error("machine not found: {0}")]
  MachineNotFound(MachineId),

  #[error("task not found: {0}")]
  TaskNotFound(TaskId),
}

impl Error {
  pub(crate) fn validation(msg: impl Into<String>) -> Self {
    Self::Validation(msg.into())
  }

  /// `true` for the not-found family of errors.
  pub fn is_not_found(&self) -> bool {
    matches!(self, Self::MachineNotFound(_) | Self::TaskNotFound(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
