//! Error type for the remote transports.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("HTTP transport error: {0}")]
  Transport(#[from] reqwest::Error),

  #[error("remote did not answer within {0:?}")]
  Timeout(Duration),

  #[error("remote rejected the credentials (HTTP {0})")]
  Unauthorized(u16),

  #[error("unexpected HTTP {status} from remote: {body}")]
  Status { status: u16, body: String },

  #[error("malformed remote response: {0}")]
  Decode(String),

  #[error("remote is offline")]
  Offline,
}

impl Error {
  /// `true` for failures that say nothing about the document itself and are
  /// worth retrying later.
  pub fn is_transient(&self) -> bool {
    match self {
      Self::Transport(_) | Self::Timeout(_) | Self::Offline => true,
      Self::Status { status, .. } => *status >= 500,
      Self::Unauthorized(_) | Self::Decode(_) => false,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
