//! Error types and axum `IntoResponse` implementation.

use axum::{
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,
  #[error("forbidden: {0}")]
  Forbidden(String),
  #[error("not found")]
  NotFound,
  /// The supplied `sha` does not match the current document.
  #[error("conflict: {0}")]
  Conflict(String),
  /// A write that must name the current `sha` did not.
  #[error("unprocessable: {0}")]
  Unprocessable(String),
  #[error("bad request: {0}")]
  BadRequest(String),
  #[error("storage error: {0}")]
  Storage(#[from] std::io::Error),
  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized => {
        let mut res = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Basic realm=\"upkeep\""),
        );
        res
      }
      Error::Forbidden(msg) => (StatusCode::FORBIDDEN, msg).into_response(),
      Error::NotFound => (StatusCode::NOT_FOUND, "Not Found").into_response(),
      Error::Conflict(msg) => (StatusCode::CONFLICT, msg).into_response(),
      Error::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg).into_response(),
      Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
      Error::Storage(e) => {
        tracing::error!(error = %e, "document storage failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
      }
      Error::Json(e) => {
        tracing::error!(error = %e, "document file is corrupt");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
      }
    }
  }
}
