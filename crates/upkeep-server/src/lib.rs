//! Reference server for the Upkeep contents protocol.
//!
//! Exposes an axum [`Router`] serving `GET`/`PUT /contents/{key}` with the
//! compare-and-swap semantics `upkeep_remote::HttpRemote` expects, for teams
//! that do not keep their workbook in a hosted repository.

pub mod auth;
pub mod documents;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, Path, State},
  http::StatusCode,
  response::{IntoResponse, Response},
  routing::get,
};
use bytes::Bytes;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use upkeep_remote::wire::{
  FileResponse, PutContent, PutRequest, PutResponse, decode_content, encode_content,
};

use auth::{AuthConfig, Authenticated, User};
use documents::{DocumentStore, Put};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Line width of base64 bodies in responses.
const BASE64_LINE: usize = 60;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `upkeep-server.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:     String,
  #[serde(default = "default_port")]
  pub port:     u16,
  /// Where documents are persisted; memory only when unset.
  #[serde(default)]
  pub data_dir: Option<PathBuf>,
  #[serde(default)]
  pub users:    Vec<User>,
}

fn default_host() -> String { "127.0.0.1".to_owned() }

fn default_port() -> u16 { 8730 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState {
  pub documents: Arc<DocumentStore>,
  pub auth:      Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/contents/{*key}", get(get_document).put(put_document))
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

fn check_key(key: &str) -> Result<(), Error> {
  if key.is_empty() || key.split('/').any(|seg| seg.is_empty() || seg == "..") {
    return Err(Error::BadRequest(format!("invalid document key {key:?}")));
  }
  Ok(())
}

/// Base64 with a line break every [`BASE64_LINE`] characters.
fn wrapped_base64(content: &[u8]) -> String {
  let encoded = encode_content(content);
  let mut out = String::with_capacity(encoded.len() + encoded.len() / BASE64_LINE + 1);
  for (i, ch) in encoded.chars().enumerate() {
    if i > 0 && i % BASE64_LINE == 0 {
      out.push('\n');
    }
    out.push(ch);
  }
  out
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn get_document(
  State(state): State<AppState>,
  _auth: Authenticated,
  Path(key): Path<String>,
) -> Result<Json<FileResponse>, Error> {
  check_key(&key)?;
  let doc = state.documents.get(&key).await.ok_or(Error::NotFound)?;
  Ok(Json(FileResponse {
    content: wrapped_base64(&doc.content),
    sha:     doc.sha.to_string(),
  }))
}

async fn put_document(
  State(state): State<AppState>,
  auth: Authenticated,
  Path(key): Path<String>,
  body: Bytes,
) -> Result<Response, Error> {
  check_key(&key)?;
  auth.require_editor()?;

  let req: PutRequest =
    serde_json::from_slice(&body).map_err(|e| Error::BadRequest(e.to_string()))?;
  let content = decode_content(&req.content).map_err(|e| Error::BadRequest(e.to_string()))?;
  if let Some(branch) = &req.branch {
    tracing::debug!(%branch, "branch ignored by this server");
  }

  let put = state
    .documents
    .put(&key, Bytes::from(content), req.sha.as_deref())
    .await?;
  tracing::info!(user = %auth.username, key, message = %req.message, "accepted write");

  let (status, sha) = match put {
    Put::Created(sha) => (StatusCode::CREATED, sha),
    Put::Updated(sha) => (StatusCode::OK, sha),
  };
  let body = PutResponse { content: PutContent { sha: sha.to_string() } };
  Ok((status, Json(body)).into_response())
}

// ─── Integration tests ────────────────────────────────────────────────────────
