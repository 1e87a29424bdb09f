//! HTTP Basic-auth extractor and standalone verifier.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use serde::Deserialize;
use strum::Display;

use crate::{AppState, error::Error};

/// What an authenticated user may do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
  /// Read and write documents.
  Editor,
  /// Read only.
  Viewer,
}

/// One account accepted by this server instance.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub role:          Role,
}

#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
  pub users: Vec<User>,
}

/// Present in a handler's arguments means the request was authenticated.
#[derive(Debug, Clone)]
pub struct Authenticated {
  pub username: String,
  pub role:     Role,
}

impl Authenticated {
  pub fn require_editor(&self) -> Result<(), Error> {
    match self.role {
      Role::Editor => Ok(()),
      Role::Viewer => Err(Error::Forbidden(format!("{} has read-only access", self.username))),
    }
  }
}

/// Verify credentials directly from headers.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Authenticated, Error> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val.strip_prefix("Basic ").ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  let user = config
    .users
    .iter()
    .find(|u| u.username == username)
    .ok_or(Error::Unauthorized)?;

  let parsed_hash = PasswordHash::new(&user.password_hash).map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(Authenticated { username: user.username.clone(), role: user.role })
}

impl FromRequestParts<AppState> for Authenticated {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState,
  ) -> Result<Self, Self::Rejection> {
    let auth = verify_auth(&parts.headers, &state.auth);
    if auth.is_err() {
      tracing::debug!(uri = %parts.uri, "rejected credentials");
    }
    auth
  }
}
