//! [`HttpRemote`] — the contents protocol over HTTPS.

use std::{fmt, time::Duration};

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use upkeep_core::remote::{
  RemoteDocument, RemoteStore, Version, VersionToken, WriteOutcome,
};

use crate::{
  Error, Result,
  wire::{FileResponse, PutRequest, PutResponse, decode_content, encode_content},
};

/// Connection settings for a remote document.
#[derive(Clone)]
pub struct RemoteConfig {
  /// e.g. `https://api.github.com/repos/acme/plant/contents`
  pub base_url: String,
  /// Path of the document below `base_url`.
  pub key:      String,
  /// Sent as a bearer token, or as the Basic-auth password when `username`
  /// is set.
  pub token:    Option<String>,
  pub username: Option<String>,
  pub branch:   Option<String>,
  /// Applies to each request separately.
  pub timeout:  Duration,
}

impl fmt::Debug for RemoteConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RemoteConfig")
      .field("base_url", &self.base_url)
      .field("key", &self.key)
      .field("token", &self.token.as_ref().map(|_| "<redacted>"))
      .field("username", &self.username)
      .field("branch", &self.branch)
      .field("timeout", &self.timeout)
      .finish()
  }
}

/// Async HTTP client for one remote document.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct HttpRemote {
  client: Client,
  config: RemoteConfig,
}

impl HttpRemote {
  pub fn new(config: RemoteConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(config.timeout)
      .user_agent(concat!("upkeep/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client, config })
  }

  pub fn config(&self) -> &RemoteConfig { &self.config }

  fn url(&self) -> String {
    format!(
      "{}/{}",
      self.config.base_url.trim_end_matches('/'),
      self.config.key.trim_start_matches('/')
    )
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match (&self.config.username, &self.config.token) {
      (Some(user), token) => req.basic_auth(user, token.as_ref()),
      (None, Some(token)) if !token.is_empty() => req.bearer_auth(token),
      _ => req,
    }
  }

  fn transport(&self, e: reqwest::Error) -> Error {
    if e.is_timeout() {
      Error::Timeout(self.config.timeout)
    } else {
      Error::Transport(e)
    }
  }

  async fn unexpected(&self, resp: Response) -> Error {
    let status = resp.status().as_u16();
    if matches!(status, 401 | 403) {
      return Error::Unauthorized(status);
    }
    let body = resp.text().await.unwrap_or_default();
    Error::Status { status, body }
  }
}

impl RemoteStore for HttpRemote {
  type Error = Error;

  async fn fetch(&self) -> Result<RemoteDocument> {
    let mut req = self.auth(self.client.get(self.url()));
    if let Some(branch) = &self.config.branch {
      req = req.query(&[("ref", branch)]);
    }
    let resp = req.send().await.map_err(|e| self.transport(e))?;

    match resp.status() {
      StatusCode::NOT_FOUND => {
        tracing::debug!(url = %self.url(), "remote document absent");
        Ok(RemoteDocument::absent())
      }
      s if s.is_success() => {
        let body: FileResponse = resp
          .json()
          .await
          .map_err(|e| Error::Decode(format!("fetch body: {e}")))?;
        let content = decode_content(&body.content)?;
        tracing::debug!(sha = %body.sha, bytes = content.len(), "fetched remote document");
        Ok(RemoteDocument {
          content: Some(content),
          version: Version::Token(VersionToken::new(body.sha)),
        })
      }
      _ => Err(self.unexpected(resp).await),
    }
  }

  async fn write_if_matches<'a>(
    &'a self,
    content: &'a [u8],
    expected: &'a Version,
    message: &'a str,
  ) -> Result<WriteOutcome> {
    let body = PutRequest {
      message: message.to_owned(),
      content: encode_content(content),
      sha:     expected.token().map(|t| t.as_str().to_owned()),
      branch:  self.config.branch.clone(),
    };
    let resp = self
      .auth(self.client.put(self.url()))
      .json(&body)
      .send()
      .await
      .map_err(|e| self.transport(e))?;

    let status = resp.status();
    match status {
      StatusCode::CONFLICT
      | StatusCode::PRECONDITION_FAILED
      | StatusCode::UNPROCESSABLE_ENTITY => {
        tracing::debug!(%status, %expected, "conditional write rejected");
        Ok(WriteOutcome::Conflict)
      }
      s if s.is_success() => {
        let body: PutResponse = resp
          .json()
          .await
          .map_err(|e| Error::Decode(format!("write body: {e}")))?;
        Ok(WriteOutcome::Committed {
          version: VersionToken::new(body.content.sha),
          created: status == StatusCode::CREATED,
        })
      }
      _ => Err(self.unexpected(resp).await),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(base: &str, key: &str) -> RemoteConfig {
    RemoteConfig {
      base_url: base.into(),
      key:      key.into(),
      token:    Some("secret".into()),
      username: None,
      branch:   None,
      timeout:  Duration::from_secs(5),
    }
  }

  #[test]
  fn url_joins_base_and_key_with_one_slash() {
    let remote = HttpRemote::new(config("http://host/contents/", "/plant/data.json")).unwrap();
    assert_eq!(remote.url(), "http://host/contents/plant/data.json");
  }

  #[test]
  fn debug_output_hides_the_token() {
    let rendered = format!("{:?}", config("http://host", "doc"));
    assert!(!rendered.contains("secret"));
    assert!(rendered.contains("<redacted>"));
  }

  #[tokio::test]
  async fn unreachable_host_is_a_transient_error() {
    // Port 9 (discard) on localhost is not expected to accept connections.
    let mut cfg = config("http://127.0.0.1:9", "doc");
    cfg.timeout = Duration::from_millis(500);
    let remote = HttpRemote::new(cfg).unwrap();
    let err = remote.fetch().await.unwrap_err();
    assert!(err.is_transient(), "{err}");
  }
}
