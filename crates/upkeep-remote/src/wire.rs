//! JSON bodies of the contents protocol, shared with `upkeep-server`.
//!
//! ```text
//! GET  <base>/<key>   → 200 FileResponse | 404
//! PUT  <base>/<key>   ← PutRequest
//!                     → 201 (created) | 200 (updated) PutResponse
//!                     → 409 | 412 | 422 on a stale or missing `sha`
//! ```
//!
//! Document bytes travel base64-encoded; readers must tolerate embedded line
//! breaks.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use upkeep_core::remote::VersionToken;

use crate::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileResponse {
  pub content: String,
  pub sha:     String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutRequest {
  pub message: String,
  pub content: String,
  /// Omitted when creating the document.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sha:     Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub branch:  Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutResponse {
  pub content: PutContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutContent {
  pub sha: String,
}

pub fn encode_content(bytes: &[u8]) -> String { STANDARD.encode(bytes) }

/// Decode a base64 body, ignoring any whitespace inside it.
pub fn decode_content(text: &str) -> Result<Vec<u8>> {
  let compact: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
  STANDARD
    .decode(compact)
    .map_err(|e| Error::Decode(format!("content is not base64: {e}")))
}

/// Token of one document state: hex SHA-256 over the write generation and
/// the content, so rewriting identical bytes still yields a new token.
pub fn version_token(generation: u64, content: &[u8]) -> VersionToken {
  let mut hasher = Sha256::new();
  hasher.update(generation.to_be_bytes());
  hasher.update(content);
  VersionToken::new(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn content_with_line_breaks_decodes() {
    let encoded = encode_content(b"a fairly long document body, long enough to wrap");
    let wrapped: String = encoded
      .as_bytes()
      .chunks(16)
      .map(|c| std::str::from_utf8(c).unwrap())
      .collect::<Vec<_>>()
      .join("\n");
    assert_eq!(
      decode_content(&wrapped).unwrap(),
      b"a fairly long document body, long enough to wrap"
    );
  }

  #[test]
  fn invalid_base64_is_a_decode_error() {
    assert!(matches!(decode_content("!!not base64!!"), Err(Error::Decode(_))));
  }

  #[test]
  fn tokens_differ_per_generation() {
    let a = version_token(1, b"same");
    let b = version_token(2, b"same");
    assert_ne!(a, b);
    assert_eq!(a, version_token(1, b"same"));
    assert_eq!(a.as_str().len(), 64);
  }

  #[test]
  fn create_request_omits_sha() {
    let req = PutRequest {
      message: "init".into(),
      content: encode_content(b"x"),
      sha:     None,
      branch:  None,
    };
    let json = serde_json::to_value(&req).unwrap();
    assert!(json.get("sha").is_none());
    assert!(json.get("branch").is_none());
  }
}
