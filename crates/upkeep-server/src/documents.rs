//! [`DocumentStore`] — named documents with compare-and-swap replacement.
//!
//! Documents live in memory. When the store has a data directory, every
//! accepted write is also written there as one JSON file per key, replaced
//! atomically, and reloaded on startup.

use std::{
  collections::HashMap,
  io,
  path::{Path, PathBuf},
};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use upkeep_core::remote::VersionToken;
use upkeep_remote::wire::{decode_content, encode_content, version_token};

use crate::error::Error;

/// One stored document.
#[derive(Debug, Clone)]
pub struct Document {
  pub content:    Bytes,
  pub sha:        VersionToken,
  /// Number of accepted writes so far.
  pub generation: u64,
}

/// Result of an accepted write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Put {
  Created(VersionToken),
  Updated(VersionToken),
}

/// On-disk form.
#[derive(Serialize, Deserialize)]
struct DocumentFile {
  key:        String,
  generation: u64,
  sha:        String,
  content:    String,
}

pub struct DocumentStore {
  dir:  Option<PathBuf>,
  docs: Mutex<HashMap<String, Document>>,
}

impl DocumentStore {
  pub fn in_memory() -> Self { Self { dir: None, docs: Mutex::default() } }

  /// Open (or create) a store persisted under `dir`.
  pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
    let dir = dir.into();
    tokio::fs::create_dir_all(&dir).await?;

    let mut docs = HashMap::new();
    let mut entries = tokio::fs::read_dir(&dir).await?;
    while let Some(entry) = entries.next_entry().await? {
      let path = entry.path();
      if path.extension().is_none_or(|ext| ext != "json") {
        continue;
      }
      let file: DocumentFile = serde_json::from_slice(&tokio::fs::read(&path).await?)?;
      let content = decode_content(&file.content)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
      docs.insert(file.key, Document {
        content:    Bytes::from(content),
        sha:        VersionToken::new(file.sha),
        generation: file.generation,
      });
    }
    tracing::info!(documents = docs.len(), dir = %dir.display(), "document store opened");

    Ok(Self { dir: Some(dir), docs: Mutex::new(docs) })
  }

  pub async fn get(&self, key: &str) -> Option<Document> {
    self.docs.lock().await.get(key).cloned()
  }

  /// Replace `key` with `content` if `sha` names its current version.
  ///
  /// Creating a document requires `sha` to be absent; replacing one requires
  /// it to be present.
  pub async fn put(&self, key: &str, content: Bytes, sha: Option<&str>) -> Result<Put, Error> {
    let mut docs = self.docs.lock().await;
    let current = docs.get(key);

    let generation = match (current, sha) {
      (None, None) => 1,
      (None, Some(sha)) => {
        return Err(Error::Conflict(format!("{key} does not exist; cannot match sha {sha}")));
      }
      (Some(_), None) => {
        return Err(Error::Unprocessable(format!("{key} exists; a sha is required")));
      }
      (Some(doc), Some(sha)) if doc.sha.as_str() != sha => {
        return Err(Error::Conflict(format!("{key} is at {}, not {sha}", doc.sha)));
      }
      (Some(doc), Some(_)) => doc.generation + 1,
    };
    let created = current.is_none();

    let doc = Document {
      sha: version_token(generation, &content),
      content,
      generation,
    };
    if let Some(dir) = &self.dir {
      persist(dir, key, &doc).await?;
    }
    let sha = doc.sha.clone();
    docs.insert(key.to_owned(), doc);

    tracing::info!(key, %sha, generation, "document written");
    Ok(if created { Put::Created(sha) } else { Put::Updated(sha) })
  }
}

fn file_for(dir: &Path, key: &str) -> PathBuf {
  dir.join(format!("{}.json", hex::encode(key)))
}

async fn persist(dir: &Path, key: &str, doc: &Document) -> Result<(), Error> {
  let file = DocumentFile {
    key:        key.to_owned(),
    generation: doc.generation,
    sha:        doc.sha.as_str().to_owned(),
    content:    encode_content(&doc.content),
  };
  let path = file_for(dir, key);
  let tmp = path.with_extension("json.tmp");
  tokio::fs::write(&tmp, serde_json::to_vec(&file)?).await?;
  tokio::fs::rename(&tmp, &path).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn create_then_update_with_matching_sha() {
    let store = DocumentStore::in_memory();
    let Put::Created(v1) = store.put("doc", Bytes::from_static(b"one"), None).await.unwrap()
    else {
      panic!("expected create");
    };
    let Put::Updated(v2) =
      store.put("doc", Bytes::from_static(b"two"), Some(v1.as_str())).await.unwrap()
    else {
      panic!("expected update");
    };
    assert_ne!(v1, v2);

    let doc = store.get("doc").await.unwrap();
    assert_eq!(&doc.content[..], b"two");
    assert_eq!(doc.generation, 2);
  }

  #[tokio::test]
  async fn stale_or_missing_sha_is_refused() {
    let store = DocumentStore::in_memory();
    let Put::Created(v1) = store.put("doc", Bytes::from_static(b"one"), None).await.unwrap()
    else {
      panic!("expected create");
    };
    store.put("doc", Bytes::from_static(b"two"), Some(v1.as_str())).await.unwrap();

    let stale = store.put("doc", Bytes::from_static(b"three"), Some(v1.as_str())).await;
    assert!(matches!(stale, Err(Error::Conflict(_))));
    let blind = store.put("doc", Bytes::from_static(b"three"), None).await;
    assert!(matches!(blind, Err(Error::Unprocessable(_))));
    let phantom = store.put("other", Bytes::from_static(b"x"), Some("abc")).await;
    assert!(matches!(phantom, Err(Error::Conflict(_))));

    assert_eq!(&store.get("doc").await.unwrap().content[..], b"two");
  }

  #[tokio::test]
  async fn documents_survive_a_restart() {
    let dir = std::env::temp_dir().join(format!("upkeep-server-test-{}", std::process::id()));
    let sha = {
      let store = DocumentStore::open(&dir).await.unwrap();
      match store.put("plant/data.json", Bytes::from_static(b"kept"), None).await.unwrap() {
        Put::Created(sha) => sha,
        other => panic!("expected create, got {other:?}"),
      }
    };

    let store = DocumentStore::open(&dir).await.unwrap();
    let doc = store.get("plant/data.json").await.unwrap();
    assert_eq!(&doc.content[..], b"kept");
    assert_eq!(doc.sha, sha);
    assert_eq!(doc.generation, 1);

    let _ = std::fs::remove_dir_all(&dir);
  }
}
