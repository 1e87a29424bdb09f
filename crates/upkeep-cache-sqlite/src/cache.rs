//! [`SqliteCache`] — the SQLite implementation of [`LocalCache`].

use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::OptionalExtension as _;
use upkeep_core::{
  cache::{CachedSnapshot, LocalCache},
  remote::{Version, VersionToken},
};

use crate::{Error, Result, schema::SCHEMA};

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Fixed-width UTC form, so stored timestamps order correctly as text.
fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Cache ───────────────────────────────────────────────────────────────────

/// Metadata of one stored backup.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupInfo {
  pub id:       i64,
  pub saved_at: DateTime<Utc>,
  /// Size of the stored document in bytes.
  pub size:     usize,
}

/// Local snapshot cache backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteCache {
  conn: tokio_rusqlite::Connection,
}

impl SqliteCache {
  /// Open (or create) a cache at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let cache = Self { conn };
    cache.init_schema().await?;
    Ok(cache)
  }

  /// Open an in-memory cache, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let cache = Self { conn };
    cache.init_schema().await?;
    Ok(cache)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Every stored backup, newest first.
  pub async fn list_backups(&self) -> Result<Vec<BackupInfo>> {
    let raw: Vec<(i64, String, i64)> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT backup_id, saved_at, length(content) FROM backups
           ORDER BY saved_at DESC, backup_id DESC",
        )?;
        let rows = stmt
          .query_map([], |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)))?
          .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
      })
      .await?;

    raw
      .into_iter()
      .map(|(id, saved_at, size)| {
        Ok(BackupInfo {
          id,
          saved_at: decode_dt(&saved_at)?,
          size: usize::try_from(size).unwrap_or_default(),
        })
      })
      .collect()
  }

  /// The content of backup `id`, if it still exists.
  pub async fn backup(&self, id: i64) -> Result<Option<Vec<u8>>> {
    Ok(
      self
        .conn
        .call(move |conn| {
          Ok(
            conn
              .query_row(
                "SELECT content FROM backups WHERE backup_id = ?1",
                rusqlite::params![id],
                |r| r.get(0),
              )
              .optional()?,
          )
        })
        .await?,
    )
  }

  /// Delete backups saved before `older_than`. Returns how many were removed.
  pub async fn prune_backups(&self, older_than: DateTime<Utc>) -> Result<usize> {
    let cutoff = encode_dt(older_than);
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM backups WHERE saved_at < ?1",
          rusqlite::params![cutoff],
        )?)
      })
      .await?;
    if removed > 0 {
      tracing::info!(removed, %older_than, "pruned old backups");
    }
    Ok(removed)
  }
}

// ─── LocalCache impl ─────────────────────────────────────────────────────────

impl LocalCache for SqliteCache {
  type Error = Error;

  async fn save(&self, content: Vec<u8>, pending_sync: bool) -> Result<()> {
    let saved_at = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // `remote_version` is left untouched on conflict.
        tx.execute(
          "INSERT INTO snapshot (id, content, pending_sync, remote_version, saved_at)
           VALUES (1, ?1, ?2, NULL, ?3)
           ON CONFLICT(id) DO UPDATE SET
             content      = excluded.content,
             pending_sync = excluded.pending_sync,
             saved_at     = excluded.saved_at",
          rusqlite::params![content, pending_sync, saved_at],
        )?;
        tx.execute(
          "INSERT INTO backups (content, saved_at) VALUES (?1, ?2)",
          rusqlite::params![content, saved_at],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn load(&self) -> Result<Option<CachedSnapshot>> {
    let raw: Option<(Vec<u8>, bool, Option<String>, String)> = self
      .conn
      .call(|conn| {
        Ok(
          conn
            .query_row(
              "SELECT content, pending_sync, remote_version, saved_at
               FROM snapshot WHERE id = 1",
              [],
              |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(content, pending_sync, remote_version, saved_at)| {
        Ok(CachedSnapshot {
          content,
          pending_sync,
          remote_version: Version::from(remote_version.map(VersionToken::new)),
          saved_at: decode_dt(&saved_at)?,
        })
      })
      .transpose()
  }

  async fn mark_synced(&self, version: VersionToken) -> Result<()> {
    let token = version.as_str().to_owned();
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE snapshot SET pending_sync = 0, remote_version = ?1 WHERE id = 1",
          rusqlite::params![token],
        )?)
      })
      .await?;
    if updated == 0 {
      tracing::warn!(%version, "mark_synced on an empty cache");
    }
    Ok(())
  }
}
