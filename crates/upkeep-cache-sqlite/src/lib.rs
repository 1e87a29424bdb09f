//! SQLite backend for the Upkeep local cache.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Besides the latest snapshot the cache
//! keeps a timestamped copy of every save, pruned by age.

mod cache;
mod schema;

pub mod error;

pub use cache::{BackupInfo, SqliteCache};
pub use error::{Error, Result};
