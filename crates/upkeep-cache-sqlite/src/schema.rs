//! SQL schema for the Upkeep local cache.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- Exactly one row, id = 1: the latest encoded workbook.
CREATE TABLE IF NOT EXISTS snapshot (
    id             INTEGER PRIMARY KEY CHECK (id = 1),
    content        BLOB    NOT NULL,
    pending_sync   INTEGER NOT NULL,   -- 0 | 1
    remote_version TEXT,               -- NULL until the first commit
    saved_at       TEXT    NOT NULL    -- ISO 8601 UTC
);

-- One row per save. Only ever pruned by age.
CREATE TABLE IF NOT EXISTS backups (
    backup_id INTEGER PRIMARY KEY AUTOINCREMENT,
    content   BLOB NOT NULL,
    saved_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS backups_saved_idx ON backups(saved_at);

PRAGMA user_version = 1;
";
