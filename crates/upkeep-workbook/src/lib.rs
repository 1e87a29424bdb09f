//! Workbook codec for Upkeep.
//!
//! Converts between a [`RecordStore`] and the single shared document that is
//! stored remotely: a JSON object holding three named tables (`Machines`,
//! `Tasks`, `LogEntries`), each a header row of column names followed by
//! value rows. Pure synchronous; no HTTP or database dependencies.
//!
//! # Quick start
//!
//! ```no_run
//! use upkeep_core::{RecordStore, schedule::Thresholds};
//!
//! let store = RecordStore::new(Thresholds::default());
//! let bytes = upkeep_workbook::encode(&store).unwrap();
//! let back = upkeep_workbook::decode(&bytes).unwrap();
//! assert!(back.is_empty());
//! ```

pub mod error;
mod parse;
pub mod schema;
mod serialize;

pub use error::{Error, Result};
pub use schema::TableName;
use upkeep_core::{
  RecordStore, log::LogEntry, machine::Machine, task::MaintenanceTask,
};

// ─── Public API
// ───────────────────────────────────────────────────────────────

/// Serialise every table of `store` into one document.
pub fn encode(store: &RecordStore) -> Result<Vec<u8>> { serialize::encode(store) }

/// Rebuild a store from a document.
///
/// The returned store carries default thresholds; derived task fields are
/// taken verbatim from the document until the caller recomputes them.
pub fn decode(bytes: &[u8]) -> Result<RecordStore> { parse::decode(bytes) }

/// Decode only the `Machines` table.
pub fn decode_machines(bytes: &[u8]) -> Result<Vec<Machine>> {
  parse::decode_machines(bytes)
}

/// Decode only the `Tasks` table.
pub fn decode_tasks(bytes: &[u8]) -> Result<Vec<MaintenanceTask>> {
  parse::decode_tasks(bytes)
}

/// Decode only the `LogEntries` table. A document without one yields an
/// empty list.
pub fn decode_log_entries(bytes: &[u8]) -> Result<Vec<LogEntry>> {
  parse::decode_log_entries(bytes)
}

// ─── Tests
// ────────────────────────────────────────────────────────────────────
