//! Maintenance log — the append-only service history.
//!
//! Entries are never updated or deleted. A mistaken entry is corrected by
//! appending another one.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{machine::MachineId, task::TaskId};

pub type LogId = i64;

/// One service event, immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
  pub id:             LogId,
  pub machine_id:     MachineId,
  pub task_id:        TaskId,
  pub performed_date: NaiveDate,
  pub hours_reading:  f64,
  pub technician:     String,
  pub parts_used:     String,
  pub notes:          String,
  /// Store-assigned; never changes after creation.
  pub recorded_at:    Option<DateTime<Utc>>,
}

/// Input to [`crate::RecordStore::append_log`].
/// `recorded_at` is always set by the store; it is not accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLogEntry {
  pub machine_id:     MachineId,
  pub task_id:        TaskId,
  pub performed_date: NaiveDate,
  pub hours_reading:  f64,
  #[serde(default)]
  pub technician:     String,
  #[serde(default)]
  pub parts_used:     String,
  #[serde(default)]
  pub notes:          String,
}
