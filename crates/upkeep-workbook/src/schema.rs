//! The fixed column layout of each workbook table.
//!
//! Column order is part of the format and must only ever grow at the end;
//! readers look columns up by name, so older and newer writers interoperate.

use strum::Display;

/// Value of the top-level `format` key.
pub const FORMAT: &str = "upkeep-workbook";

/// Schema version written by this build.
pub const VERSION: u32 = 1;

/// The three tables of a workbook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TableName {
  Machines,
  Tasks,
  LogEntries,
}

pub const MACHINE_COLUMNS: &[&str] = &[
  "id",
  "name",
  "model",
  "serial",
  "install_date",
  "total_hours",
  "department",
  "notes",
  "active",
  "created_at",
];

pub const TASK_COLUMNS: &[&str] = &[
  "id",
  "machine_id",
  "task_type",
  "interval_value",
  "interval_unit",
  "last_date",
  "last_hours",
  "next_due_date",
  "next_due_hours",
  "remaining",
  "status",
  "description",
  "active",
  "created_at",
];

pub const LOG_COLUMNS: &[&str] = &[
  "id",
  "machine_id",
  "task_id",
  "performed_date",
  "hours_reading",
  "technician",
  "parts_used",
  "notes",
  "recorded_at",
];

impl TableName {
  /// Key of the table inside the document's `tables` object.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Machines => "Machines",
      Self::Tasks => "Tasks",
      Self::LogEntries => "LogEntries",
    }
  }

  pub fn columns(self) -> &'static [&'static str] {
    match self {
      Self::Machines => MACHINE_COLUMNS,
      Self::Tasks => TASK_COLUMNS,
      Self::LogEntries => LOG_COLUMNS,
    }
  }

  /// Columns without which no row of the table can be interpreted.
  pub fn key_columns(self) -> &'static [&'static str] {
    match self {
      Self::Machines => &["id"],
      Self::Tasks => &["id", "machine_id"],
      Self::LogEntries => &["id", "machine_id", "task_id"],
    }
  }
}
