//! Workbook decoder.
//!
//! Decoding is lenient about everything except row identity:
//!
//! - columns are located by name (case-insensitive), so their order does not
//!   matter and unknown extra columns are ignored;
//! - a missing optional column, a short row, `null`, or an empty cell yields
//!   the field's default (`""`, `0`, `None`, `active = true`);
//! - cells written by other tools are accepted in loose forms: numbers as
//!   strings, booleans as `yes`/`no`/`1`/`0`, dates with a time part.
//!
//! Only a missing required table, a missing key column, or a key cell that is
//! not an integer is a [`crate::Error`].

use std::{collections::HashMap, str::FromStr};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use upkeep_core::{
  RecordStore,
  log::LogEntry,
  machine::Machine,
  task::{IntervalUnit, MaintenanceTask, Status},
};

use crate::{
  error::{Error, Result},
  schema::{FORMAT, TableName, VERSION},
};

// ─── Document envelope ────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct RawDocument {
  #[serde(default)]
  format:  Option<String>,
  #[serde(default)]
  version: Option<u32>,
  tables:  HashMap<String, Value>,
}

#[derive(Deserialize)]
struct RawTable {
  columns: Vec<String>,
  #[serde(default)]
  rows:    Vec<Vec<Value>>,
}

fn read_document(bytes: &[u8]) -> Result<RawDocument> {
  let doc: RawDocument = serde_json::from_slice(bytes)?;
  if let Some(format) = &doc.format
    && format != FORMAT
  {
    return Err(Error::UnsupportedFormat(format.clone()));
  }
  if let Some(version) = doc.version
    && version > VERSION
  {
    tracing::warn!(version, supported = VERSION, "workbook written by a newer schema");
  }
  Ok(doc)
}

/// Locate `name` in the document. `Ok(None)` when the table is absent.
fn read_table(doc: &RawDocument, name: TableName) -> Result<Option<RawTable>> {
  let Some(value) = doc
    .tables
    .iter()
    .find(|(k, _)| k.eq_ignore_ascii_case(name.as_str()))
    .map(|(_, v)| v)
  else {
    return Ok(None);
  };
  let table: RawTable = serde_json::from_value(value.clone())
    .map_err(|e| Error::MalformedTable(name, e.to_string()))?;
  Ok(Some(table))
}

// ─── Row access ───────────────────────────────────────────────────────────────

/// Column-name → index lookup for one table.
struct Columns {
  table: TableName,
  index: HashMap<String, usize>,
}

impl Columns {
  fn new(table: TableName, header: &[String]) -> Result<Self> {
    let mut index = HashMap::new();
    for (i, name) in header.iter().enumerate() {
      index.entry(name.trim().to_ascii_lowercase()).or_insert(i);
    }
    for &column in table.key_columns() {
      if !index.contains_key(column) {
        return Err(Error::MissingColumn { table, column });
      }
    }
    Ok(Self { table, index })
  }

  fn row<'a>(&'a self, number: usize, cells: &'a [Value]) -> Row<'a> {
    Row { columns: self, number, cells }
  }
}

struct Row<'a> {
  columns: &'a Columns,
  /// 1-based, for error messages.
  number:  usize,
  cells:   &'a [Value],
}

impl Row<'_> {
  fn raw(&self, column: &str) -> Option<&Value> {
    let i = *self.columns.index.get(column)?;
    self.cells.get(i).filter(|v| !v.is_null())
  }

  /// The cell under `column` for typed reads, treating blanks as absent.
  fn cell(&self, column: &str) -> Option<&Value> {
    self.raw(column).filter(|v| !matches!(v, Value::String(s) if s.trim().is_empty()))
  }

  /// Trimmed text of a typed cell.
  fn text(&self, column: &str) -> Option<String> {
    self.cell(column).map(|v| match v {
      Value::String(s) => s.trim().to_owned(),
      other => other.to_string(),
    })
  }

  /// Free text, kept exactly as stored.
  fn string(&self, column: &str) -> String {
    match self.raw(column) {
      Some(Value::String(s)) => s.clone(),
      Some(other) => other.to_string(),
      None => String::new(),
    }
  }

  fn number(&self, column: &str) -> Option<f64> {
    let parsed = match self.cell(column)? {
      Value::Number(n) => n.as_f64(),
      Value::String(s) => s.trim().parse().ok(),
      _ => None,
    };
    if parsed.is_none() {
      self.skipped(column);
    }
    parsed.filter(|n: &f64| n.is_finite())
  }

  fn bool(&self, column: &str, default: bool) -> bool {
    let Some(cell) = self.cell(column) else { return default };
    let parsed = match cell {
      Value::Bool(b) => Some(*b),
      Value::Number(n) => n.as_f64().map(|n| n != 0.0),
      Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
      },
      _ => None,
    };
    parsed.unwrap_or_else(|| {
      self.skipped(column);
      default
    })
  }

  fn parsed<T: FromStr>(&self, column: &str) -> Option<T> {
    let text = self.text(column)?;
    let parsed = text.parse().ok();
    if parsed.is_none() {
      self.skipped(column);
    }
    parsed
  }

  fn date(&self, column: &str) -> Option<NaiveDate> {
    let text = self.text(column)?;
    let parsed = parse_date(&text);
    if parsed.is_none() {
      self.skipped(column);
    }
    parsed
  }

  fn datetime(&self, column: &str) -> Option<DateTime<Utc>> {
    let text = self.text(column)?;
    let parsed = parse_datetime(&text);
    if parsed.is_none() {
      self.skipped(column);
    }
    parsed
  }

  /// A key column: must hold an integer.
  fn key(&self, column: &'static str) -> Result<i64> {
    let invalid = |value: String| Error::InvalidKey {
      table: self.columns.table,
      row: self.number,
      column,
      value,
    };
    match self.cell(column) {
      Some(Value::Number(n)) => n
        .as_i64()
        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
        .ok_or_else(|| invalid(n.to_string())),
      Some(Value::String(s)) => {
        let s = s.trim();
        s.parse::<i64>()
          .ok()
          .or_else(|| {
            s.parse::<f64>().ok().filter(|f| f.fract() == 0.0).map(|f| f as i64)
          })
          .ok_or_else(|| invalid(format!("{s:?}")))
      }
      Some(other) => Err(invalid(other.to_string())),
      None => Err(invalid("<empty>".to_owned())),
    }
  }

  fn skipped(&self, column: &str) {
    tracing::debug!(
      table = %self.columns.table,
      row = self.number,
      column,
      "unreadable cell replaced by default"
    );
  }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .ok()
    .or_else(|| parse_datetime(s).map(|dt| dt.date_naive()))
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .map(|naive| naive.and_utc())
    .or_else(|| {
      NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
    })
}

// ─── Tables ───────────────────────────────────────────────────────────────────

fn rows<T>(
  doc: &RawDocument,
  name: TableName,
  required: bool,
  build: impl Fn(&Row<'_>) -> Result<T>,
) -> Result<Vec<T>> {
  let Some(table) = read_table(doc, name)? else {
    if required {
      return Err(Error::MissingTable(name));
    }
    return Ok(Vec::new());
  };
  let columns = Columns::new(name, &table.columns)?;
  table
    .rows
    .iter()
    .enumerate()
    .map(|(i, cells)| build(&columns.row(i + 1, cells)))
    .collect()
}

fn machine(row: &Row<'_>) -> Result<Machine> {
  Ok(Machine {
    id:           row.key("id")?,
    name:         row.string("name"),
    model:        row.string("model"),
    serial:       row.string("serial"),
    install_date: row.date("install_date"),
    total_hours:  row.number("total_hours").unwrap_or(0.0),
    department:   row.string("department"),
    notes:        row.string("notes"),
    active:       row.bool("active", true),
    created_at:   row.datetime("created_at"),
  })
}

fn task(row: &Row<'_>) -> Result<MaintenanceTask> {
  let id = row.key("id")?;
  let interval = row.number("interval_value").unwrap_or(0.0).round();
  let interval_value = if interval > f64::from(u32::MAX) {
    tracing::warn!(task = id, interval, "task interval out of range; using {}", u32::MAX);
    u32::MAX
  } else if interval >= 1.0 {
    interval as u32
  } else {
    tracing::warn!(task = id, interval, "non-positive task interval; using 1");
    1
  };

  Ok(MaintenanceTask {
    id,
    machine_id: row.key("machine_id")?,
    task_type: row.string("task_type"),
    interval_value,
    interval_unit: row.parsed("interval_unit").unwrap_or(IntervalUnit::Hours),
    last_date: row.date("last_date"),
    last_hours: row.number("last_hours").unwrap_or(0.0),
    next_due_date: row.date("next_due_date"),
    next_due_hours: row.number("next_due_hours"),
    remaining: row.number("remaining").unwrap_or(0.0),
    status: row.parsed("status").unwrap_or(Status::Normal),
    description: row.string("description"),
    active: row.bool("active", true),
    created_at: row.datetime("created_at"),
  })
}

fn log_entry(row: &Row<'_>) -> Result<LogEntry> {
  let id = row.key("id")?;
  let performed_date = row.date("performed_date").unwrap_or_else(|| {
    tracing::warn!(log = id, "log entry without a performed date");
    NaiveDate::default()
  });
  Ok(LogEntry {
    id,
    machine_id: row.key("machine_id")?,
    task_id: row.key("task_id")?,
    performed_date,
    hours_reading: row.number("hours_reading").unwrap_or(0.0),
    technician: row.string("technician"),
    parts_used: row.string("parts_used"),
    notes: row.string("notes"),
    recorded_at: row.datetime("recorded_at"),
  })
}

// ─── Entry points ─────────────────────────────────────────────────────────────

pub(crate) fn decode(bytes: &[u8]) -> Result<RecordStore> {
  let doc = read_document(bytes)?;
  let machines = rows(&doc, TableName::Machines, true, machine)?;
  let tasks = rows(&doc, TableName::Tasks, true, task)?;
  // Older documents predate the log table.
  let logs = rows(&doc, TableName::LogEntries, false, log_entry)?;
  Ok(RecordStore::from_rows(machines, tasks, logs))
}

pub(crate) fn decode_machines(bytes: &[u8]) -> Result<Vec<Machine>> {
  rows(&read_document(bytes)?, TableName::Machines, true, machine)
}

pub(crate) fn decode_tasks(bytes: &[u8]) -> Result<Vec<MaintenanceTask>> {
  rows(&read_document(bytes)?, TableName::Tasks, true, task)
}

pub(crate) fn decode_log_entries(bytes: &[u8]) -> Result<Vec<LogEntry>> {
  rows(&read_document(bytes)?, TableName::LogEntries, false, log_entry)
}
