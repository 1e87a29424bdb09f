//! Workbook encoder.
//!
//! Every table is written as a header row of column names plus one JSON array
//! per record, in the fixed column order from [`crate::schema`].

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use upkeep_core::{
  RecordStore, log::LogEntry, machine::Machine, task::MaintenanceTask,
};

use crate::{
  error::Result,
  schema::{FORMAT, TableName, VERSION},
};

#[derive(Serialize)]
struct Document<'a> {
  format:  &'a str,
  version: u32,
  tables:  BTreeMap<&'a str, Table>,
}

#[derive(Serialize)]
struct Table {
  columns: &'static [&'static str],
  rows:    Vec<Vec<Value>>,
}

// ─── Cell helpers ─────────────────────────────────────────────────────────────

fn date_cell(d: Option<NaiveDate>) -> Value {
  d.map_or(Value::Null, |d| Value::String(d.format("%Y-%m-%d").to_string()))
}

fn datetime_cell(dt: Option<DateTime<Utc>>) -> Value {
  dt.map_or(Value::Null, |dt| Value::String(dt.to_rfc3339()))
}

fn hours_cell(h: Option<f64>) -> Value { h.map_or(Value::Null, |h| json!(h)) }

// ─── Rows ─────────────────────────────────────────────────────────────────────

fn machine_row(m: &Machine) -> Vec<Value> {
  vec![
    json!(m.id),
    json!(m.name),
    json!(m.model),
    json!(m.serial),
    date_cell(m.install_date),
    json!(m.total_hours),
    json!(m.department),
    json!(m.notes),
    json!(m.active),
    datetime_cell(m.created_at),
  ]
}

fn task_row(t: &MaintenanceTask) -> Vec<Value> {
  vec![
    json!(t.id),
    json!(t.machine_id),
    json!(t.task_type),
    json!(t.interval_value),
    json!(t.interval_unit.as_ref()),
    date_cell(t.last_date),
    json!(t.last_hours),
    date_cell(t.next_due_date),
    hours_cell(t.next_due_hours),
    json!(t.remaining),
    json!(t.status.as_ref()),
    json!(t.description),
    json!(t.active),
    datetime_cell(t.created_at),
  ]
}

fn log_row(l: &LogEntry) -> Vec<Value> {
  vec![
    json!(l.id),
    json!(l.machine_id),
    json!(l.task_id),
    date_cell(Some(l.performed_date)),
    json!(l.hours_reading),
    json!(l.technician),
    json!(l.parts_used),
    json!(l.notes),
    datetime_cell(l.recorded_at),
  ]
}

// ─── Document ─────────────────────────────────────────────────────────────────

pub(crate) fn encode(store: &RecordStore) -> Result<Vec<u8>> {
  let mut tables = BTreeMap::new();
  tables.insert(TableName::Machines.as_str(), Table {
    columns: TableName::Machines.columns(),
    rows:    store.machines().map(machine_row).collect(),
  });
  tables.insert(TableName::Tasks.as_str(), Table {
    columns: TableName::Tasks.columns(),
    rows:    store.tasks().map(task_row).collect(),
  });
  tables.insert(TableName::LogEntries.as_str(), Table {
    columns: TableName::LogEntries.columns(),
    rows:    store.logs().map(log_row).collect(),
  });

  let doc = Document { format: FORMAT, version: VERSION, tables };
  Ok(serde_json::to_vec_pretty(&doc)?)
}
