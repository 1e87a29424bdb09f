//! Maintenance tasks — recurring obligations attached to a machine.
//!
//! A task recurs on exactly one interval unit. The unit decides which of the
//! two next-due fields is authoritative; the other one is always `None`.
//! Derived fields (`next_due_*`, `remaining`, `status`) are written only by
//! [`crate::schedule`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result, machine::MachineId};

pub type TaskId = i64;

// ─── Interval unit ───────────────────────────────────────────────────────────

/// The measurement basis on which a task recurs.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum IntervalUnit {
  /// Elapsed operating hours on the machine's counter.
  #[default]
  Hours,
  Days,
  Weeks,
  Months,
  Years,
}

impl IntervalUnit {
  pub fn is_calendar(self) -> bool { !matches!(self, Self::Hours) }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Health of a task. Variants are ordered by severity, so `Overdue` is the
/// maximum.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Status {
  #[default]
  Normal,
  Warning,
  Critical,
  Overdue,
}

// ─── MaintenanceTask ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceTask {
  pub id:             TaskId,
  pub machine_id:     MachineId,
  pub task_type:      String,
  /// Always positive.
  pub interval_value: u32,
  pub interval_unit:  IntervalUnit,
  /// `None` means the task has never been performed.
  pub last_date:      Option<NaiveDate>,
  pub last_hours:     f64,
  pub next_due_date:  Option<NaiveDate>,
  pub next_due_hours: Option<f64>,
  /// Signed distance to the next-due point, in `interval_unit`s.
  pub remaining:      f64,
  pub status:         Status,
  pub description:    String,
  pub active:         bool,
  pub created_at:     Option<DateTime<Utc>>,
}

// ─── NewTask ─────────────────────────────────────────────────────────────────

/// Input to [`crate::RecordStore::insert_task`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTask {
  pub machine_id:     MachineId,
  pub task_type:      String,
  pub interval_value: u32,
  pub interval_unit:  IntervalUnit,
  /// Defaults to the insertion date.
  #[serde(default)]
  pub last_date:      Option<NaiveDate>,
  /// Defaults to the machine's current counter.
  #[serde(default)]
  pub last_hours:     Option<f64>,
  #[serde(default)]
  pub description:    String,
}

impl NewTask {
  pub fn new(
    machine_id: MachineId,
    task_type: impl Into<String>,
    interval_value: u32,
    interval_unit: IntervalUnit,
  ) -> Self {
    Self {
      machine_id,
      task_type: task_type.into(),
      interval_value,
      interval_unit,
      last_date: None,
      last_hours: None,
      description: String::new(),
    }
  }

  pub(crate) fn validate(&self) -> Result<()> {
    validate_task_type(&self.task_type)?;
    validate_interval(self.interval_value)?;
    if let Some(hours) = self.last_hours {
      crate::machine::validate_hours(hours)?;
    }
    Ok(())
  }
}

// ─── TaskPatch ───────────────────────────────────────────────────────────────

/// A partial update of the hand-editable task fields. Derived fields cannot
/// be patched; the store recomputes them after every patch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskPatch {
  pub task_type:      Option<String>,
  pub interval_value: Option<u32>,
  pub interval_unit:  Option<IntervalUnit>,
  pub last_date:      Option<NaiveDate>,
  pub last_hours:     Option<f64>,
  pub description:    Option<String>,
  pub active:         Option<bool>,
}

impl TaskPatch {
  pub(crate) fn validate(&self) -> Result<()> {
    if let Some(t) = &self.task_type {
      validate_task_type(t)?;
    }
    if let Some(v) = self.interval_value {
      validate_interval(v)?;
    }
    if let Some(hours) = self.last_hours {
      crate::machine::validate_hours(hours)?;
    }
    Ok(())
  }

  pub(crate) fn apply(self, task: &mut MaintenanceTask) {
    if let Some(v) = self.task_type {
      task.task_type = v;
    }
    if let Some(v) = self.interval_value {
      task.interval_value = v;
    }
    if let Some(v) = self.interval_unit {
      task.interval_unit = v;
    }
    if let Some(v) = self.last_date {
      task.last_date = Some(v);
    }
    if let Some(v) = self.last_hours {
      task.last_hours = v;
    }
    if let Some(v) = self.description {
      task.description = v;
    }
    if let Some(v) = self.active {
      task.active = v;
    }
  }
}

// ─── Completion ──────────────────────────────────────────────────────────────

/// A report that a task was carried out. Turned into a
/// [`crate::log::LogEntry`] and a rollover of the task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
  pub performed_at: NaiveDate,
  /// Machine counter reading at the time of service.
  pub hours:        f64,
  #[serde(default)]
  pub technician:   String,
  #[serde(default)]
  pub parts_used:   String,
  #[serde(default)]
  pub notes:        String,
}

impl Completion {
  pub fn new(performed_at: NaiveDate, hours: f64) -> Self {
    Self {
      performed_at,
      hours,
      technician: String::new(),
      parts_used: String::new(),
      notes: String::new(),
    }
  }
}

fn validate_task_type(task_type: &str) -> Result<()> {
  if task_type.trim().is_empty() {
    return Err(Error::validation("task type must not be empty"));
  }
  Ok(())
}

fn validate_interval(value: u32) -> Result<()> {
  if value == 0 {
    return Err(Error::validation("interval value must be greater than zero"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_orders_by_severity() {
    assert!(Status::Normal < Status::Warning);
    assert!(Status::Warning < Status::Critical);
    assert!(Status::Critical < Status::Overdue);
  }

  #[test]
  fn unit_parses_case_insensitively() {
    assert_eq!("Months".parse::<IntervalUnit>().unwrap(), IntervalUnit::Months);
    assert_eq!(IntervalUnit::Weeks.to_string(), "weeks");
    assert!("fortnights".parse::<IntervalUnit>().is_err());
  }

  #[test]
  fn status_serializes_lowercase() {
    let json = serde_json::to_string(&Status::Critical).unwrap();
    assert_eq!(json, "\"critical\"");
  }

  #[test]
  fn zero_interval_is_rejected() {
    let task = NewTask::new(1, "oil change", 0, IntervalUnit::Hours);
    assert!(matches!(task.validate(), Err(Error::Validation(_))));
  }
}
