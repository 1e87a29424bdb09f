//! Machines — the physical equipment that maintenance tasks hang off.
//!
//! Machines are never removed from the store. Retiring one flips its
//! `active` flag, which also deactivates every task that belongs to it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub type MachineId = i64;

// ─── Machine ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
  pub id:           MachineId,
  pub name:         String,
  pub model:        String,
  pub serial:       String,
  pub install_date: Option<NaiveDate>,
  /// Cumulative operating-hours counter as last reported.
  pub total_hours:  f64,
  pub department:   String,
  pub notes:        String,
  pub active:       bool,
  pub created_at:   Option<DateTime<Utc>>,
}

// ─── NewMachine ──────────────────────────────────────────────────────────────

/// Input to [`crate::RecordStore::insert_machine`].
/// The id and `created_at` are always assigned by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewMachine {
  pub name:         String,
  #[serde(default)]
  pub model:        String,
  #[serde(default)]
  pub serial:       String,
  #[serde(default)]
  pub install_date: Option<NaiveDate>,
  #[serde(default)]
  pub total_hours:  f64,
  #[serde(default)]
  pub department:   String,
  #[serde(default)]
  pub notes:        String,
}

impl NewMachine {
  /// Convenience constructor with all optional fields set to their defaults.
  pub fn new(name: impl Into<String>) -> Self {
    Self { name: name.into(), ..Self::default() }
  }

  pub(crate) fn validate(&self) -> Result<()> {
    if self.name.trim().is_empty() {
      return Err(Error::validation("machine name must not be empty"));
    }
    validate_hours(self.total_hours)
  }
}

// ─── MachinePatch ────────────────────────────────────────────────────────────

/// A partial update; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MachinePatch {
  pub name:         Option<String>,
  pub model:        Option<String>,
  pub serial:       Option<String>,
  pub install_date: Option<NaiveDate>,
  /// Overwrites the counter as-is; use
  /// [`crate::RecordStore::record_hours`] for raise-only semantics.
  pub total_hours:  Option<f64>,
  pub department:   Option<String>,
  pub notes:        Option<String>,
  pub active:       Option<bool>,
}

impl MachinePatch {
  pub(crate) fn validate(&self) -> Result<()> {
    if let Some(name) = &self.name
      && name.trim().is_empty()
    {
      return Err(Error::validation("machine name must not be empty"));
    }
    if let Some(hours) = self.total_hours {
      validate_hours(hours)?;
    }
    Ok(())
  }

  pub(crate) fn apply(self, machine: &mut Machine) {
    if let Some(v) = self.name {
      machine.name = v;
    }
    if let Some(v) = self.model {
      machine.model = v;
    }
    if let Some(v) = self.serial {
      machine.serial = v;
    }
    if let Some(v) = self.install_date {
      machine.install_date = Some(v);
    }
    if let Some(v) = self.total_hours {
      machine.total_hours = v;
    }
    if let Some(v) = self.department {
      machine.department = v;
    }
    if let Some(v) = self.notes {
      machine.notes = v;
    }
    if let Some(v) = self.active {
      machine.active = v;
    }
  }
}

/// Hour readings must be finite and non-negative.
pub(crate) fn validate_hours(hours: f64) -> Result<()> {
  if !hours.is_finite() || hours < 0.0 {
    return Err(Error::validation(format!(
      "operating hours must be a non-negative number, got {hours}"
    )));
  }
  Ok(())
}
