//! Due-date, remaining-time and status computation for maintenance tasks.
//!
//! Everything here is pure: no clock, no I/O. Callers pass "today" and the
//! machine's current counter explicitly.
//!
//! Remaining amounts are signed and expressed in the task's own interval
//! unit (hours, days, weeks, months or years). They are never clamped, so a
//! machine counter that lags behind a task's last reading yields a remaining
//! amount larger than the interval.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  task::{IntervalUnit, MaintenanceTask, Status},
};

// ─── Thresholds ──────────────────────────────────────────────────────────────

/// How the Critical and Warning bands are sized for one kind of interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdRule {
  /// Fractions of the task's interval (e.g. `0.05` = 5%).
  Fraction { critical: f64, warning: f64 },
  /// Fixed amounts in the interval kind's natural unit: hours for
  /// hour-based tasks, days for calendar tasks.
  Absolute { critical: f64, warning: f64 },
}

impl ThresholdRule {
  fn bounds(&self) -> (f64, f64) {
    match *self {
      Self::Fraction { critical, warning } | Self::Absolute { critical, warning } => {
        (critical, warning)
      }
    }
  }

  fn validate(&self) -> Result<()> {
    let (critical, warning) = self.bounds();
    if !critical.is_finite() || !warning.is_finite() {
      return Err(Error::validation("thresholds must be finite"));
    }
    if critical < 0.0 {
      return Err(Error::validation("critical threshold must not be negative"));
    }
    if critical > warning {
      return Err(Error::validation(format!(
        "critical threshold ({critical}) exceeds warning threshold ({warning})"
      )));
    }
    Ok(())
  }

  /// Classify a remaining amount.
  ///
  /// `remaining` is in interval units; `remaining_natural` is the same
  /// distance in the rule's natural unit (hours or days).
  fn classify(&self, remaining: f64, remaining_natural: f64, interval: f64) -> Status {
    if remaining <= 0.0 {
      return Status::Overdue;
    }
    let (value, critical, warning) = match *self {
      Self::Fraction { critical, warning } => {
        (remaining, critical * interval, warning * interval)
      }
      Self::Absolute { critical, warning } => (remaining_natural, critical, warning),
    };
    if value <= critical {
      Status::Critical
    } else if value <= warning {
      Status::Warning
    } else {
      Status::Normal
    }
  }
}

impl Default for ThresholdRule {
  fn default() -> Self {
    Self::Fraction { critical: 0.05, warning: 0.10 }
  }
}

/// Status thresholds for both interval kinds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Thresholds {
  #[serde(default)]
  pub hours:    ThresholdRule,
  #[serde(default)]
  pub calendar: ThresholdRule,
}

impl Thresholds {
  /// Build validated thresholds.
  pub fn new(hours: ThresholdRule, calendar: ThresholdRule) -> Result<Self> {
    let thresholds = Self { hours, calendar };
    thresholds.validate()?;
    Ok(thresholds)
  }

  pub fn validate(&self) -> Result<()> {
    self.hours.validate()?;
    self.calendar.validate()
  }
}

// ─── Schedule ────────────────────────────────────────────────────────────────

/// The authoritative next-due point of a task.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NextDue {
  Hours(f64),
  Date(NaiveDate),
  /// A calendar task that has never been performed.
  Unscheduled,
}

/// Derived fields of a task at one point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Schedule {
  pub next_due:  NextDue,
  pub remaining: f64,
  pub status:    Status,
}

/// Compute a task's next-due point, remaining amount and status.
pub fn compute_schedule(
  task: &MaintenanceTask,
  machine_hours: f64,
  today: NaiveDate,
  thresholds: &Thresholds,
) -> Schedule {
  let interval = f64::from(task.interval_value);

  if task.interval_unit == IntervalUnit::Hours {
    let next = task.last_hours + interval;
    let remaining = next - machine_hours;
    return Schedule {
      next_due: NextDue::Hours(next),
      remaining,
      status: thresholds.hours.classify(remaining, remaining, interval),
    };
  }

  let next = task
    .last_date
    .and_then(|last| advance(last, task.interval_unit, task.interval_value));
  let Some(next) = next else {
    return Schedule {
      next_due:  NextDue::Unscheduled,
      remaining: 0.0,
      status:    Status::Overdue,
    };
  };

  let remaining_days = (next - today).num_days() as f64;
  let remaining = units_between(today, next, task.interval_unit);
  Schedule {
    next_due: NextDue::Date(next),
    remaining,
    status: thresholds.calendar.classify(remaining, remaining_days, interval),
  }
}

/// Write `schedule` into the task's derived fields. The next-due field that
/// the unit does not use is cleared.
pub fn apply_schedule(task: &mut MaintenanceTask, schedule: &Schedule) {
  let (date, hours) = match schedule.next_due {
    NextDue::Hours(h) => (None, Some(h)),
    NextDue::Date(d) => (Some(d), None),
    NextDue::Unscheduled => (None, None),
  };
  task.next_due_date = date;
  task.next_due_hours = hours;
  task.remaining = schedule.remaining;
  task.status = schedule.status;
}

/// Recompute and store the derived fields of `task` in place.
pub fn refresh(
  task: &mut MaintenanceTask,
  machine_hours: f64,
  today: NaiveDate,
  thresholds: &Thresholds,
) {
  let schedule = compute_schedule(task, machine_hours, today, thresholds);
  apply_schedule(task, &schedule);
}

/// Roll a task over after it was performed.
///
/// The new cycle always starts a full interval from the completion point;
/// overdue slack is not carried over.
pub fn complete_task(
  task: &MaintenanceTask,
  performed_at: NaiveDate,
  hours_at_completion: f64,
  machine_hours: f64,
  today: NaiveDate,
  thresholds: &Thresholds,
) -> MaintenanceTask {
  let mut next = task.clone();
  next.last_date = Some(performed_at);
  next.last_hours = hours_at_completion;
  refresh(&mut next, machine_hours, today, thresholds);
  next
}

// ─── Calendar arithmetic ─────────────────────────────────────────────────────

fn months_per_step(unit: IntervalUnit) -> u32 {
  if unit == IntervalUnit::Years { 12 } else { 1 }
}

/// `date` advanced by `count` units. Month arithmetic clamps to the end of
/// the month (Jan 31 + 1 month = Feb 28/29).
fn advance(date: NaiveDate, unit: IntervalUnit, count: u32) -> Option<NaiveDate> {
  match unit {
    IntervalUnit::Hours => None,
    IntervalUnit::Days => date.checked_add_days(chrono::Days::new(count.into())),
    IntervalUnit::Weeks => {
      date.checked_add_days(chrono::Days::new(u64::from(count) * 7))
    }
    IntervalUnit::Months | IntervalUnit::Years => {
      let months = count.checked_mul(months_per_step(unit))?;
      date.checked_add_months(Months::new(months))
    }
  }
}

/// Signed distance from `from` to `to` in calendar units.
///
/// Months and years count whole steps first, then add the elapsed fraction
/// of the following step.
fn units_between(from: NaiveDate, to: NaiveDate, unit: IntervalUnit) -> f64 {
  if to < from {
    return -units_between(to, from, unit);
  }
  let days = (to - from).num_days() as f64;
  match unit {
    IntervalUnit::Hours | IntervalUnit::Days => days,
    IntervalUnit::Weeks => days / 7.0,
    IntervalUnit::Months | IntervalUnit::Years => {
      let step = months_per_step(unit);
      let mut whole = 0u32;
      let mut cursor = from;
      while let Some(next) = (whole + 1)
        .checked_mul(step)
        .and_then(|m| from.checked_add_months(Months::new(m)))
        .filter(|next| *next <= to)
      {
        whole += 1;
        cursor = next;
      }
      let fraction = cursor
        .checked_add_months(Months::new(step))
        .map(|following| {
          (to - cursor).num_days() as f64 / (following - cursor).num_days() as f64
        })
        .unwrap_or(0.0);
      f64::from(whole) + fraction
    }
  }
}
