//! [`RecordStore`] — the in-memory Machines / Tasks / LogEntries tables.
//!
//! The store is the canonical in-process representation of the dataset. It
//! allocates ids, enforces foreign keys, and keeps every task's derived
//! schedule fields current after each mutation. Failed operations leave the
//! store untouched: all validation happens before the first write.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};

use crate::{
  Error, Result,
  log::{LogEntry, LogId, NewLogEntry},
  machine::{Machine, MachineId, MachinePatch, NewMachine, validate_hours},
  schedule::{self, Thresholds},
  task::{Completion, MaintenanceTask, NewTask, TaskId, TaskPatch},
};

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RecordStore {
  machines:   BTreeMap<MachineId, Machine>,
  tasks:      BTreeMap<TaskId, MaintenanceTask>,
  logs:       BTreeMap<LogId, LogEntry>,
  thresholds: Thresholds,
}

/// `max(id) + 1`, or `1` for an empty table. Rows are never removed, so the
/// sequence only grows.
fn next_id<T>(table: &BTreeMap<i64, T>) -> i64 {
  table.keys().next_back().map_or(1, |max| max + 1)
}

fn index_rows<T>(
  table: &'static str,
  rows: impl IntoIterator<Item = T>,
  id: impl Fn(&T) -> i64,
) -> BTreeMap<i64, T> {
  let mut map = BTreeMap::new();
  for row in rows {
    let key = id(&row);
    if map.insert(key, row).is_some() {
      tracing::warn!(table, id = key, "duplicate row id; keeping the later row");
    }
  }
  map
}

impl RecordStore {
  /// An empty store using `thresholds` for status classification.
  pub fn new(thresholds: Thresholds) -> Self {
    Self { thresholds, ..Self::default() }
  }

  /// Rebuild a store from decoded rows. Foreign keys are not checked; rows
  /// come from a document some other writer produced and are kept verbatim.
  pub fn from_rows(
    machines: Vec<Machine>,
    tasks: Vec<MaintenanceTask>,
    logs: Vec<LogEntry>,
  ) -> Self {
    Self {
      machines:   index_rows("Machines", machines, |m| m.id),
      tasks:      index_rows("Tasks", tasks, |t| t.id),
      logs:       index_rows("LogEntries", logs, |l| l.id),
      thresholds: Thresholds::default(),
    }
  }

  pub fn thresholds(&self) -> &Thresholds { &self.thresholds }

  /// Replace the thresholds and reclassify every task.
  pub fn set_thresholds(&mut self, thresholds: Thresholds, today: NaiveDate) -> Result<()> {
    thresholds.validate()?;
    self.thresholds = thresholds;
    self.recompute(today);
    Ok(())
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  pub fn machine(&self, id: MachineId) -> Option<&Machine> { self.machines.get(&id) }

  pub fn task(&self, id: TaskId) -> Option<&MaintenanceTask> { self.tasks.get(&id) }

  pub fn log(&self, id: LogId) -> Option<&LogEntry> { self.logs.get(&id) }

  pub fn machines(&self) -> impl Iterator<Item = &Machine> { self.machines.values() }

  pub fn tasks(&self) -> impl Iterator<Item = &MaintenanceTask> { self.tasks.values() }

  pub fn logs(&self) -> impl Iterator<Item = &LogEntry> { self.logs.values() }

  pub fn tasks_for(&self, machine_id: MachineId) -> impl Iterator<Item = &MaintenanceTask> {
    self.tasks.values().filter(move |t| t.machine_id == machine_id)
  }

  pub fn logs_for(&self, machine_id: MachineId) -> impl Iterator<Item = &LogEntry> {
    self.logs.values().filter(move |l| l.machine_id == machine_id)
  }

  pub fn is_empty(&self) -> bool {
    self.machines.is_empty() && self.tasks.is_empty() && self.logs.is_empty()
  }

  fn machine_or_err(&self, id: MachineId) -> Result<&Machine> {
    self.machines.get(&id).ok_or(Error::MachineNotFound(id))
  }

  // ── Machines ──────────────────────────────────────────────────────────────

  pub fn insert_machine(&mut self, input: NewMachine, now: DateTime<Utc>) -> Result<MachineId> {
    input.validate()?;
    let id = next_id(&self.machines);
    self.machines.insert(id, Machine {
      id,
      name: input.name,
      model: input.model,
      serial: input.serial,
      install_date: input.install_date,
      total_hours: input.total_hours,
      department: input.department,
      notes: input.notes,
      active: true,
      created_at: Some(now),
    });
    Ok(id)
  }

  /// Apply a partial update, then refresh the machine's task schedules.
  pub fn update_machine(
    &mut self,
    id: MachineId,
    patch: MachinePatch,
    today: NaiveDate,
  ) -> Result<&Machine> {
    patch.validate()?;
    let machine = self.machines.get_mut(&id).ok_or(Error::MachineNotFound(id))?;
    patch.apply(machine);
    self.recompute_machine(id, today);
    self.machine_or_err(id)
  }

  /// Raise the machine's counter to `reading` if it is higher than the
  /// stored value. Returns whether the counter changed.
  pub fn record_hours(&mut self, id: MachineId, reading: f64, today: NaiveDate) -> Result<bool> {
    validate_hours(reading)?;
    let machine = self.machines.get_mut(&id).ok_or(Error::MachineNotFound(id))?;
    if reading <= machine.total_hours {
      return Ok(false);
    }
    machine.total_hours = reading;
    self.recompute_machine(id, today);
    Ok(true)
  }

  /// Soft-delete a machine. All of its tasks are deactivated with it so no
  /// active task ever points at a retired machine. Returns the number of
  /// tasks that were switched off.
  pub fn deactivate_machine(&mut self, id: MachineId) -> Result<usize> {
    let machine = self.machines.get_mut(&id).ok_or(Error::MachineNotFound(id))?;
    machine.active = false;
    let mut count = 0;
    for task in self.tasks.values_mut().filter(|t| t.machine_id == id && t.active) {
      task.active = false;
      count += 1;
    }
    Ok(count)
  }

  // ── Tasks ─────────────────────────────────────────────────────────────────

  pub fn insert_task(&mut self, input: NewTask, now: DateTime<Utc>) -> Result<TaskId> {
    input.validate()?;
    let machine = self.machines.get(&input.machine_id).ok_or_else(|| {
      Error::validation(format!("machine {} does not exist", input.machine_id))
    })?;
    let machine_hours = machine.total_hours;

    let id = next_id(&self.tasks);
    let mut task = MaintenanceTask {
      id,
      machine_id: input.machine_id,
      task_type: input.task_type,
      interval_value: input.interval_value,
      interval_unit: input.interval_unit,
      last_date: Some(input.last_date.unwrap_or_else(|| now.date_naive())),
      last_hours: input.last_hours.unwrap_or(machine_hours),
      next_due_date: None,
      next_due_hours: None,
      remaining: 0.0,
      status: Default::default(),
      description: input.description,
      active: true,
      created_at: Some(now),
    };
    schedule::refresh(&mut task, machine_hours, now.date_naive(), &self.thresholds);
    self.tasks.insert(id, task);
    Ok(id)
  }

  /// Apply a partial update and recompute the task's derived fields.
  pub fn update_task(
    &mut self,
    id: TaskId,
    patch: TaskPatch,
    today: NaiveDate,
  ) -> Result<&MaintenanceTask> {
    patch.validate()?;
    let task = self.tasks.get_mut(&id).ok_or(Error::TaskNotFound(id))?;
    patch.apply(task);
    let hours = self.machines.get(&task.machine_id).map_or(0.0, |m| m.total_hours);
    schedule::refresh(task, hours, today, &self.thresholds);
    Ok(task)
  }

  pub fn deactivate_task(&mut self, id: TaskId) -> Result<()> {
    let task = self.tasks.get_mut(&id).ok_or(Error::TaskNotFound(id))?;
    task.active = false;
    Ok(())
  }

  /// Record that a task was performed: append a log entry, raise the
  /// machine's counter if the reading is higher, and roll the task over.
  pub fn complete_task(
    &mut self,
    id: TaskId,
    completion: Completion,
    now: DateTime<Utc>,
  ) -> Result<(&MaintenanceTask, LogId)> {
    validate_hours(completion.hours)?;
    let task = self.tasks.get(&id).ok_or(Error::TaskNotFound(id))?;
    if !task.active {
      return Err(Error::validation(format!("task {id} is inactive")));
    }
    let machine = self.machines.get(&task.machine_id).ok_or_else(|| {
      Error::validation(format!("task {id} refers to missing machine {}", task.machine_id))
    })?;
    if completion.hours < task.last_hours {
      tracing::warn!(
        task = id,
        reading = completion.hours,
        last = task.last_hours,
        "completion reading is below the previous service reading"
      );
    }

    let today = now.date_naive();
    let machine_id = machine.id;
    let machine_hours = machine.total_hours.max(completion.hours);
    let rolled = schedule::complete_task(
      task,
      completion.performed_at,
      completion.hours,
      machine_hours,
      today,
      &self.thresholds,
    );

    let log_id = self.append_log(
      NewLogEntry {
        machine_id,
        task_id: id,
        performed_date: completion.performed_at,
        hours_reading: completion.hours,
        technician: completion.technician,
        parts_used: completion.parts_used,
        notes: completion.notes,
      },
      now,
    )?;
    self.tasks.insert(id, rolled);
    self.record_hours(machine_id, completion.hours, today)?;

    let task = self.tasks.get(&id).ok_or(Error::TaskNotFound(id))?;
    Ok((task, log_id))
  }

  // ── Log ───────────────────────────────────────────────────────────────────

  /// Append a service entry. Both the machine and the task must exist and
  /// the task must belong to the machine.
  pub fn append_log(&mut self, input: NewLogEntry, now: DateTime<Utc>) -> Result<LogId> {
    validate_hours(input.hours_reading)?;
    if !self.machines.contains_key(&input.machine_id) {
      return Err(Error::validation(format!(
        "machine {} does not exist",
        input.machine_id
      )));
    }
    let task = self.tasks.get(&input.task_id).ok_or_else(|| {
      Error::validation(format!("task {} does not exist", input.task_id))
    })?;
    if task.machine_id != input.machine_id {
      return Err(Error::validation(format!(
        "task {} belongs to machine {}, not {}",
        input.task_id, task.machine_id, input.machine_id
      )));
    }

    let id = next_id(&self.logs);
    self.logs.insert(id, LogEntry {
      id,
      machine_id: input.machine_id,
      task_id: input.task_id,
      performed_date: input.performed_date,
      hours_reading: input.hours_reading,
      technician: input.technician,
      parts_used: input.parts_used,
      notes: input.notes,
      recorded_at: Some(now),
    });
    Ok(id)
  }

  // ── Schedules ─────────────────────────────────────────────────────────────

  /// Recompute derived fields of every task.
  pub fn recompute(&mut self, today: NaiveDate) {
    let ids: Vec<MachineId> = self.machines.keys().copied().collect();
    for id in ids {
      self.recompute_machine(id, today);
    }
  }

  /// Recompute derived fields of the tasks belonging to `machine_id`.
  pub fn recompute_machine(&mut self, machine_id: MachineId, today: NaiveDate) {
    let Some(hours) = self.machines.get(&machine_id).map(|m| m.total_hours) else {
      return;
    };
    for task in self.tasks.values_mut().filter(|t| t.machine_id == machine_id) {
      schedule::refresh(task, hours, today, &self.thresholds);
    }
  }
}
