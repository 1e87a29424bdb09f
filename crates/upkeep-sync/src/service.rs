//! [`Upkeep`] — the caller-facing maintenance service.
//!
//! Owns the records and a [`SyncCoordinator`]. Every mutation validates,
//! applies, and saves the whole record set locally as pending; nothing here
//! needs the network. [`Upkeep::sync`] is the explicit, retryable push. With
//! `auto_sync` on, mutations also try a push, but its failure is only logged.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use upkeep_core::{
  RecordStore,
  cache::LocalCache,
  log::{LogEntry, LogId},
  machine::{Machine, MachineId, MachinePatch, NewMachine},
  remote::RemoteStore,
  schedule::{self, Thresholds},
  task::{Completion, MaintenanceTask, NewTask, Status, TaskId, TaskPatch},
};

use crate::{
  Error, Result,
  coordinator::{PushReport, SyncCoordinator, SyncStatus},
};

// ─── Options & views ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct UpkeepOptions {
  pub thresholds: Thresholds,
  /// Push after every mutation.
  pub auto_sync:  bool,
}

/// Which statuses [`Upkeep::list_due`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
  #[default]
  Any,
  /// This status or anything more severe.
  AtLeast(Status),
  Only(Status),
}

impl StatusFilter {
  pub fn matches(self, status: Status) -> bool {
    match self {
      Self::Any => true,
      Self::AtLeast(min) => status >= min,
      Self::Only(s) => status == s,
    }
  }
}

/// One task with its machine, derived fields current as of the listing.
#[derive(Debug, Clone)]
pub struct DueItem {
  pub machine: Machine,
  pub task:    MaintenanceTask,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct Upkeep<R, C> {
  store:       RecordStore,
  coordinator: SyncCoordinator<R, C>,
  auto_sync:   bool,
  clock:       fn() -> DateTime<Utc>,
}

impl<R, C> Upkeep<R, C>
where
  R: RemoteStore,
  C: LocalCache,
{
  /// Load the local snapshot, or start empty, and bring every schedule up to
  /// date.
  pub async fn open(coordinator: SyncCoordinator<R, C>, options: UpkeepOptions) -> Result<Self> {
    Self::open_with_clock(coordinator, options, Utc::now).await
  }

  /// [`Upkeep::open`] with a fixed notion of "now".
  pub async fn open_with_clock(
    coordinator: SyncCoordinator<R, C>,
    options: UpkeepOptions,
    clock: fn() -> DateTime<Utc>,
  ) -> Result<Self> {
    let mut store = match coordinator.load_local().await? {
      Some((store, snapshot)) => {
        tracing::info!(
          machines = store.machines().count(),
          tasks = store.tasks().count(),
          pending = snapshot.pending_sync,
          "loaded local snapshot"
        );
        store
      }
      None => {
        tracing::info!("no local snapshot; starting empty");
        RecordStore::default()
      }
    };
    store.set_thresholds(options.thresholds, clock().date_naive())?;
    Ok(Self { store, coordinator, auto_sync: options.auto_sync, clock })
  }

  fn now(&self) -> DateTime<Utc> { (self.clock)() }

  fn today(&self) -> NaiveDate { self.now().date_naive() }

  pub fn store(&self) -> &RecordStore { &self.store }

  pub fn coordinator(&self) -> &SyncCoordinator<R, C> { &self.coordinator }

  /// Save locally, and push as well when `auto_sync` is on.
  async fn persist(&mut self, message: &str) -> Result<()> {
    if !self.auto_sync {
      return self.coordinator.save_local(&self.store).await;
    }
    match self.coordinator.push(&self.store, message).await {
      Ok(_) => Ok(()),
      Err(e @ (Error::Storage(_) | Error::Schema(_))) => Err(e),
      Err(e) => {
        tracing::warn!(error = %e, "automatic sync failed; change kept locally as pending");
        Ok(())
      }
    }
  }

  // ── Machines ──────────────────────────────────────────────────────────────

  pub async fn add_machine(&mut self, input: NewMachine) -> Result<MachineId> {
    let now = self.now();
    let id = self.store.insert_machine(input, now)?;
    tracing::info!(machine = id, "machine added");
    self.persist(&format!("Add machine {id}")).await?;
    Ok(id)
  }

  pub async fn update_machine(&mut self, id: MachineId, patch: MachinePatch) -> Result<()> {
    let today = self.today();
    self.store.update_machine(id, patch, today)?;
    self.persist(&format!("Update machine {id}")).await
  }

  /// Set the machine's operating-hours counter to `hours`.
  ///
  /// The reading is taken as-is, so a typo can be corrected downwards; a
  /// decrease is logged.
  pub async fn update_machine_hours(&mut self, id: MachineId, hours: f64) -> Result<()> {
    let today = self.today();
    let previous = self
      .store
      .machine(id)
      .map(|m| m.total_hours)
      .ok_or(upkeep_core::Error::MachineNotFound(id))?;
    if hours < previous {
      tracing::warn!(machine = id, previous, hours, "operating hours decreased");
    }
    let patch = MachinePatch { total_hours: Some(hours), ..MachinePatch::default() };
    self.store.update_machine(id, patch, today)?;
    self.persist(&format!("Machine {id} at {hours} h")).await
  }

  /// Retire a machine and all of its tasks.
  pub async fn deactivate_machine(&mut self, id: MachineId) -> Result<usize> {
    let tasks = self.store.deactivate_machine(id)?;
    tracing::info!(machine = id, tasks, "machine deactivated");
    self.persist(&format!("Deactivate machine {id}")).await?;
    Ok(tasks)
  }

  pub fn machines(&self) -> impl Iterator<Item = &Machine> { self.store.machines() }

  pub fn machine(&self, id: MachineId) -> Result<&Machine> {
    Ok(self.store.machine(id).ok_or(upkeep_core::Error::MachineNotFound(id))?)
  }

  // ── Tasks ─────────────────────────────────────────────────────────────────

  pub async fn add_task(&mut self, input: NewTask) -> Result<TaskId> {
    let now = self.now();
    let id = self.store.insert_task(input, now)?;
    tracing::info!(task = id, "task added");
    self.persist(&format!("Add task {id}")).await?;
    Ok(id)
  }

  pub async fn update_task(&mut self, id: TaskId, patch: TaskPatch) -> Result<()> {
    let today = self.today();
    self.store.update_task(id, patch, today)?;
    self.persist(&format!("Update task {id}")).await
  }

  pub async fn deactivate_task(&mut self, id: TaskId) -> Result<()> {
    self.store.deactivate_task(id)?;
    self.persist(&format!("Deactivate task {id}")).await
  }

  /// Record that a task was performed and roll it over to its next cycle.
  pub async fn complete_task(&mut self, id: TaskId, completion: Completion) -> Result<LogId> {
    let now = self.now();
    let (task, log_id) = self.store.complete_task(id, completion, now)?;
    tracing::info!(
      task = id,
      log = log_id,
      status = %task.status,
      remaining = task.remaining,
      "task completed"
    );
    let message = format!("Complete task {id} ({})", task.task_type);
    self.persist(&message).await?;
    Ok(log_id)
  }

  /// Active tasks of active machines whose status passes `filter`, most
  /// severe first, then least remaining.
  pub fn list_due(&self, filter: StatusFilter) -> Vec<DueItem> {
    let today = self.today();
    let thresholds = self.store.thresholds();
    let mut items: Vec<DueItem> = self
      .store
      .tasks()
      .filter(|t| t.active)
      .filter_map(|t| {
        let machine = self.store.machine(t.machine_id).filter(|m| m.active)?;
        let mut task = t.clone();
        schedule::refresh(&mut task, machine.total_hours, today, thresholds);
        filter
          .matches(task.status)
          .then(|| DueItem { machine: machine.clone(), task })
      })
      .collect();

    items.sort_by(|a, b| {
      b.task
        .status
        .cmp(&a.task.status)
        .then_with(|| a.task.remaining.partial_cmp(&b.task.remaining).unwrap_or(Ordering::Equal))
        .then_with(|| a.task.id.cmp(&b.task.id))
    });
    items
  }

  /// Service history of a machine, newest first.
  pub fn history(&self, machine_id: MachineId) -> Result<Vec<LogEntry>> {
    self.machine(machine_id)?;
    let mut entries: Vec<LogEntry> = self.store.logs_for(machine_id).cloned().collect();
    entries.sort_by(|a, b| {
      b.performed_date.cmp(&a.performed_date).then_with(|| b.id.cmp(&a.id))
    });
    Ok(entries)
  }

  // ── Sync ──────────────────────────────────────────────────────────────────

  /// Push the current records to the remote.
  pub async fn sync(&mut self) -> Result<PushReport> {
    self.coordinator.push(&self.store, "Sync maintenance records").await
  }

  /// Replace the local records with the remote document. Returns `false`
  /// when there is no remote document yet.
  pub async fn pull(&mut self) -> Result<bool> {
    if self.coordinator.status().await?.pending {
      tracing::warn!("pulling over local changes that were never pushed");
    }
    let Some(mut store) = self.coordinator.pull().await? else {
      return Ok(false);
    };
    store.set_thresholds(*self.store.thresholds(), self.today())?;
    self.store = store;
    Ok(true)
  }

  pub async fn sync_status(&self) -> Result<SyncStatus> { self.coordinator.status().await }
}
