//! Subcommands and their plain-text output.

use std::io::Write;

use anyhow::{Context as _, bail};
use chrono::{NaiveDate, TimeDelta, Utc};
use clap::Subcommand;
use upkeep_cache_sqlite::SqliteCache;
use upkeep_core::{
  machine::{MachineId, MachinePatch, NewMachine},
  remote::RemoteStore,
  task::{Completion, IntervalUnit, MaintenanceTask, NewTask, Status, TaskId},
};
use upkeep_sync::{Error as SyncError, StatusFilter, Upkeep};

#[derive(Subcommand, Debug)]
pub enum Command {
  /// List machines.
  Machines {
    /// Include retired machines.
    #[arg(long)]
    all: bool,
  },
  /// Register a machine.
  AddMachine {
    name:         String,
    #[arg(long, default_value = "")]
    model:        String,
    #[arg(long, default_value = "")]
    serial:       String,
    #[arg(long, default_value = "")]
    department:   String,
    /// Current hour-meter reading.
    #[arg(long, default_value_t = 0.0)]
    hours:        f64,
    #[arg(long, value_name = "YYYY-MM-DD")]
    installed:    Option<NaiveDate>,
    #[arg(long, default_value = "")]
    notes:        String,
  },
  /// Rename a machine or edit its details.
  EditMachine {
    id:         MachineId,
    #[arg(long)]
    name:       Option<String>,
    #[arg(long)]
    model:      Option<String>,
    #[arg(long)]
    serial:     Option<String>,
    #[arg(long)]
    department: Option<String>,
    #[arg(long)]
    notes:      Option<String>,
  },
  /// Record a new hour-meter reading.
  Hours { id: MachineId, hours: f64 },
  /// Retire a machine and all of its tasks.
  RetireMachine { id: MachineId },
  /// Add a recurring maintenance task to a machine.
  AddTask {
    machine:     MachineId,
    task_type:   String,
    /// Interval length.
    #[arg(long)]
    every:       u32,
    /// hours, days, weeks, months or years.
    #[arg(long, default_value = "hours")]
    unit:        IntervalUnit,
    #[arg(long, value_name = "YYYY-MM-DD")]
    last_date:   Option<NaiveDate>,
    #[arg(long)]
    last_hours:  Option<f64>,
    #[arg(long, default_value = "")]
    description: String,
  },
  /// Retire a single task.
  RetireTask { id: TaskId },
  /// Record that a task was performed.
  Complete {
    id:         TaskId,
    /// Defaults to today.
    #[arg(long, value_name = "YYYY-MM-DD")]
    date:       Option<NaiveDate>,
    /// Defaults to the machine's current reading.
    #[arg(long)]
    hours:      Option<f64>,
    #[arg(long, default_value = "")]
    technician: String,
    #[arg(long, default_value = "")]
    parts:      String,
    #[arg(long, default_value = "")]
    notes:      String,
  },
  /// Show tasks ordered by urgency.
  Due {
    /// Show only this status.
    #[arg(long, conflicts_with = "at_least")]
    status:   Option<Status>,
    /// Show this status and anything more severe.
    #[arg(long)]
    at_least: Option<Status>,
  },
  /// Service history of a machine.
  History { machine: MachineId },
  /// Push local records to the remote.
  Sync,
  /// Replace local records with the remote document.
  Pull,
  /// Show whether local changes are waiting to be pushed.
  Status,
  /// Inspect or prune local backups.
  Backups {
    /// Delete backups older than the retention period.
    #[arg(long)]
    prune: bool,
  },
}

impl Command {
  /// Commands that talk to the remote.
  pub fn needs_remote(&self) -> bool { matches!(self, Self::Sync | Self::Pull) }
}

pub async fn run<R: RemoteStore>(
  upkeep: &mut Upkeep<R, SqliteCache>,
  command: Command,
  retention_days: u32,
  out: &mut impl Write,
) -> anyhow::Result<()> {
  match command {
    Command::Machines { all } => {
      writeln!(out, "{:>4}  {:<24} {:<16} {:>10}  {}", "ID", "NAME", "DEPARTMENT", "HOURS", "")?;
      for m in upkeep.machines().filter(|m| all || m.active) {
        let flag = if m.active { "" } else { "retired" };
        writeln!(
          out,
          "{:>4}  {:<24} {:<16} {:>10.1}  {flag}",
          m.id, m.name, m.department, m.total_hours
        )?;
      }
    }

    Command::AddMachine { name, model, serial, department, hours, installed, notes } => {
      let id = upkeep
        .add_machine(NewMachine {
          name,
          model,
          serial,
          install_date: installed,
          total_hours: hours,
          department,
          notes,
        })
        .await?;
      writeln!(out, "added machine {id}")?;
    }

    Command::EditMachine { id, name, model, serial, department, notes } => {
      let patch = MachinePatch { name, model, serial, department, notes, ..Default::default() };
      upkeep.update_machine(id, patch).await?;
      writeln!(out, "updated machine {id}")?;
    }

    Command::Hours { id, hours } => {
      upkeep.update_machine_hours(id, hours).await?;
      writeln!(out, "machine {id} now at {hours:.1} h")?;
    }

    Command::RetireMachine { id } => {
      let tasks = upkeep.deactivate_machine(id).await?;
      writeln!(out, "retired machine {id} and {tasks} task(s)")?;
    }

    Command::AddTask { machine, task_type, every, unit, last_date, last_hours, description } => {
      let mut input = NewTask::new(machine, task_type, every, unit);
      input.last_date = last_date;
      input.last_hours = last_hours;
      input.description = description;
      let id = upkeep.add_task(input).await?;
      writeln!(out, "added task {id}")?;
    }

    Command::RetireTask { id } => {
      upkeep.deactivate_task(id).await?;
      writeln!(out, "retired task {id}")?;
    }

    Command::Complete { id, date, hours, technician, parts, notes } => {
      let hours = match hours {
        Some(h) => h,
        None => current_hours(upkeep, id)?,
      };
      let mut completion = Completion::new(date.unwrap_or_else(|| Utc::now().date_naive()), hours);
      completion.technician = technician;
      completion.parts_used = parts;
      completion.notes = notes;
      let log = upkeep.complete_task(id, completion).await?;
      writeln!(out, "logged service {log} for task {id}")?;
      if let Some(task) = upkeep.store().task(id) {
        writeln!(out, "next due: {}", next_due(task))?;
      }
    }

    Command::Due { status, at_least } => {
      let filter = match (status, at_least) {
        (Some(s), _) => StatusFilter::Only(s),
        (None, Some(s)) => StatusFilter::AtLeast(s),
        (None, None) => StatusFilter::Any,
      };
      writeln!(
        out,
        "{:>4}  {:<20} {:<24} {:<8} {:>10}  {}",
        "TASK", "MACHINE", "TYPE", "STATUS", "REMAINING", "NEXT DUE"
      )?;
      for item in upkeep.list_due(filter) {
        let task = &item.task;
        writeln!(
          out,
          "{:>4}  {:<20} {:<24} {:<8} {:>10}  {}",
          task.id,
          item.machine.name,
          task.task_type,
          task.status,
          format!("{:.1} {}", task.remaining, task.interval_unit),
          next_due(task),
        )?;
      }
    }

    Command::History { machine } => {
      for entry in upkeep.history(machine)? {
        let task = upkeep
          .store()
          .task(entry.task_id)
          .map_or("?", |t| t.task_type.as_str());
        writeln!(
          out,
          "{}  {:>10.1} h  {:<24} {}",
          entry.performed_date, entry.hours_reading, task, entry.technician
        )?;
        if !entry.parts_used.is_empty() {
          writeln!(out, "    parts: {}", entry.parts_used)?;
        }
        if !entry.notes.is_empty() {
          writeln!(out, "    notes: {}", entry.notes)?;
        }
      }
    }

    Command::Sync => match upkeep.sync().await {
      Ok(report) => {
        let verb = if report.created { "created" } else { "updated" };
        writeln!(out, "{verb} remote document at {} ({} attempt(s))", report.version, report.attempts)?;
      }
      Err(SyncError::Conflict { attempts, remote, .. }) => {
        bail!(
          "remote changed {attempts} times while pushing (now at {}); local changes are kept, \
           run `upkeep sync` again or `upkeep pull` to take the remote copy",
          remote.version
        );
      }
      Err(e) => return Err(e).context("sync failed"),
    },

    Command::Pull => {
      if upkeep.pull().await? {
        writeln!(out, "pulled {} machine(s) from the remote", upkeep.machines().count())?;
      } else {
        writeln!(out, "remote document does not exist yet")?;
      }
    }

    Command::Status => {
      let status = upkeep.sync_status().await?;
      let state = if status.pending { "local changes pending" } else { "in sync" };
      writeln!(out, "{state} (remote version {})", status.remote_version)?;
    }

    Command::Backups { prune } => {
      let cache = upkeep.coordinator().cache();
      if prune {
        let cutoff = Utc::now() - TimeDelta::days(i64::from(retention_days));
        let removed = cache.prune_backups(cutoff).await?;
        writeln!(out, "removed {removed} backup(s) older than {retention_days} days")?;
      }
      for backup in cache.list_backups().await? {
        writeln!(out, "{:>6}  {}  {} bytes", backup.id, backup.saved_at, backup.size)?;
      }
    }
  }
  Ok(())
}

fn current_hours<R: RemoteStore>(
  upkeep: &Upkeep<R, SqliteCache>,
  task_id: TaskId,
) -> anyhow::Result<f64> {
  let task = upkeep
    .store()
    .task(task_id)
    .with_context(|| format!("task not found: {task_id}"))?;
  Ok(upkeep.machine(task.machine_id)?.total_hours)
}

fn next_due(task: &MaintenanceTask) -> String {
  match (task.next_due_hours, task.next_due_date) {
    (Some(h), _) => format!("{h:.1} h"),
    (None, Some(d)) => d.to_string(),
    (None, None) => "never performed".to_owned(),
  }
}

#[cfg(test)]
mod tests {
  use upkeep_remote::MemoryRemote;
  use upkeep_sync::{SyncCoordinator, SyncOptions, UpkeepOptions};

  use super::*;

  async fn upkeep() -> Upkeep<MemoryRemote, SqliteCache> {
    let cache = SqliteCache::open_in_memory().await.unwrap();
    let coordinator = SyncCoordinator::new(MemoryRemote::new(), cache, SyncOptions::default());
    Upkeep::open(coordinator, UpkeepOptions::default()).await.unwrap()
  }

  async fn exec(upkeep: &mut Upkeep<MemoryRemote, SqliteCache>, command: Command) -> String {
    let mut out = Vec::new();
    run(upkeep, command, 30, &mut out).await.unwrap();
    String::from_utf8(out).unwrap()
  }

  fn add_machine(name: &str, hours: f64) -> Command {
    Command::AddMachine {
      name: name.into(),
      model: String::new(),
      serial: String::new(),
      department: "Moulding".into(),
      hours,
      installed: None,
      notes: String::new(),
    }
  }

  fn add_task(machine: MachineId, task_type: &str, every: u32, last_hours: f64) -> Command {
    Command::AddTask {
      machine,
      task_type: task_type.into(),
      every,
      unit: IntervalUnit::Hours,
      last_date: None,
      last_hours: Some(last_hours),
      description: String::new(),
    }
  }

  #[tokio::test]
  async fn due_lists_the_most_urgent_task_first() {
    let mut upkeep = upkeep().await;
    assert_eq!(exec(&mut upkeep, add_machine("Press 4", 1000.0)).await, "added machine 1\n");
    exec(&mut upkeep, add_task(1, "Grease", 500, 900.0)).await;
    exec(&mut upkeep, add_task(1, "Oil change", 100, 950.0)).await;

    let listing = exec(&mut upkeep, Command::Due { status: None, at_least: None }).await;
    let rows: Vec<&str> = listing.lines().skip(1).collect();
    assert_eq!(rows.len(), 2);
    assert!(rows[0].contains("Oil change"), "{listing}");
    assert!(rows[0].contains("1050.0 h"), "{listing}");

    let overdue = exec(&mut upkeep, Command::Due {
      status:   Some(Status::Overdue),
      at_least: None,
    })
    .await;
    assert_eq!(overdue.lines().count(), 1);
  }

  #[tokio::test]
  async fn completing_without_hours_uses_the_machine_reading() {
    let mut upkeep = upkeep().await;
    exec(&mut upkeep, add_machine("Lathe", 1200.0)).await;
    exec(&mut upkeep, add_task(1, "Oil change", 250, 1000.0)).await;

    let output = exec(&mut upkeep, Command::Complete {
      id:         1,
      date:       NaiveDate::from_ymd_opt(2024, 6, 1),
      hours:      None,
      technician: "Sam".into(),
      parts:      "Filter".into(),
      notes:      String::new(),
    })
    .await;
    assert!(output.contains("next due: 1450.0 h"), "{output}");

    let history = exec(&mut upkeep, Command::History { machine: 1 }).await;
    assert!(history.starts_with("2024-06-01"), "{history}");
    assert!(history.contains("parts: Filter"));
  }

  #[tokio::test]
  async fn retiring_a_machine_hides_it() {
    let mut upkeep = upkeep().await;
    exec(&mut upkeep, add_machine("Old press", 0.0)).await;
    exec(&mut upkeep, add_task(1, "Inspect", 10, 0.0)).await;

    let output = exec(&mut upkeep, Command::RetireMachine { id: 1 }).await;
    assert_eq!(output, "retired machine 1 and 1 task(s)\n");
    let active = exec(&mut upkeep, Command::Machines { all: false }).await;
    assert_eq!(active.lines().count(), 1);
    let all = exec(&mut upkeep, Command::Machines { all: true }).await;
    assert!(all.contains("retired"));
  }

  #[tokio::test]
  async fn unknown_ids_surface_as_errors() {
    let mut upkeep = upkeep().await;
    let mut out = Vec::new();
    let err = run(&mut upkeep, Command::Hours { id: 9, hours: 1.0 }, 30, &mut out)
      .await
      .unwrap_err();
    assert!(matches!(err.downcast_ref::<SyncError>(), Some(SyncError::NotFound(_))));
  }

  #[tokio::test]
  async fn status_and_sync_against_a_memory_remote() {
    let mut upkeep = upkeep().await;
    exec(&mut upkeep, add_machine("Press", 0.0)).await;
    let status = exec(&mut upkeep, Command::Status).await;
    assert!(status.starts_with("local changes pending"), "{status}");

    let synced = exec(&mut upkeep, Command::Sync).await;
    assert!(synced.starts_with("created remote document"), "{synced}");
    let status = exec(&mut upkeep, Command::Status).await;
    assert!(status.starts_with("in sync"), "{status}");
  }

  #[tokio::test]
  async fn backups_are_listed() {
    let mut upkeep = upkeep().await;
    exec(&mut upkeep, add_machine("Press", 0.0)).await;
    exec(&mut upkeep, add_machine("Drill", 0.0)).await;
    let listing = exec(&mut upkeep, Command::Backups { prune: true }).await;
    let mut lines = listing.lines();
    assert_eq!(lines.next(), Some("removed 0 backup(s) older than 30 days"));
    assert_eq!(lines.count(), 2);
  }
}
