//! Sync and service tests against `MemoryRemote` and an in-memory
//! `SqliteCache`.

use std::{
  io,
  sync::atomic::{AtomicU32, Ordering},
  time::Duration,
};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use upkeep_cache_sqlite::SqliteCache;
use upkeep_core::{
  RecordStore,
  cache::{CachedSnapshot, LocalCache},
  machine::NewMachine,
  remote::{RemoteDocument, RemoteStore, Version, VersionToken, WriteOutcome},
  schedule::{ThresholdRule, Thresholds},
  task::{Completion, IntervalUnit, NewTask, Status},
};
use upkeep_remote::MemoryRemote;

use crate::{
  Error, StatusFilter, SyncCoordinator, SyncOptions, SyncState, Upkeep, UpkeepOptions,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn clock() -> DateTime<Utc> { Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap() }

fn today() -> NaiveDate { clock().date_naive() }

fn options() -> SyncOptions {
  SyncOptions { max_attempts: 3, timeout: Duration::from_secs(5) }
}

async fn cache() -> SqliteCache {
  SqliteCache::open_in_memory().await.expect("in-memory cache")
}

async fn service<R: RemoteStore>(remote: R, auto_sync: bool) -> Upkeep<R, SqliteCache> {
  let coordinator = SyncCoordinator::new(remote, cache().await, options());
  let options = UpkeepOptions { thresholds: Thresholds::default(), auto_sync };
  Upkeep::open_with_clock(coordinator, options, clock).await.unwrap()
}

fn one_machine_store() -> RecordStore {
  let mut store = RecordStore::default();
  store.insert_machine(NewMachine::new("Press"), clock()).unwrap();
  store
}

/// A remote where a rival writer slips in a commit just before each of the
/// next `races` conditional writes.
struct Racing {
  inner: MemoryRemote,
  races: AtomicU32,
}

impl Racing {
  fn new(inner: MemoryRemote, races: u32) -> Self {
    Self { inner, races: AtomicU32::new(races) }
  }
}

impl RemoteStore for Racing {
  type Error = upkeep_remote::Error;

  async fn fetch(&self) -> Result<RemoteDocument, Self::Error> { self.inner.fetch().await }

  async fn write_if_matches<'a>(
    &'a self,
    content: &'a [u8],
    expected: &'a Version,
    message: &'a str,
  ) -> Result<WriteOutcome, Self::Error> {
    let left = self.races.load(Ordering::SeqCst);
    if left > 0 {
      self.races.store(left - 1, Ordering::SeqCst);
      self.inner.overwrite(format!("rival write {left}"));
    }
    self.inner.write_if_matches(content, expected, message).await
  }
}

/// A remote that never answers.
struct Stalled;

impl RemoteStore for Stalled {
  type Error = io::Error;

  async fn fetch(&self) -> io::Result<RemoteDocument> { std::future::pending().await }

  async fn write_if_matches<'a>(
    &'a self,
    _content: &'a [u8],
    _expected: &'a Version,
    _message: &'a str,
  ) -> io::Result<WriteOutcome> {
    std::future::pending().await
  }
}

/// A cache whose disk is full.
struct FullDisk;

impl LocalCache for FullDisk {
  type Error = io::Error;

  async fn save(&self, _content: Vec<u8>, _pending_sync: bool) -> io::Result<()> {
    Err(io::Error::other("no space left on device"))
  }

  async fn load(&self) -> io::Result<Option<CachedSnapshot>> { Ok(None) }

  async fn mark_synced(&self, _version: VersionToken) -> io::Result<()> { Ok(()) }
}

// ─── Coordinator ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_push_creates_the_remote_document() {
  let remote = MemoryRemote::new();
  let mut sync = SyncCoordinator::new(remote.clone(), cache().await, options());

  let report = sync.push(&one_machine_store(), "init").await.unwrap();
  assert!(report.created);
  assert_eq!(report.attempts, 1);
  assert_eq!(sync.state(), SyncState::Committed);

  let status = sync.status().await.unwrap();
  assert!(!status.pending);
  assert_eq!(status.remote_version, Version::Token(report.version));
  assert_eq!(remote.messages(), vec!["init".to_owned()]);
}

#[tokio::test]
async fn lost_race_retries_with_the_fresh_token() {
  let remote = MemoryRemote::with_content("base");
  let racing = Racing::new(remote.clone(), 1);
  let mut sync = SyncCoordinator::new(racing, cache().await, options());
  let store = one_machine_store();

  let report = sync.push(&store, "edit").await.unwrap();

  assert_eq!(report.attempts, 2);
  assert_eq!(remote.rejections(), 1, "the write against the stale token failed");
  assert_eq!(remote.writes(), 1);
  let expected = upkeep_workbook::encode(&store).unwrap();
  assert_eq!(remote.snapshot().content, Some(expected));
  assert_eq!(remote.snapshot().version, Version::Token(report.version));
}

#[tokio::test]
async fn persistent_conflict_surfaces_both_documents() {
  let remote = MemoryRemote::with_content("base");
  let racing = Racing::new(remote.clone(), 10);
  let mut sync = SyncCoordinator::new(racing, cache().await, options());
  let store = one_machine_store();

  let err = sync.push(&store, "edit").await.unwrap_err();
  let Error::Conflict { attempts, local, remote: latest } = err else {
    panic!("expected a conflict");
  };
  assert_eq!(attempts, 3);
  assert_eq!(local, upkeep_workbook::encode(&store).unwrap());
  assert_eq!(latest.content.as_deref(), Some(&b"rival write 8"[..]));
  assert_eq!(sync.state(), SyncState::Conflict);
  assert_eq!(remote.rejections(), 3);

  // Nothing of ours reached the remote, but it is safe on disk.
  let status = sync.status().await.unwrap();
  assert!(status.pending);
  let (cached, _) = sync.load_local().await.unwrap().unwrap();
  assert_eq!(cached.machines().count(), 1);
}

#[tokio::test]
async fn offline_remote_is_a_connectivity_error_and_keeps_local_copy() {
  let remote = MemoryRemote::new();
  remote.set_offline(true);
  let mut sync = SyncCoordinator::new(remote.clone(), cache().await, options());

  let err = sync.push(&one_machine_store(), "edit").await.unwrap_err();
  assert!(matches!(err, Error::Connectivity(_)), "{err}");
  assert!(err.is_retryable());
  assert_eq!(sync.state(), SyncState::Failed);
  assert!(sync.status().await.unwrap().pending);
  assert!(remote.snapshot().content.is_none());
}

#[tokio::test]
async fn unresponsive_remote_times_out() {
  let opts = SyncOptions { max_attempts: 3, timeout: Duration::from_millis(50) };
  let mut sync = SyncCoordinator::new(Stalled, cache().await, opts);

  let err = sync.push(&one_machine_store(), "edit").await.unwrap_err();
  assert!(matches!(err, Error::Connectivity(_)), "{err}");
  assert!(sync.status().await.unwrap().pending);
}

#[tokio::test]
async fn storage_failure_is_reported_after_the_remote_attempt() {
  let remote = MemoryRemote::new();
  let mut sync = SyncCoordinator::new(remote.clone(), FullDisk, options());

  let err = sync.push(&one_machine_store(), "edit").await.unwrap_err();
  assert!(matches!(err, Error::Storage(_)), "{err}");
  assert_eq!(remote.writes(), 1, "remote push still went ahead");
}

#[tokio::test]
async fn pull_of_absent_remote_leaves_cache_alone() {
  let mut sync = SyncCoordinator::new(MemoryRemote::new(), cache().await, options());
  assert!(sync.pull().await.unwrap().is_none());
  assert!(sync.load_local().await.unwrap().is_none());
}

#[tokio::test]
async fn pull_of_garbage_is_a_schema_error() {
  let mut sync =
    SyncCoordinator::new(MemoryRemote::with_content("not a workbook"), cache().await, options());
  let err = sync.pull().await.unwrap_err();
  assert!(matches!(err, Error::Schema(_)), "{err}");
  assert_eq!(sync.state(), SyncState::Failed);
}

// ─── Service ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn oil_change_end_to_end() {
  let remote = MemoryRemote::new();
  let coordinator = SyncCoordinator::new(remote.clone(), cache().await, options());
  let thresholds = Thresholds::new(
    ThresholdRule::Absolute { critical: 50.0, warning: 150.0 },
    ThresholdRule::default(),
  )
  .unwrap();
  let mut upkeep = Upkeep::open_with_clock(
    coordinator,
    UpkeepOptions { thresholds, auto_sync: false },
    clock,
  )
  .await
  .unwrap();

  let mut m = NewMachine::new("M");
  m.total_hours = 2400.0;
  let machine = upkeep.add_machine(m).await.unwrap();

  let mut oil = NewTask::new(machine, "oil change", 1000, IntervalUnit::Hours);
  oil.last_hours = Some(1500.0);
  let oil = upkeep.add_task(oil).await.unwrap();

  let task = upkeep.store().task(oil).unwrap();
  assert_eq!(task.next_due_hours, Some(2500.0));
  assert_eq!(task.remaining, 100.0);
  assert_eq!(task.status, Status::Warning);

  upkeep.complete_task(oil, Completion::new(today(), 2500.0)).await.unwrap();

  let task = upkeep.store().task(oil).unwrap();
  assert_eq!(task.last_hours, 2500.0);
  assert_eq!(task.next_due_hours, Some(3500.0));
  assert_eq!(task.remaining, 1000.0);
  assert_eq!(task.status, Status::Normal);
  assert_eq!(upkeep.machine(machine).unwrap().total_hours, 2500.0);
  assert_eq!(upkeep.history(machine).unwrap().len(), 1);

  assert!(upkeep.sync_status().await.unwrap().pending);
  assert!(remote.snapshot().content.is_none(), "no push without sync");
  upkeep.sync().await.unwrap();
  assert!(!upkeep.sync_status().await.unwrap().pending);
}

#[tokio::test]
async fn mutations_succeed_while_offline_and_sync_later() {
  let remote = MemoryRemote::new();
  remote.set_offline(true);
  let mut upkeep = service(remote.clone(), true).await;

  let id = upkeep.add_machine(NewMachine::new("Lathe")).await.unwrap();
  upkeep.update_machine_hours(id, 120.0).await.unwrap();
  assert!(upkeep.sync_status().await.unwrap().pending);

  assert!(matches!(upkeep.sync().await, Err(Error::Connectivity(_))));

  remote.set_offline(false);
  let report = upkeep.sync().await.unwrap();
  assert!(report.created);
  assert!(!upkeep.sync_status().await.unwrap().pending);

  let pushed = upkeep_workbook::decode(&remote.snapshot().content.unwrap()).unwrap();
  assert_eq!(pushed.machine(id).unwrap().total_hours, 120.0);
}

#[tokio::test]
async fn auto_sync_pushes_every_mutation() {
  let remote = MemoryRemote::new();
  let mut upkeep = service(remote.clone(), true).await;

  let id = upkeep.add_machine(NewMachine::new("Mill")).await.unwrap();
  upkeep
    .add_task(NewTask::new(id, "Grease", 30, IntervalUnit::Days))
    .await
    .unwrap();

  assert_eq!(remote.writes(), 2);
  assert_eq!(remote.messages(), vec!["Add machine 1".to_owned(), "Add task 1".to_owned()]);
  assert!(!upkeep.sync_status().await.unwrap().pending);
}

#[tokio::test]
async fn storage_failure_does_not_roll_back_memory() {
  let coordinator = SyncCoordinator::new(MemoryRemote::new(), FullDisk, options());
  let mut upkeep = Upkeep::open_with_clock(coordinator, UpkeepOptions::default(), clock)
    .await
    .unwrap();

  let err = upkeep.add_machine(NewMachine::new("Saw")).await.unwrap_err();
  assert!(matches!(err, Error::Storage(_)));
  assert_eq!(upkeep.machines().count(), 1);
}

#[tokio::test]
async fn validation_and_not_found_are_distinct() {
  let mut upkeep = service(MemoryRemote::new(), false).await;

  let err = upkeep
    .add_task(NewTask::new(42, "Grease", 10, IntervalUnit::Hours))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Validation(_)), "{err}");

  let err = upkeep.update_machine_hours(42, 10.0).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(_)), "{err}");

  let err = upkeep
    .complete_task(7, Completion::new(today(), 0.0))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(_)), "{err}");
}

#[tokio::test]
async fn reopening_restores_the_local_snapshot() {
  let cache = cache().await;
  let coordinator = SyncCoordinator::new(MemoryRemote::new(), cache.clone(), options());
  let mut upkeep = Upkeep::open_with_clock(coordinator, UpkeepOptions::default(), clock)
    .await
    .unwrap();
  let id = upkeep.add_machine(NewMachine::new("Drill")).await.unwrap();
  drop(upkeep);

  let coordinator = SyncCoordinator::new(MemoryRemote::new(), cache, options());
  let reopened = Upkeep::open_with_clock(coordinator, UpkeepOptions::default(), clock)
    .await
    .unwrap();
  assert_eq!(reopened.machine(id).unwrap().name, "Drill");
}

#[tokio::test]
async fn list_due_filters_and_orders_by_severity() {
  let mut upkeep = service(MemoryRemote::new(), false).await;
  let mut m = NewMachine::new("Press");
  m.total_hours = 1000.0;
  let press = upkeep.add_machine(m).await.unwrap();

  let mut overdue = NewTask::new(press, "Filters", 100, IntervalUnit::Hours);
  overdue.last_hours = Some(850.0);
  let overdue = upkeep.add_task(overdue).await.unwrap();

  let mut critical = NewTask::new(press, "Belts", 100, IntervalUnit::Hours);
  critical.last_hours = Some(903.0);
  let critical = upkeep.add_task(critical).await.unwrap();

  let mut later = NewTask::new(press, "Inspect", 100, IntervalUnit::Hours);
  later.last_hours = Some(950.0);
  let later = upkeep.add_task(later).await.unwrap();

  let all: Vec<_> = upkeep.list_due(StatusFilter::Any).iter().map(|i| i.task.id).collect();
  assert_eq!(all, vec![overdue, critical, later]);

  let urgent: Vec<_> = upkeep
    .list_due(StatusFilter::AtLeast(Status::Critical))
    .iter()
    .map(|i| i.task.id)
    .collect();
  assert_eq!(urgent, vec![overdue, critical]);

  let only: Vec<_> = upkeep
    .list_due(StatusFilter::Only(Status::Normal))
    .iter()
    .map(|i| i.task.id)
    .collect();
  assert_eq!(only, vec![later]);

  upkeep.deactivate_machine(press).await.unwrap();
  assert!(upkeep.list_due(StatusFilter::Any).is_empty());
}

#[tokio::test]
async fn two_writers_last_push_wins_without_losing_either_locally() {
  let remote = MemoryRemote::new();
  let mut a = service(remote.clone(), false).await;
  let mut b = service(remote.clone(), false).await;

  a.add_machine(NewMachine::new("From A")).await.unwrap();
  b.add_machine(NewMachine::new("From B")).await.unwrap();

  let first = a.sync().await.unwrap();
  let second = b.sync().await.unwrap();
  assert!(first.created);
  assert!(!second.created);
  assert_ne!(first.version, second.version);

  let on_remote = upkeep_workbook::decode(&remote.snapshot().content.unwrap()).unwrap();
  assert_eq!(on_remote.machine(1).unwrap().name, "From B");
  assert_eq!(a.machine(1).unwrap().name, "From A", "A keeps its own copy");

  assert!(a.pull().await.unwrap());
  assert_eq!(a.machine(1).unwrap().name, "From B");
  assert!(!a.sync_status().await.unwrap().pending);
}

#[tokio::test]
async fn history_is_newest_first() {
  let mut upkeep = service(MemoryRemote::new(), false).await;
  let press = upkeep.add_machine(NewMachine::new("Press")).await.unwrap();
  let task = upkeep
    .add_task(NewTask::new(press, "Grease", 10, IntervalUnit::Hours))
    .await
    .unwrap();

  let d1 = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
  let d2 = NaiveDate::from_ymd_opt(2024, 5, 20).unwrap();
  upkeep.complete_task(task, Completion::new(d2, 20.0)).await.unwrap();
  upkeep.complete_task(task, Completion::new(d1, 20.0)).await.unwrap();

  let dates: Vec<_> = upkeep.history(press).unwrap().iter().map(|l| l.performed_date).collect();
  assert_eq!(dates, vec![d2, d1]);
  assert!(matches!(upkeep.history(99), Err(Error::NotFound(_))));
}
