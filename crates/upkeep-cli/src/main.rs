//! `upkeep` — command-line front end for the maintenance tracker.
//!
//! # Usage
//!
//! ```text
//! upkeep add-machine "Press 4" --department Moulding --hours 1200
//! upkeep add-task 1 "Oil change" --every 250 --unit hours
//! upkeep due --at-least warning
//! upkeep complete 1 --technician Sam
//! upkeep sync
//! ```
//!
//! Settings come from `upkeep.toml` (see [`settings`]) and `UPKEEP_*`
//! environment variables. Without a `[remote]` section the tracker runs
//! local-only.

mod commands;
mod settings;

use std::{
  io,
  path::{Path, PathBuf},
};

use anyhow::{Context as _, Result, bail};
use chrono::{TimeDelta, Utc};
use clap::Parser;
use commands::Command;
use settings::Settings;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use upkeep_cache_sqlite::SqliteCache;
use upkeep_core::remote::RemoteStore;
use upkeep_remote::{HttpRemote, MemoryRemote};
use upkeep_sync::{SyncCoordinator, Upkeep, UpkeepOptions};

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "upkeep", version, about = "Track recurring machine maintenance")]
struct Args {
  /// Path to the TOML settings file.
  #[arg(short, long, value_name = "FILE", default_value = "upkeep.toml", env = "UPKEEP_CONFIG")]
  config: PathBuf,

  /// Override the local cache location.
  #[arg(long, value_name = "FILE")]
  cache: Option<PathBuf>,

  /// Push after every change.
  #[arg(long)]
  auto_sync: bool,

  #[command(subcommand)]
  command: Command,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();
  let mut settings = Settings::load(&args.config)?;
  if let Some(cache) = args.cache {
    settings.cache_path = cache;
  }
  settings.auto_sync |= args.auto_sync;

  let cache_path = expand_tilde(&settings.cache_path);
  if let Some(parent) = cache_path.parent()
    && !parent.as_os_str().is_empty()
  {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("creating cache directory {}", parent.display()))?;
  }
  let cache = SqliteCache::open(&cache_path)
    .await
    .with_context(|| format!("opening cache at {}", cache_path.display()))?;

  let cutoff = Utc::now() - TimeDelta::days(i64::from(settings.backup_retention_days));
  let pruned = cache.prune_backups(cutoff).await.context("pruning old backups")?;
  if pruned > 0 {
    tracing::info!(pruned, "removed expired backups");
  }

  match settings.remote_config() {
    Some(remote) => {
      tracing::debug!(?remote, "using remote document");
      let remote = HttpRemote::new(remote).context("building HTTP client")?;
      execute(remote, cache, &settings, args.command).await
    }
    None => {
      if args.command.needs_remote() {
        bail!("no [remote] configured in {}", args.config.display());
      }
      if settings.auto_sync {
        tracing::warn!("auto_sync is set but no remote is configured; ignoring it");
        settings.auto_sync = false;
      }
      execute(MemoryRemote::new(), cache, &settings, args.command).await
    }
  }
}

async fn execute<R: RemoteStore>(
  remote: R,
  cache: SqliteCache,
  settings: &Settings,
  command: Command,
) -> Result<()> {
  let coordinator = SyncCoordinator::new(remote, cache, settings.sync_options());
  let options = UpkeepOptions { thresholds: settings.thresholds, auto_sync: settings.auto_sync };
  let mut upkeep = Upkeep::open(coordinator, options)
    .await
    .context("loading maintenance records")?;

  let mut stdout = io::stdout().lock();
  commands::run(&mut upkeep, command, settings.backup_retention_days, &mut stdout).await
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
