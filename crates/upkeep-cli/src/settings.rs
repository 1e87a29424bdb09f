//! Layered settings: built-in defaults, then `upkeep.toml`, then `UPKEEP_*`
//! environment variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `UPKEEP_REMOTE__TOKEN` sets `remote.token`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use serde::Deserialize;
use upkeep_core::schedule::Thresholds;
use upkeep_remote::RemoteConfig;
use upkeep_sync::SyncOptions;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  /// SQLite file holding the local snapshot and backups.
  #[serde(default = "default_cache_path")]
  pub cache_path:            PathBuf,
  /// Unset means local-only operation.
  #[serde(default)]
  pub remote:                Option<RemoteSettings>,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs:          u64,
  #[serde(default = "default_max_attempts")]
  pub max_attempts:          u32,
  #[serde(default)]
  pub auto_sync:             bool,
  #[serde(default)]
  pub thresholds:            Thresholds,
  #[serde(default = "default_retention_days")]
  pub backup_retention_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteSettings {
  pub url:      String,
  pub key:      String,
  #[serde(default)]
  pub token:    Option<String>,
  #[serde(default)]
  pub username: Option<String>,
  #[serde(default)]
  pub branch:   Option<String>,
}

fn default_cache_path() -> PathBuf { PathBuf::from("~/.local/share/upkeep/cache.db") }

fn default_timeout_secs() -> u64 { 30 }

fn default_max_attempts() -> u32 { 3 }

fn default_retention_days() -> u32 { 30 }

/// `UPKEEP_` prefix, `__` between nested keys.
fn environment() -> config::Environment {
  config::Environment::with_prefix("UPKEEP").prefix_separator("_").separator("__")
}

impl Settings {
  /// Read `path` (if it exists) and the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(environment())
      .build()
      .with_context(|| format!("failed to read settings from {}", path.display()))?;
    Self::from_config(settings)
  }

  fn from_config(config: config::Config) -> anyhow::Result<Self> {
    let settings: Self = config.try_deserialize().context("invalid settings")?;
    settings.thresholds.validate().context("invalid thresholds")?;
    Ok(settings)
  }

  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }

  pub fn sync_options(&self) -> SyncOptions {
    SyncOptions { max_attempts: self.max_attempts, timeout: self.timeout() }
  }

  pub fn remote_config(&self) -> Option<RemoteConfig> {
    self.remote.as_ref().map(|r| RemoteConfig {
      base_url: r.url.clone(),
      key:      r.key.clone(),
      token:    r.token.clone(),
      username: r.username.clone(),
      branch:   r.branch.clone(),
      timeout:  self.timeout(),
    })
  }
}
