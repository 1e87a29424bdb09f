//! upkeep-server binary.
//!
//! Reads `upkeep-server.toml` (or the path given with `--config`), loads the
//! document directory and serves the contents protocol over HTTP.
//!
//! # Accounts
//!
//! ```toml
//! data_dir = "/var/lib/upkeep-server"
//!
//! [[users]]
//! username      = "shop"
//! password_hash = "$argon2id$v=19$..."
//! role          = "editor"
//! ```
//!
//! Generate a `password_hash` with:
//!
//! ```text
//! cargo run -p upkeep-server -- --hash-password
//! ```

use std::{io, path::PathBuf, sync::Arc};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use upkeep_server::{AppState, ServerConfig, auth::AuthConfig, documents::DocumentStore};

#[derive(Parser)]
#[command(author, version, about = "Upkeep document server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "upkeep-server.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  if cli.hash_password {
    let password = io::stdin().lines().next().context("no password on stdin")??;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("UPKEEP_SERVER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.users.is_empty() {
    tracing::warn!("no users configured; every request will be rejected");
  }

  let documents = match &server_cfg.data_dir {
    Some(dir) => DocumentStore::open(dir)
      .await
      .with_context(|| format!("failed to open document directory {dir:?}"))?,
    None => {
      tracing::warn!("no data_dir configured; documents are kept in memory only");
      DocumentStore::in_memory()
    }
  };

  let state = AppState {
    documents: Arc::new(documents),
    auth:      Arc::new(AuthConfig { users: server_cfg.users.clone() }),
  };

  let app = upkeep_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}/contents");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
