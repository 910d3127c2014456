//! leasewise-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) layered with
//! `LEASEWISE_*` environment variables, opens a SQLite store, seeds it with
//! fixture renewals when empty, and serves the JSON API over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash`:
//!
//! ```
//! cargo run -p leasewise-server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use chrono::Utc;
use clap::Parser;
use leasewise_core::fixture::SeededFixtures;
use leasewise_server::{AppState, ServerConfig, auth::AuthConfig, seed_if_empty};
use leasewise_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Leasewise renewal tracking server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,

  /// Override the fixture seed from the configuration.
  #[arg(long)]
  seed: Option<u64>,

  /// Override how many fixture renewals an empty store receives.
  #[arg(long)]
  fixtures: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("LEASEWISE"))
    .build()
    .context("failed to read config file")?;

  let mut server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;
  if let Some(seed) = cli.seed {
    server_cfg.fixture_seed = seed;
  }
  if let Some(count) = cli.fixtures {
    server_cfg.fixture_count = count;
  }

  // Open SQLite store.
  let store = match &server_cfg.store_path {
    Some(path) => {
      let path = expand_tilde(path);
      SqliteStore::open(&path)
        .await
        .with_context(|| format!("failed to open store at {path:?}"))?
    }
    None => {
      tracing::warn!("no store_path configured; data will not survive a restart");
      SqliteStore::open_in_memory()
        .await
        .context("failed to open in-memory store")?
    }
  };
  let store = Arc::new(store);

  if server_cfg.fixture_count > 0 {
    let mut fixtures =
      SeededFixtures::new(server_cfg.fixture_seed, server_cfg.fixture_count);
    seed_if_empty(&*store, &mut fixtures, Utc::now())
      .await
      .context("failed to seed fixtures")?;
  }

  if server_cfg.alert_sweep_secs > 0 {
    spawn_alert_sweep(store.clone(), Duration::from_secs(server_cfg.alert_sweep_secs));
  }

  // Build application state.
  let state = AppState {
    store,
    auth: Arc::new(AuthConfig {
      username:      server_cfg.auth_username.clone(),
      password_hash: server_cfg.auth_password_hash.clone(),
    }),
  };

  let app = leasewise_server::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  tracing::info!("server stopped");
  Ok(())
}

/// Periodically raise alerts for renewals that escalated with nobody touching
/// them.
fn spawn_alert_sweep(store: Arc<SqliteStore>, every: Duration) {
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    loop {
      ticker.tick().await;
      if let Err(e) = leasewise_api::sweep_alerts(&*store, Utc::now()).await {
        tracing::warn!(error = %e, "alert sweep failed");
      }
    }
  });
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(error = %e, "failed to listen for ctrl-c");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutdown requested");
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
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
