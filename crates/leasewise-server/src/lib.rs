//! HTTP server for Leasewise.
//!
//! Wraps the JSON API from [`leasewise_api`] with Basic auth and request
//! tracing, and seeds an empty store with fixture renewals at startup.

pub mod auth;
pub mod error;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware, routing::get};
use chrono::{DateTime, Utc};
use leasewise_core::{
  fixture::FixtureSource,
  notify::NotificationStore,
  store::RenewalStore,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `LEASEWISE_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  /// SQLite database file. The store lives in memory when unset.
  pub store_path:         Option<PathBuf>,
  pub auth_username:      String,
  pub auth_password_hash: String,
  /// Renewals generated into an empty store at startup.
  #[serde(default)]
  pub fixture_count:      usize,
  #[serde(default = "default_fixture_seed")]
  pub fixture_seed:       u64,
  /// Interval of the background alert sweep; `0` disables it.
  #[serde(default = "default_alert_sweep_secs")]
  pub alert_sweep_secs:   u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_fixture_seed() -> u64 { 42 }

fn default_alert_sweep_secs() -> u64 { 300 }

// ─── Application state ────────────────────────────────────────────────────────

/// Everything the router needs.
#[derive(Clone)]
pub struct AppState<S> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server router: `/health` is open, everything under `/api`
/// requires Basic auth.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RenewalStore + NotificationStore + 'static,
{
  let api = leasewise_api::api_router(state.store.clone()).layer(
    middleware::from_fn_with_state(state.auth.clone(), auth::require_pm),
  );

  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}

// ─── Fixtures ─────────────────────────────────────────────────────────────────

/// Fill an empty store from `source`. Returns how many renewals were added;
/// a store that already holds data is left alone.
pub async fn seed_if_empty<S, F>(store: &S, source: &mut F, now: DateTime<Utc>) -> Result<usize>
where
  S: RenewalStore,
  F: FixtureSource,
{
  let existing = store
    .count_records()
    .await
    .map_err(|e| Error::Store(Box::new(e)))?;
  if existing > 0 {
    tracing::info!(existing, "store already populated; skipping fixtures");
    return Ok(0);
  }

  let records = source.generate(now)?;
  for record in &records {
    store
      .insert_record(record)
      .await
      .map_err(|e| Error::Store(Box::new(e)))?;
  }
  tracing::info!(count = records.len(), "seeded fixture renewals");
  Ok(records.len())
}

// ─── Integration tests ────────────────────────────────────────────────────────
