//! The `RenewalStore` trait and supporting query types.
//!
//! Implemented by storage backends (e.g. `leasewise-store-sqlite`). The API
//! layer depends on this abstraction, not on a concrete backend.

use std::future::Future;

use serde::Deserialize;
use uuid::Uuid;

use crate::{record::RenewalRecord, stage::RenewalStage};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`RenewalStore::list_records`]. All filters are exact
/// matches and combine with AND.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordQuery {
  pub manager:   Option<String>,
  pub stage:     Option<RenewalStage>,
  pub city:      Option<String>,
  pub zone:      Option<String>,
  /// Skip records in a terminal stage.
  #[serde(default)]
  pub open_only: bool,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Error types returned by a [`RenewalStore`] or
/// [`NotificationStore`](crate::notify::NotificationStore).
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` when a save lost an optimistic-concurrency race.
  fn is_conflict(&self) -> bool;

  /// `true` when the addressed record or notification does not exist.
  fn is_not_found(&self) -> bool { false }
}

/// Abstraction over a renewal store backend.
///
/// Records are saved as whole snapshots guarded by their revision. The action
/// log is append-only: a save may add entries but never rewrites or drops
/// existing ones.
pub trait RenewalStore: Send + Sync {
  type Error: StoreError;

  /// Persist a record that does not exist yet.
  fn insert_record<'a>(
    &'a self,
    record: &'a RenewalRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Retrieve a record by id. Returns `None` if not found.
  fn get_record(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<RenewalRecord>, Self::Error>> + Send + '_;

  /// List records matching `query`, ordered by lease end date.
  fn list_records<'a>(
    &'a self,
    query: &'a RecordQuery,
  ) -> impl Future<Output = Result<Vec<RenewalRecord>, Self::Error>> + Send + 'a;

  /// Save a mutated record.
  ///
  /// `expected_revision` is the revision the record was loaded at; the save
  /// fails if the stored revision has moved since.
  fn save_record<'a>(
    &'a self,
    record: &'a RenewalRecord,
    expected_revision: u64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  fn count_records(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
