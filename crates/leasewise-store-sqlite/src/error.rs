//! Error type for `leasewise-store-sqlite`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] leasewise_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("decode error: {0}")]
  Decode(String),

  #[error("renewal not found: {0}")]
  RecordNotFound(Uuid),

  #[error("renewal {0} already exists")]
  RecordExists(Uuid),

  /// The record changed since it was loaded.
  #[error("renewal {record_id} is at revision {actual}, expected {expected}")]
  StaleRevision {
    record_id: Uuid,
    expected:  u64,
    actual:    u64,
  },

  /// A save tried to drop entries from the append-only action log.
  #[error("renewal {record_id} has {stored} logged actions but {given} were supplied")]
  ActionLogTruncated {
    record_id: Uuid,
    stored:    usize,
    given:     usize,
  },

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl leasewise_core::store::StoreError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Self::StaleRevision { .. }) }

  fn is_not_found(&self) -> bool {
    matches!(self, Self::RecordNotFound(_) | Self::NotificationNotFound(_))
  }
}
