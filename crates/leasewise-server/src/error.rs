//! Error type for server startup tasks.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("fixture generation failed: {0}")]
  Fixture(#[from] leasewise_core::Error),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
