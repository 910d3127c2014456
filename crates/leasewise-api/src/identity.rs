//! The acting property manager.
//!
//! Authentication happens outside this crate. Whatever layer verifies the
//! caller inserts a [`PmIdentity`] into the request extensions; handlers that
//! write to the action log pull it back out through [`CurrentPm`].

use axum::{extract::FromRequestParts, http::request::Parts};
use leasewise_core::record::Actor;

use crate::error::ApiError;

/// Username of an authenticated PM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PmIdentity(pub String);

/// Extractor for the PM making the request. Rejects with 401 when no
/// identity was attached.
#[derive(Debug, Clone)]
pub struct CurrentPm(pub Actor);

impl<S> FromRequestParts<S> for CurrentPm
where
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &S,
  ) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<PmIdentity>()
      .map(|id| CurrentPm(Actor::pm(id.0.clone())))
      .ok_or(ApiError::Unauthorized)
  }
}
