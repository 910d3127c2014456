//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use leasewise_core::{Error as CoreError, store::StoreError};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("unauthorized")]
  Unauthorized,

  /// The request's `If-Match` no longer names the current revision.
  #[error("precondition failed")]
  PreconditionFailed,

  /// Another writer saved the record between our load and save.
  #[error("conflict: {0}")]
  Conflict(String),

  #[error(transparent)]
  Domain(#[from] CoreError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a store failure.
  pub fn from_store<E: StoreError>(e: E) -> Self {
    if e.is_conflict() {
      ApiError::Conflict(e.to_string())
    } else if e.is_not_found() {
      ApiError::NotFound(e.to_string())
    } else {
      ApiError::Store(Box::new(e))
    }
  }
}

fn domain_status(e: &CoreError) -> StatusCode {
  match e {
    CoreError::AlertNotFound(_) => StatusCode::NOT_FOUND,
    CoreError::TransitionRejected { .. }
    | CoreError::OwnerAckRequired
    | CoreError::AckNotExpected(_)
    | CoreError::AlreadyAcknowledged
    | CoreError::NoPendingAcknowledgement => StatusCode::CONFLICT,
    CoreError::AgreementMissing
    | CoreError::OtpExpired
    | CoreError::OtpMismatch => StatusCode::UNPROCESSABLE_ENTITY,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Unauthorized => {
        (StatusCode::UNAUTHORIZED, json!({ "error": "unauthorized" }))
      }
      ApiError::PreconditionFailed => (
        StatusCode::PRECONDITION_FAILED,
        json!({ "error": self.to_string() }),
      ),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
      ApiError::Domain(CoreError::TransitionRejected { from, to, check }) => (
        StatusCode::CONFLICT,
        json!({
          "error": check.reason.as_deref().unwrap_or("transition not allowed"),
          "from": from,
          "to": to,
          "required_prior_stage": check.required_prior_stage,
        }),
      ),
      ApiError::Domain(e) => (domain_status(e), json!({ "error": e.to_string() })),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (
          StatusCode::INTERNAL_SERVER_ERROR,
          json!({ "error": e.to_string() }),
        )
      }
    };

    let mut res = (status, Json(body)).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"leasewise\""),
      );
    }
    res
  }
}
