//! Handlers for the owner acknowledgement flow.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/renewals/:id/acknowledgement/request` | Issues a code; returns 202 |
//! | `POST` | `/renewals/:id/acknowledgement/respond` | Body: [`RespondBody`] |
//!
//! There is no SMS or e-mail gateway. The issued code is delivered as an
//! `otp_sent` notification.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use leasewise_core::{
  ack::{OTP_TTL_MINUTES, OwnerResponse},
  notify::{NewNotification, NotificationKind, NotificationStore},
  store::RenewalStore,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  error::ApiError,
  renewals::view_response,
  workflow::{commit, load_for_update, stage_notification},
};

// ─── Request ──────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct AckRequested {
  pub record_id:  Uuid,
  pub expires_at: DateTime<Utc>,
}

/// `POST /renewals/:id/acknowledgement/request`
pub async fn request<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: RenewalStore + NotificationStore,
{
  let now = Utc::now();
  let mut record = load_for_update(&*store, id, &headers).await?;
  let loaded = record.revision;

  let (_, code) = record.request_acknowledgement(now, &mut OsRng)?;
  let expires_at = record
    .challenge
    .as_ref()
    .map_or(now, |c| c.expires_at);

  let note = NewNotification::new(
    NotificationKind::OtpSent,
    format!("Verification code for {}", record.property.name),
    format!(
      "Code {code} sent to owner {}; valid for {OTP_TTL_MINUTES} minutes",
      record.property.owner_name
    ),
  )
  .for_record(id);
  commit(&*store, &mut record, loaded, vec![note], now).await?;

  tracing::info!(record_id = %id, "owner acknowledgement requested");
  Ok((StatusCode::ACCEPTED, Json(AckRequested { record_id: id, expires_at })).into_response())
}

// ─── Respond ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RespondBody {
  pub otp:      String,
  pub response: OwnerResponse,
}

/// `POST /renewals/:id/acknowledgement/respond`: body:
/// `{"otp":"123456","response":"accepted"}`
pub async fn respond<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  headers: HeaderMap,
  Json(body): Json<RespondBody>,
) -> Result<Response, ApiError>
where
  S: RenewalStore + NotificationStore,
{
  let now = Utc::now();
  let mut record = load_for_update(&*store, id, &headers).await?;
  let loaded = record.revision;

  let entry = match record.respond_acknowledgement(&body.otp, body.response, now) {
    Ok(entry) => entry,
    Err(e) => {
      tracing::warn!(record_id = %id, reason = %e, "owner acknowledgement refused");
      return Err(e.into());
    }
  };

  let mut notes = vec![
    NewNotification::new(
      NotificationKind::AcknowledgementReceived,
      format!("Owner responded for {}", record.property.name),
      format!("{} {}", record.property.owner_name, body.response.label()),
    )
    .for_record(id),
  ];
  if entry.from_stage != entry.to_stage {
    notes.push(stage_notification(&record, &entry));
  }
  commit(&*store, &mut record, loaded, notes, now).await?;

  tracing::info!(record_id = %id, response = ?body.response, "owner acknowledgement recorded");
  Ok(view_response(StatusCode::OK, record, now))
}
