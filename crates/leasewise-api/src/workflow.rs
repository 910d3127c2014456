//! Load / mutate / save plumbing shared by the write handlers, and the alert
//! sweep.
//!
//! Every write follows the same shape: load the record (checking `If-Match`),
//! apply one domain operation, save it against the revision it was loaded
//! at, then publish the notifications the operation produced. Notifications
//! are only published once the save has gone through.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use leasewise_core::{
  alert::{Alert, AlertSeverity},
  notify::{NewNotification, NotificationKind, NotificationStore},
  record::{ActionEntry, RenewalRecord},
  store::{RecordQuery, RenewalStore, StoreError as _},
};
use uuid::Uuid;

use crate::{error::ApiError, etag::check_if_match};

/// Fetch a record that is about to be mutated.
pub(crate) async fn load_for_update<S>(
  store: &S,
  id: Uuid,
  headers: &HeaderMap,
) -> Result<RenewalRecord, ApiError>
where
  S: RenewalStore,
{
  let record = load(store, id).await?;
  check_if_match(headers, &record)?;
  Ok(record)
}

pub(crate) async fn load<S>(store: &S, id: Uuid) -> Result<RenewalRecord, ApiError>
where
  S: RenewalStore,
{
  store
    .get_record(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound(format!("renewal {id} not found")))
}

/// Raise any due alerts, save, then publish `notes` plus one notification per
/// new alert.
pub(crate) async fn commit<S>(
  store: &S,
  record: &mut RenewalRecord,
  loaded_revision: u64,
  mut notes: Vec<NewNotification>,
  now: DateTime<Utc>,
) -> Result<(), ApiError>
where
  S: RenewalStore + NotificationStore,
{
  let raised = record.sync_alerts(now);
  let record: &RenewalRecord = record;
  notes.extend(raised.iter().map(|alert| alert_notification(record, alert)));
  save(store, record, loaded_revision, notes).await
}

/// Save without touching alerts.
pub(crate) async fn save<S>(
  store: &S,
  record: &RenewalRecord,
  loaded_revision: u64,
  notes: Vec<NewNotification>,
) -> Result<(), ApiError>
where
  S: RenewalStore + NotificationStore,
{
  store
    .save_record(record, loaded_revision)
    .await
    .map_err(ApiError::from_store)?;
  publish(store, notes).await
}

pub(crate) async fn publish<S>(store: &S, notes: Vec<NewNotification>) -> Result<(), ApiError>
where
  S: NotificationStore,
{
  for note in notes {
    store.add(note).await.map_err(ApiError::from_store)?;
  }
  Ok(())
}

// ─── Notification builders ──────────────────────────────────────────────────

pub(crate) fn stage_notification(record: &RenewalRecord, entry: &ActionEntry) -> NewNotification {
  NewNotification::new(
    NotificationKind::StageChanged,
    format!("{}: {}", record.property.name, entry.to_stage.label()),
    format!("{} by {}", entry.action, entry.actor),
  )
  .for_record(record.record_id)
}

pub(crate) fn alert_notification(record: &RenewalRecord, alert: &Alert) -> NewNotification {
  let title = match alert.severity {
    AlertSeverity::Warning => "Renewal stalled",
    AlertSeverity::Urgent => "Renewal at risk",
    AlertSeverity::Critical => "Renewal critical",
  };
  NewNotification::new(NotificationKind::Alert, title, alert.message.clone())
    .for_record(record.record_id)
}

// ─── Alert sweep ─────────────────────────────────────────────────────────────

/// Raise due alerts across all open renewals. Returns how many were raised.
///
/// A record that changes underneath the sweep is skipped; the next sweep
/// picks it up.
pub async fn sweep_alerts<S>(store: &S, now: DateTime<Utc>) -> Result<usize, ApiError>
where
  S: RenewalStore + NotificationStore,
{
  let query = RecordQuery { open_only: true, ..Default::default() };
  let records = store
    .list_records(&query)
    .await
    .map_err(ApiError::from_store)?;

  let mut raised = 0;
  for mut record in records {
    let loaded = record.revision;
    let alerts = record.sync_alerts(now);
    if alerts.is_empty() {
      continue;
    }

    match store.save_record(&record, loaded).await {
      Ok(()) => {}
      Err(e) if e.is_conflict() => {
        tracing::debug!(record_id = %record.record_id, "record moved during sweep");
        continue;
      }
      Err(e) => return Err(ApiError::from_store(e)),
    }

    let notes = alerts
      .iter()
      .map(|alert| alert_notification(&record, alert))
      .collect();
    publish(store, notes).await?;
    raised += alerts.len();
  }

  if raised > 0 {
    tracing::info!(raised, "alert sweep raised alerts");
  }
  Ok(raised)
}
