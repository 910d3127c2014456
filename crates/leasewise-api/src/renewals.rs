//! Handlers for `/renewals` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/renewals` | Optional `manager`, `stage`, `risk`, `city`, `zone`, `open_only`, `limit`, `offset` |
//! | `POST` | `/renewals` | Body: [`NewRenewal`]; returns 201 + view |
//! | `GET`  | `/renewals/:id` | View with `ETag` |
//! | `GET`  | `/renewals/:id/transitions` | Validation result for every stage |
//! | `POST` | `/renewals/:id/transition` | Body: [`TransitionBody`]; 409 on rejection |
//! | `POST` | `/renewals/:id/agreement` | Body: [`NewAgreement`] |
//! | `POST` | `/renewals/:id/alerts/:index/read` | Mark one alert read |
//! | `GET`  | `/renewals/:id/score` | Score impact as of now |
//!
//! Write endpoints honour `If-Match`.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use leasewise_core::{
  classify::RiskLevel,
  notify::NotificationStore,
  record::{NewAgreement, NewRenewal, RenewalRecord},
  score::ScoreImpact,
  stage::{RenewalStage, TransitionCheck},
  store::{RecordQuery, RenewalStore},
  view::RenewalView,
};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator as _;
use uuid::Uuid;

use crate::{
  error::ApiError,
  etag::compute_etag,
  identity::CurrentPm,
  workflow::{self, commit, load, load_for_update, stage_notification},
};

/// A materialised view with its `ETag` header.
pub(crate) fn view_response(
  status: StatusCode,
  record: RenewalRecord,
  now: DateTime<Utc>,
) -> Response {
  let etag = compute_etag(&record);
  let view = RenewalView::materialize(record, now);
  (status, [(header::ETAG, etag)], Json(view)).into_response()
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub manager:   Option<String>,
  pub stage:     Option<RenewalStage>,
  /// Derived as of the request; filtered after materialisation.
  pub risk:      Option<RiskLevel>,
  pub city:      Option<String>,
  pub zone:      Option<String>,
  #[serde(default)]
  pub open_only: bool,
  pub limit:     Option<usize>,
  pub offset:    Option<usize>,
}

/// `GET /renewals[?manager=...][&stage=...][&risk=...][&open_only=true]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<RenewalView>>, ApiError>
where
  S: RenewalStore,
{
  let now = Utc::now();
  let paginate_in_store = params.risk.is_none();
  let query = RecordQuery {
    manager:   params.manager,
    stage:     params.stage,
    city:      params.city,
    zone:      params.zone,
    open_only: params.open_only,
    limit:     params.limit.filter(|_| paginate_in_store),
    offset:    params.offset.filter(|_| paginate_in_store),
  };

  let records = store
    .list_records(&query)
    .await
    .map_err(ApiError::from_store)?;

  let views = records
    .into_iter()
    .map(|r| RenewalView::materialize(r, now));

  let views: Vec<_> = match params.risk {
    None => views.collect(),
    Some(risk) => views
      .filter(|v| v.status.risk == risk)
      .skip(params.offset.unwrap_or(0))
      .take(params.limit.unwrap_or(usize::MAX))
      .collect(),
  };
  Ok(Json(views))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /renewals`: returns 201 + the new view.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  CurrentPm(actor): CurrentPm,
  Json(body): Json<NewRenewal>,
) -> Result<Response, ApiError>
where
  S: RenewalStore + NotificationStore,
{
  if body.lease.end_date <= body.lease.start_date {
    return Err(ApiError::BadRequest(
      "lease end date must be after its start date".into(),
    ));
  }
  if body.property.manager.trim().is_empty() {
    return Err(ApiError::BadRequest("manager is required".into()));
  }

  let now = Utc::now();
  let mut record = RenewalRecord::new(body, now);
  let raised = record.sync_alerts(now);

  store
    .insert_record(&record)
    .await
    .map_err(ApiError::from_store)?;
  let notes = raised
    .iter()
    .map(|alert| workflow::alert_notification(&record, alert))
    .collect();
  workflow::publish(&*store, notes).await?;

  tracing::info!(
    record_id = %record.record_id,
    property = %record.property.name,
    created_by = %actor.name,
    "renewal created"
  );
  Ok(view_response(StatusCode::CREATED, record, now))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /renewals/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Response, ApiError>
where
  S: RenewalStore,
{
  let record = load(&*store, id).await?;
  Ok(view_response(StatusCode::OK, record, Utc::now()))
}

// ─── Transition options ───────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct TransitionOption {
  pub target: RenewalStage,
  pub label:  String,
  pub check:  TransitionCheck,
}

/// `GET /renewals/:id/transitions`: one entry per stage, in order.
pub async fn transitions<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<TransitionOption>>, ApiError>
where
  S: RenewalStore,
{
  let record = load(&*store, id).await?;
  let options = RenewalStage::iter()
    .map(|target| TransitionOption {
      target,
      label: target.label().to_owned(),
      check: record.check_transition(target),
    })
    .collect();
  Ok(Json(options))
}

// ─── Transition ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TransitionBody {
  pub target: RenewalStage,
  pub note:   Option<String>,
}

/// `POST /renewals/:id/transition`: body: `{"target":"proposal_sent","note":"..."}`
pub async fn transition<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  CurrentPm(actor): CurrentPm,
  headers: HeaderMap,
  Json(body): Json<TransitionBody>,
) -> Result<Response, ApiError>
where
  S: RenewalStore + NotificationStore,
{
  let now = Utc::now();
  let mut record = load_for_update(&*store, id, &headers).await?;
  let loaded = record.revision;

  let entry = match record.transition(body.target, &actor, body.note.as_deref(), now) {
    Ok(entry) => entry,
    Err(e) => {
      tracing::info!(record_id = %id, to = %body.target, reason = %e, "transition rejected");
      return Err(e.into());
    }
  };
  let notes = vec![stage_notification(&record, &entry)];
  commit(&*store, &mut record, loaded, notes, now).await?;

  tracing::info!(
    record_id = %id,
    from = %entry.from_stage,
    to = %entry.to_stage,
    actor = %actor.name,
    "renewal stage changed"
  );
  Ok(view_response(StatusCode::OK, record, now))
}

// ─── Agreement ────────────────────────────────────────────────────────────────

/// `POST /renewals/:id/agreement`: records the signed agreement and moves
/// the renewal to `agreement_uploaded`.
pub async fn upload_agreement<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
  CurrentPm(actor): CurrentPm,
  headers: HeaderMap,
  Json(body): Json<NewAgreement>,
) -> Result<Response, ApiError>
where
  S: RenewalStore + NotificationStore,
{
  let now = Utc::now();
  let mut record = load_for_update(&*store, id, &headers).await?;
  let loaded = record.revision;

  let entry = record.upload_agreement(body, &actor, now)?;
  let notes = vec![stage_notification(&record, &entry)];
  commit(&*store, &mut record, loaded, notes, now).await?;

  tracing::info!(record_id = %id, actor = %actor.name, "agreement uploaded");
  Ok(view_response(StatusCode::OK, record, now))
}

// ─── Alerts ───────────────────────────────────────────────────────────────────

/// `POST /renewals/:id/alerts/:index/read`
pub async fn mark_alert_read<S>(
  State(store): State<Arc<S>>,
  Path((id, index)): Path<(Uuid, usize)>,
  headers: HeaderMap,
) -> Result<Response, ApiError>
where
  S: RenewalStore + NotificationStore,
{
  let now = Utc::now();
  let mut record = load_for_update(&*store, id, &headers).await?;
  let loaded = record.revision;

  record.mark_alert_read(index)?;
  if record.revision != loaded {
    workflow::save(&*store, &record, loaded, Vec::new()).await?;
  }
  Ok(view_response(StatusCode::OK, record, now))
}

// ─── Score ────────────────────────────────────────────────────────────────────

/// `GET /renewals/:id/score`
pub async fn score<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<ScoreImpact>, ApiError>
where
  S: RenewalStore,
{
  let record = load(&*store, id).await?;
  let view = RenewalView::materialize(record, Utc::now());
  Ok(Json(view.status.score))
}
