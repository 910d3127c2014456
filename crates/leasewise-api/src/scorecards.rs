//! Handler for `GET /scorecards`.

use std::sync::Arc;

use axum::{Json, extract::State};
use chrono::Utc;
use leasewise_core::{
  scorecard::{PmScorecard, leaderboard},
  store::{RecordQuery, RenewalStore},
  view::RenewalView,
};

use crate::error::ApiError;

/// `GET /scorecards`: every manager, best first.
pub async fn handler<S>(State(store): State<Arc<S>>) -> Result<Json<Vec<PmScorecard>>, ApiError>
where
  S: RenewalStore,
{
  let now = Utc::now();
  let records = store
    .list_records(&RecordQuery::default())
    .await
    .map_err(ApiError::from_store)?;
  let views: Vec<_> = records
    .into_iter()
    .map(|r| RenewalView::materialize(r, now))
    .collect();
  Ok(Json(leaderboard(&views)))
}
