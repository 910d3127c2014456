//! Handlers for `/notifications` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/notifications` | Optional `?unread_only=true`; newest first |
//! | `DELETE` | `/notifications` | Removes everything |
//! | `POST`   | `/notifications/:id/read` | 204 |
//! | `POST`   | `/notifications/read-all` | |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use leasewise_core::notify::{Notification, NotificationStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub unread_only: bool,
}

/// Number of notifications affected by a bulk operation.
#[derive(Debug, Serialize, Deserialize)]
pub struct Affected {
  pub count: usize,
}

/// `GET /notifications[?unread_only=true]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Notification>>, ApiError>
where
  S: NotificationStore,
{
  let notifications = store
    .list(params.unread_only)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Json(notifications))
}

/// `DELETE /notifications`
pub async fn clear<S>(State(store): State<Arc<S>>) -> Result<Json<Affected>, ApiError>
where
  S: NotificationStore,
{
  let count = store.clear().await.map_err(ApiError::from_store)?;
  Ok(Json(Affected { count }))
}

/// `POST /notifications/:id/read`
pub async fn mark_read<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: NotificationStore,
{
  store.mark_read(id).await.map_err(ApiError::from_store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `POST /notifications/read-all`
pub async fn mark_all_read<S>(State(store): State<Arc<S>>) -> Result<Json<Affected>, ApiError>
where
  S: NotificationStore,
{
  let count = store.mark_all_read().await.map_err(ApiError::from_store)?;
  Ok(Json(Affected { count }))
}
