//! Notifications and the repository they live in.
//!
//! A [`NotificationStore`] is created at startup and handed to whoever needs
//! it; there is no process-global notification list.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
  /// A verification code was delivered to an owner (simulated SMS/email).
  OtpSent,
  AcknowledgementReceived,
  StageChanged,
  Alert,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  pub kind:            NotificationKind,
  pub title:           String,
  pub message:         String,
  pub record_id:       Option<Uuid>,
  pub created_at:      DateTime<Utc>,
  pub read:            bool,
}

/// Input to [`NotificationStore::add`]; id, timestamp and read flag are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewNotification {
  pub kind:      NotificationKind,
  pub title:     String,
  pub message:   String,
  pub record_id: Option<Uuid>,
}

impl NewNotification {
  pub fn new(
    kind: NotificationKind,
    title: impl Into<String>,
    message: impl Into<String>,
  ) -> Self {
    Self {
      kind,
      title: title.into(),
      message: message.into(),
      record_id: None,
    }
  }

  pub fn for_record(mut self, record_id: Uuid) -> Self {
    self.record_id = Some(record_id);
    self
  }
}

/// Repository for user-facing notifications.
pub trait NotificationStore: Send + Sync {
  type Error: StoreError;

  fn add(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Newest first.
  fn list(
    &self,
    unread_only: bool,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  /// Returns an error if the notification does not exist.
  fn mark_read(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Returns how many notifications changed.
  fn mark_all_read(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Remove every notification; returns how many were removed.
  fn clear(&self) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}
