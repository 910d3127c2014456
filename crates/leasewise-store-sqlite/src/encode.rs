//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are `YYYY-MM-DD`, UUIDs are
//! hyphenated lowercase strings, and enums use their snake_case names.

use chrono::{DateTime, NaiveDate, Utc};
use leasewise_core::{
  ack::OtpChallenge,
  notify::{Notification, NotificationKind},
  record::{ActionEntry, ActionSource, RenewalRecord},
  stage::RenewalStage,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn encode_stage(stage: RenewalStage) -> &'static str { stage.into() }

pub fn decode_stage(s: &str) -> Result<RenewalStage> {
  s.parse::<RenewalStage>()
    .map_err(|_| Error::Decode(format!("unknown stage: {s:?}")))
}

pub fn encode_source(source: ActionSource) -> &'static str {
  match source {
    ActionSource::Pm => "pm",
    ActionSource::Owner => "owner",
    ActionSource::System => "system",
  }
}

pub fn decode_source(s: &str) -> Result<ActionSource> {
  match s {
    "pm" => Ok(ActionSource::Pm),
    "owner" => Ok(ActionSource::Owner),
    "system" => Ok(ActionSource::System),
    other => Err(Error::Decode(format!("unknown action source: {other:?}"))),
  }
}

pub fn encode_kind(kind: NotificationKind) -> &'static str {
  match kind {
    NotificationKind::OtpSent => "otp_sent",
    NotificationKind::AcknowledgementReceived => "acknowledgement_received",
    NotificationKind::StageChanged => "stage_changed",
    NotificationKind::Alert => "alert",
  }
}

pub fn decode_kind(s: &str) -> Result<NotificationKind> {
  match s {
    "otp_sent" => Ok(NotificationKind::OtpSent),
    "acknowledgement_received" => Ok(NotificationKind::AcknowledgementReceived),
    "stage_changed" => Ok(NotificationKind::StageChanged),
    "alert" => Ok(NotificationKind::Alert),
    other => Err(Error::Decode(format!("unknown notification kind: {other:?}"))),
  }
}

// ─── Record body ─────────────────────────────────────────────────────────────

/// Serialise a record for the `body_json` column. The action log is stored
/// row-by-row in `renewal_actions`, so it is stripped here.
pub fn encode_body(record: &RenewalRecord) -> Result<String> {
  let mut value = serde_json::to_value(record)?;
  if let Some(obj) = value.as_object_mut() {
    obj.remove("actions");
  }
  Ok(value.to_string())
}

pub fn encode_challenge(challenge: Option<&OtpChallenge>) -> Result<Option<String>> {
  challenge
    .map(serde_json::to_string)
    .transpose()
    .map_err(Error::from)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Columns of a `renewals` row needed to rebuild a record.
pub struct RawRecord {
  pub body_json:      String,
  pub challenge_json: Option<String>,
}

impl RawRecord {
  pub fn into_record(self, actions: Vec<RawAction>) -> Result<RenewalRecord> {
    let mut body: serde_json::Value = serde_json::from_str(&self.body_json)?;
    if let Some(obj) = body.as_object_mut() {
      obj.insert("actions".into(), serde_json::Value::Array(Vec::new()));
    }
    let mut record: RenewalRecord = serde_json::from_value(body)?;

    record.challenge = self
      .challenge_json
      .as_deref()
      .map(serde_json::from_str::<OtpChallenge>)
      .transpose()?;
    record.actions = actions
      .into_iter()
      .map(RawAction::into_entry)
      .collect::<Result<_>>()?;
    Ok(record)
  }
}

/// Raw strings read directly from a `renewal_actions` row.
pub struct RawAction {
  pub seq:        i64,
  pub action:     String,
  pub actor:      String,
  pub source:     String,
  pub at:         String,
  pub from_stage: String,
  pub to_stage:   String,
}

impl RawAction {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      seq:        row.get(0)?,
      action:     row.get(1)?,
      actor:      row.get(2)?,
      source:     row.get(3)?,
      at:         row.get(4)?,
      from_stage: row.get(5)?,
      to_stage:   row.get(6)?,
    })
  }

  pub fn into_entry(self) -> Result<ActionEntry> {
    Ok(ActionEntry {
      seq:        u32::try_from(self.seq)
        .map_err(|_| Error::Decode(format!("bad action seq: {}", self.seq)))?,
      action:     self.action,
      actor:      self.actor,
      source:     decode_source(&self.source)?,
      at:         decode_dt(&self.at)?,
      from_stage: decode_stage(&self.from_stage)?,
      to_stage:   decode_stage(&self.to_stage)?,
    })
  }
}

/// Raw strings read directly from a `notifications` row.
pub struct RawNotification {
  pub notification_id: String,
  pub kind:            String,
  pub title:           String,
  pub message:         String,
  pub record_id:       Option<String>,
  pub created_at:      String,
  pub read:            bool,
}

impl RawNotification {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      kind:            row.get(1)?,
      title:           row.get(2)?,
      message:         row.get(3)?,
      record_id:       row.get(4)?,
      created_at:      row.get(5)?,
      read:            row.get(6)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      kind:            decode_kind(&self.kind)?,
      title:           self.title,
      message:         self.message,
      record_id:       self.record_id.as_deref().map(decode_uuid).transpose()?,
      created_at:      decode_dt(&self.created_at)?,
      read:            self.read,
    })
  }
}
