//! Risk, escalation and health classifiers.
//!
//! All three are pure functions of a record snapshot and the current time.
//! They are recomputed on every read and never persisted.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::stage::RenewalStage;

/// Days-to-expiry below which risk is red.
pub const RISK_RED_DAYS: i64 = 30;
/// Days-to-expiry below which risk is amber.
pub const RISK_AMBER_DAYS: i64 = 45;
/// Days-to-expiry below which a missing agreement is critical.
pub const ESCALATION_CRITICAL_DAYS: i64 = 15;
/// Days-to-expiry below which a missing agreement is a red escalation.
pub const ESCALATION_RED_DAYS: i64 = 30;
/// Days spent in one stage before the record is flagged yellow.
pub const STALE_STAGE_DAYS: i64 = 15;

// ─── Levels ──────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RiskLevel {
  Green,
  Amber,
  Red,
}

/// Ordered from least to most severe.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EscalationStatus {
  None,
  Yellow,
  Red,
  Critical,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RenewalHealth {
  Green,
  Yellow,
  Red,
}

// ─── Time helpers ────────────────────────────────────────────────────────────

/// Whole days from `now` until `end`. Negative once the lease has lapsed.
pub fn days_until(end: NaiveDate, now: DateTime<Utc>) -> i64 {
  (end - now.date_naive()).num_days()
}

/// Whole days elapsed since `since`.
pub fn days_since(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
  (now - since).num_days()
}

// ─── Classifiers ─────────────────────────────────────────────────────────────

/// Coarse urgency of a renewal.
///
/// `_notice_period` is accepted so thresholds can later scale with the
/// lease's notice period; the current thresholds are fixed.
pub fn classify_risk(
  days_to_expiry: i64,
  stage: RenewalStage,
  _notice_period: u32,
) -> RiskLevel {
  match stage {
    RenewalStage::RenewalFailed => RiskLevel::Red,
    RenewalStage::RenewalCompleted => RiskLevel::Green,
    _ if days_to_expiry < RISK_RED_DAYS => RiskLevel::Red,
    _ if days_to_expiry < RISK_AMBER_DAYS => RiskLevel::Amber,
    _ => RiskLevel::Green,
  }
}

/// Lateness of a renewal; the first matching rule wins.
pub fn classify_escalation(
  days_to_expiry: i64,
  stage: RenewalStage,
  agreement_uploaded: bool,
  days_in_stage: i64,
) -> EscalationStatus {
  if stage.is_terminal() {
    return EscalationStatus::None;
  }
  if days_to_expiry < ESCALATION_CRITICAL_DAYS && !agreement_uploaded {
    return EscalationStatus::Critical;
  }
  if days_to_expiry < ESCALATION_RED_DAYS && !agreement_uploaded {
    return EscalationStatus::Red;
  }
  if days_in_stage >= STALE_STAGE_DAYS {
    return EscalationStatus::Yellow;
  }
  EscalationStatus::None
}

/// Dashboard summary combining terminal state, escalation and time left.
pub fn classify_health(
  days_to_expiry: i64,
  stage: RenewalStage,
  escalation: EscalationStatus,
) -> RenewalHealth {
  match stage {
    RenewalStage::RenewalCompleted => return RenewalHealth::Green,
    RenewalStage::RenewalFailed => return RenewalHealth::Red,
    _ => {}
  }
  match escalation {
    EscalationStatus::Critical | EscalationStatus::Red => RenewalHealth::Red,
    EscalationStatus::Yellow => RenewalHealth::Yellow,
    EscalationStatus::None if days_to_expiry < RISK_RED_DAYS => {
      RenewalHealth::Yellow
    }
    EscalationStatus::None => RenewalHealth::Green,
  }
}
