//! Materialised read model for a renewal.
//!
//! Risk, escalation, health and score depend on the wall clock, so they are
//! computed fresh for every read and never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  classify::{
    EscalationStatus, RenewalHealth, RiskLevel, classify_health, classify_risk,
  },
  record::RenewalRecord,
  score::{ScoreImpact, compute_score_impact},
};

/// Everything derived from a record at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenewalStatus {
  pub days_to_expiry: i64,
  pub days_in_stage:  i64,
  pub risk:           RiskLevel,
  pub escalation:     EscalationStatus,
  pub health:         RenewalHealth,
  pub score:          ScoreImpact,
  pub unread_alerts:  usize,
}

impl RenewalStatus {
  pub fn derive(record: &RenewalRecord, now: DateTime<Utc>) -> Self {
    let days_to_expiry = record.days_to_expiry(now);
    let notice = record.lease.notice_period;
    let escalation = record.escalation(now);
    Self {
      days_to_expiry,
      days_in_stage: record.days_in_stage(now),
      risk: classify_risk(days_to_expiry, record.stage, notice),
      escalation,
      health: classify_health(days_to_expiry, record.stage, escalation),
      score: compute_score_impact(
        days_to_expiry,
        record.stage,
        record.has_owner_ack(),
        notice,
      ),
      unread_alerts: record.alerts.iter().filter(|a| !a.read).count(),
    }
  }
}

/// A record bundled with its derived status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalView {
  pub record: RenewalRecord,
  /// The point in time at which this view was materialised.
  pub as_of:  DateTime<Utc>,
  pub status: RenewalStatus,
}

impl RenewalView {
  pub fn materialize(record: RenewalRecord, as_of: DateTime<Utc>) -> Self {
    let status = RenewalStatus::derive(&record, as_of);
    Self { record, as_of, status }
  }
}
