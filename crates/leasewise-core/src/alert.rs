//! Alerts raised when a renewal escalates.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{classify::EscalationStatus, record::RenewalRecord};

/// Days a PM gets to act on a stale-stage warning.
const WARNING_GRACE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
  Warning,
  Urgent,
  Critical,
}

impl AlertSeverity {
  pub fn for_escalation(escalation: EscalationStatus) -> Option<Self> {
    match escalation {
      EscalationStatus::None => None,
      EscalationStatus::Yellow => Some(Self::Warning),
      EscalationStatus::Red => Some(Self::Urgent),
      EscalationStatus::Critical => Some(Self::Critical),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
  pub severity:  AlertSeverity,
  pub message:   String,
  pub due_date:  NaiveDate,
  pub raised_at: DateTime<Utc>,
  pub read:      bool,
}

impl Alert {
  pub(crate) fn raise(
    record: &RenewalRecord,
    severity: AlertSeverity,
    now: DateTime<Utc>,
  ) -> Self {
    let property = &record.property.name;
    let days = record.days_to_expiry(now);
    let (message, due_date) = match severity {
      AlertSeverity::Warning => (
        format!(
          "{property} has been at {} for {} days",
          record.stage.label(),
          record.days_in_stage(now)
        ),
        now.date_naive() + Duration::days(WARNING_GRACE_DAYS),
      ),
      AlertSeverity::Urgent => (
        format!("{property}: lease ends in {days} days and no agreement is uploaded"),
        record.lease.end_date,
      ),
      AlertSeverity::Critical => (
        format!(
          "{property}: lease ends in {days} days without an agreement; forced move-out risk"
        ),
        record.lease.end_date,
      ),
    };

    Self { severity, message, due_date, raised_at: now, read: false }
  }
}
