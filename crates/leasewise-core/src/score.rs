//! Renewal score impact: a 0–25 point contribution to a PM's scorecard with
//! named, independently-triggered deductions.

use serde::{Deserialize, Serialize};

use crate::stage::RenewalStage;

/// Points a renewal is worth before deductions.
pub const BASE_POINTS: i32 = 25;

/// Why points were deducted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeductionReason {
  LateInitiation,
  OwnerAckDelay,
  AgreementDelay,
  ForcedMoveOut,
}

impl DeductionReason {
  pub fn points(self) -> i32 {
    match self {
      Self::LateInitiation | Self::OwnerAckDelay | Self::AgreementDelay => -5,
      Self::ForcedMoveOut => -15,
    }
  }
}

/// A deduction that was triggered for the current snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deduction {
  pub reason:    DeductionReason,
  pub points:    i32,
  /// The condition that fired, in words.
  pub condition: String,
}

/// Deadlines (days before lease end) derived from the notice period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deadlines {
  pub initiation: i64,
  pub ack:        i64,
  pub lock:       i64,
}

impl Deadlines {
  pub fn for_notice_period(notice_period: u32) -> Self {
    let long_notice = notice_period >= 60;
    Self {
      initiation: i64::from(notice_period) + 30,
      ack:        if long_notice { 45 } else { 30 },
      lock:       if long_notice { 30 } else { 15 },
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreImpact {
  pub base_points:     i32,
  /// `max(0, base_points + sum of deductions)`.
  pub current_points:  i32,
  pub deductions:      Vec<Deduction>,
  pub at_risk_message: String,
}

impl ScoreImpact {
  pub fn has(&self, reason: DeductionReason) -> bool {
    self.deductions.iter().any(|d| d.reason == reason)
  }
}

/// Compute the score impact of a renewal snapshot.
pub fn compute_score_impact(
  days_to_expiry: i64,
  stage: RenewalStage,
  has_owner_ack: bool,
  notice_period: u32,
) -> ScoreImpact {
  use RenewalStage::*;

  let deadlines = Deadlines::for_notice_period(notice_period);
  let mut deductions = Vec::new();
  let mut push = |reason: DeductionReason, condition: String| {
    deductions.push(Deduction { reason, points: reason.points(), condition });
  };

  if days_to_expiry < deadlines.initiation && stage == RenewalNotStarted {
    push(
      DeductionReason::LateInitiation,
      format!(
        "Renewal not started with fewer than {} days to expiry",
        deadlines.initiation
      ),
    );
  }

  if days_to_expiry < deadlines.ack
    && !has_owner_ack
    && matches!(stage, RenewalNotStarted | NegotiationInProgress | ProposalSent)
  {
    push(
      DeductionReason::OwnerAckDelay,
      format!(
        "No owner acknowledgement with fewer than {} days to expiry",
        deadlines.ack
      ),
    );
  }

  if days_to_expiry < deadlines.lock && !stage.has_locked_agreement() {
    push(
      DeductionReason::AgreementDelay,
      format!(
        "Agreement not uploaded with fewer than {} days to expiry",
        deadlines.lock
      ),
    );
  }

  if stage == RenewalFailed {
    push(
      DeductionReason::ForcedMoveOut,
      "Renewal failed; tenant forced to move out".into(),
    );
  }

  let total: i32 = deductions.iter().map(|d| d.points).sum();
  let current_points = (BASE_POINTS + total).max(0);

  // Projected figures: what the PM stands to lose if nothing changes.
  let has = |r: DeductionReason| deductions.iter().any(|d| d.reason == r);
  let at_risk_message = if stage == RenewalCompleted {
    "No penalty".to_owned()
  } else if stage == RenewalFailed {
    "Renewal failed: -15 pts forced move-out penalty applied".to_owned()
  } else if has(DeductionReason::LateInitiation) {
    "Start the renewal now to avoid a further -5 pts late initiation penalty"
      .to_owned()
  } else if has(DeductionReason::OwnerAckDelay) {
    "Owner acknowledgement overdue: -10 pts at risk".to_owned()
  } else if has(DeductionReason::AgreementDelay) {
    "Agreement not locked in: -15 pts at risk".to_owned()
  } else {
    "On track".to_owned()
  };

  ScoreImpact {
    base_points: BASE_POINTS,
    current_points,
    deductions,
    at_risk_message,
  }
}
