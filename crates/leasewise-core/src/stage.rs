//! Renewal stages and the transition validator.
//!
//! Stages form a fixed chain ending in `renewal_completed`. Every
//! non-terminal stage may additionally fall through to `renewal_failed`.
//! Nothing moves backward and nothing leaves a terminal stage.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _, IntoStaticStr};

// ─── Stage ───────────────────────────────────────────────────────────────────

/// One discrete step of the renewal lifecycle, in required order.
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
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RenewalStage {
  RenewalNotStarted,
  NegotiationInProgress,
  ProposalSent,
  OwnerAcknowledged,
  AgreementUploaded,
  TcfCreated,
  PmsRenewed,
  RenewalCompleted,
  RenewalFailed,
}

impl RenewalStage {
  /// `renewal_completed` and `renewal_failed` have no outgoing edges.
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::RenewalCompleted | Self::RenewalFailed)
  }

  /// The next stage along the happy path, if any.
  pub fn next(self) -> Option<Self> {
    match self {
      Self::RenewalNotStarted => Some(Self::NegotiationInProgress),
      Self::NegotiationInProgress => Some(Self::ProposalSent),
      Self::ProposalSent => Some(Self::OwnerAcknowledged),
      Self::OwnerAcknowledged => Some(Self::AgreementUploaded),
      Self::AgreementUploaded => Some(Self::TcfCreated),
      Self::TcfCreated => Some(Self::PmsRenewed),
      Self::PmsRenewed => Some(Self::RenewalCompleted),
      Self::RenewalCompleted | Self::RenewalFailed => None,
    }
  }

  /// The stage that must immediately precede this one on the happy path.
  pub fn previous(self) -> Option<Self> {
    Self::iter().find(|s| s.next() == Some(self))
  }

  /// The adjacency set of this stage.
  pub fn successors(self) -> Vec<Self> {
    if self.is_terminal() {
      return Vec::new();
    }
    self
      .next()
      .into_iter()
      .chain(std::iter::once(Self::RenewalFailed))
      .collect()
  }

  pub fn can_reach(self, target: Self) -> bool { self.successors().contains(&target) }

  /// Human-readable label used in action-log entries and rejection reasons.
  pub fn label(self) -> &'static str {
    match self {
      Self::RenewalNotStarted => "Renewal not started",
      Self::NegotiationInProgress => "Negotiation in progress",
      Self::ProposalSent => "Proposal sent",
      Self::OwnerAcknowledged => "Owner acknowledged",
      Self::AgreementUploaded => "Agreement uploaded",
      Self::TcfCreated => "TCF created",
      Self::PmsRenewed => "PMS renewed",
      Self::RenewalCompleted => "Renewal completed",
      Self::RenewalFailed => "Renewal failed",
    }
  }

  /// Stages at which the signed agreement is already locked in.
  pub fn has_locked_agreement(self) -> bool {
    matches!(
      self,
      Self::AgreementUploaded
        | Self::TcfCreated
        | Self::PmsRenewed
        | Self::RenewalCompleted
    )
  }
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Outcome of [`validate_transition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionCheck {
  pub allowed:              bool,
  /// Why the transition was refused; `None` when allowed.
  pub reason:               Option<String>,
  /// The step that has to be completed first, when one can be named.
  pub required_prior_stage: Option<RenewalStage>,
}

impl TransitionCheck {
  fn allow() -> Self {
    Self { allowed: true, reason: None, required_prior_stage: None }
  }

  fn reject(reason: String, required_prior_stage: Option<RenewalStage>) -> Self {
    Self { allowed: false, reason: Some(reason), required_prior_stage }
  }
}

/// Check whether `current → target` is legal.
///
/// Beyond the stage graph, moving to `agreement_uploaded` requires an
/// accepted owner acknowledgement and moving to `tcf_created` requires an
/// uploaded agreement. Callers apply and log the transition themselves.
pub fn validate_transition(
  current: RenewalStage,
  target: RenewalStage,
  has_owner_ack: bool,
  has_agreement_uploaded: bool,
) -> TransitionCheck {
  if current.is_terminal() {
    return TransitionCheck::reject(
      format!("{} is final; no further stage changes are possible", current.label()),
      None,
    );
  }

  if current == target {
    return TransitionCheck::reject(
      format!("The renewal is already at {}", current.label()),
      None,
    );
  }

  if !current.can_reach(target) {
    let reason = if target < current {
      format!(
        "Cannot move back from {} to {}",
        current.label(),
        target.label()
      )
    } else {
      match target.previous() {
        Some(prior) => format!(
          "Cannot move to {} from {}; complete {} first",
          target.label(),
          current.label(),
          prior.label()
        ),
        None => format!("Cannot move to {} from {}", target.label(), current.label()),
      }
    };
    let required = if target > current { target.previous() } else { None };
    return TransitionCheck::reject(reason, required);
  }

  if target == RenewalStage::AgreementUploaded && !has_owner_ack {
    return TransitionCheck::reject(
      "The owner must accept the renewal proposal before the agreement can be uploaded".into(),
      Some(RenewalStage::OwnerAcknowledged),
    );
  }

  if target == RenewalStage::TcfCreated && !has_agreement_uploaded {
    return TransitionCheck::reject(
      "The signed agreement must be uploaded before the TCF can be created".into(),
      Some(RenewalStage::AgreementUploaded),
    );
  }

  TransitionCheck::allow()
}
