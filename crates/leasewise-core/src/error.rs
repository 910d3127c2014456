//! Error types for `leasewise-core`.

use thiserror::Error;

use crate::stage::{RenewalStage, TransitionCheck};

#[derive(Debug, Error)]
pub enum Error {
  #[error("{}", check.reason.as_deref().unwrap_or("transition not allowed"))]
  TransitionRejected {
    from:  RenewalStage,
    to:    RenewalStage,
    check: TransitionCheck,
  },

  #[error("the signed agreement must be uploaded with its metadata")]
  AgreementMissing,

  #[error("owner acknowledgement is recorded when the owner answers a verification code; request one instead")]
  OwnerAckRequired,

  #[error("owner acknowledgement cannot be handled at stage {0}")]
  AckNotExpected(RenewalStage),

  #[error("the owner has already accepted this renewal")]
  AlreadyAcknowledged,

  #[error("no owner acknowledgement is pending")]
  NoPendingAcknowledgement,

  #[error("the verification code has expired")]
  OtpExpired,

  #[error("the verification code does not match")]
  OtpMismatch,

  #[error("alert {0} does not exist")]
  AlertNotFound(usize),
}

impl Error {
  /// The validator's verdict, when this error is a rejected transition.
  pub fn transition_check(&self) -> Option<&TransitionCheck> {
    match self {
      Self::TransitionRejected { check, .. } => Some(check),
      _ => None,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
