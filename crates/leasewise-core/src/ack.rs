//! Owner acknowledgement and its simulated OTP verification.
//!
//! Only the SHA-256 digest of an issued code is kept. The plain code is handed
//! back once, to be delivered to the owner out of band.

use chrono::{DateTime, Duration, Utc};
use rand::Rng as _;
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// How long an issued verification code stays valid.
pub const OTP_TTL_MINUTES: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
  Pending,
  Accepted,
  Rejected,
  ChangesRequested,
}

/// The owner's answer to a renewal proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerResponse {
  Accepted,
  Rejected,
  ChangesRequested,
}

impl From<OwnerResponse> for AckStatus {
  fn from(r: OwnerResponse) -> Self {
    match r {
      OwnerResponse::Accepted => Self::Accepted,
      OwnerResponse::Rejected => Self::Rejected,
      OwnerResponse::ChangesRequested => Self::ChangesRequested,
    }
  }
}

impl OwnerResponse {
  pub fn label(self) -> &'static str {
    match self {
      Self::Accepted => "accepted the renewal proposal",
      Self::Rejected => "rejected the renewal proposal",
      Self::ChangesRequested => "requested changes to the renewal proposal",
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerAcknowledgement {
  pub status:       AckStatus,
  /// Set once the owner has answered with a valid code.
  pub verified:     bool,
  pub consent_id:   Option<String>,
  pub requested_at: DateTime<Utc>,
  pub responded_at: Option<DateTime<Utc>>,
}

impl OwnerAcknowledgement {
  pub fn pending(requested_at: DateTime<Utc>) -> Self {
    Self {
      status: AckStatus::Pending,
      verified: false,
      consent_id: None,
      requested_at,
      responded_at: None,
    }
  }

  pub fn is_accepted(&self) -> bool { self.status == AckStatus::Accepted }
}

/// An outstanding verification code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtpChallenge {
  pub digest:     String,
  pub issued_at:  DateTime<Utc>,
  pub expires_at: DateTime<Utc>,
}

impl OtpChallenge {
  /// Issue a fresh six-digit code for `record_id`.
  ///
  /// Returns the challenge to store and the plain code to deliver.
  pub fn issue(
    record_id: Uuid,
    now: DateTime<Utc>,
    rng: &mut impl RngCore,
  ) -> (Self, String) {
    let code = format!("{:06}", rng.gen_range(0..1_000_000u32));
    let challenge = Self {
      digest:     otp_digest(record_id, &code),
      issued_at:  now,
      expires_at: now + Duration::minutes(OTP_TTL_MINUTES),
    };
    (challenge, code)
  }

  pub fn is_expired(&self, now: DateTime<Utc>) -> bool { now > self.expires_at }

  pub fn matches(&self, record_id: Uuid, code: &str) -> bool {
    self.digest == otp_digest(record_id, code.trim())
  }
}

/// Digest of a code, salted with the record it was issued for.
pub fn otp_digest(record_id: Uuid, code: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(record_id.as_bytes());
  hasher.update(code.as_bytes());
  hex::encode(hasher.finalize())
}

/// Stable consent identifier for a verified owner response.
pub fn consent_id(
  record_id: Uuid,
  challenge: &OtpChallenge,
  responded_at: DateTime<Utc>,
) -> String {
  let mut hasher = Sha256::new();
  hasher.update(record_id.as_bytes());
  hasher.update(challenge.digest.as_bytes());
  hasher.update(responded_at.timestamp_micros().to_le_bytes());
  let hex = hex::encode(hasher.finalize());
  format!("CNS-{}", hex[..12].to_ascii_uppercase())
}
