//! The renewal record and every operation that mutates it.
//!
//! Each successful stage change or owner-acknowledgement event appends
//! exactly one [`ActionEntry`]. Rejected operations leave the record
//! untouched. Risk, escalation and health are not stored here; see
//! [`crate::view`].

use chrono::{DateTime, NaiveDate, Utc};
use rand_core::RngCore;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  ack::{OtpChallenge, OwnerAcknowledgement, OwnerResponse, consent_id},
  alert::{Alert, AlertSeverity},
  classify::{self, EscalationStatus},
  stage::{RenewalStage, TransitionCheck, validate_transition},
};

// ─── Property & lease ────────────────────────────────────────────────────────

/// The property a renewal belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRef {
  pub property_id: Uuid,
  pub name:        String,
  pub city:        String,
  pub zone:        String,
  /// The PM accountable for this renewal.
  pub manager:     String,
  pub owner_name:  String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseTerms {
  pub start_date:    NaiveDate,
  pub end_date:      NaiveDate,
  /// Notice period in days.
  pub notice_period: u32,
  /// Monthly rent, whole currency units.
  pub current_rent:  u32,
  pub proposed_rent: Option<u32>,
}

// ─── Agreement ───────────────────────────────────────────────────────────────

/// Metadata supplied when the signed agreement is uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAgreement {
  pub file_ref:        String,
  pub effective_date:  NaiveDate,
  pub duration_months: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementUpload {
  pub file_ref:        String,
  pub effective_date:  NaiveDate,
  pub duration_months: u16,
  pub uploaded_at:     DateTime<Utc>,
  pub uploaded_by:     String,
}

// ─── Audit trail ─────────────────────────────────────────────────────────────

/// Who triggered an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
  Pm,
  Owner,
  System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
  pub name:   String,
  pub source: ActionSource,
}

impl Actor {
  pub fn pm(name: impl Into<String>) -> Self {
    Self { name: name.into(), source: ActionSource::Pm }
  }

  pub fn owner(name: impl Into<String>) -> Self {
    Self { name: name.into(), source: ActionSource::Owner }
  }

  pub fn system() -> Self {
    Self { name: "system".into(), source: ActionSource::System }
  }
}

/// One append-only audit-trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionEntry {
  /// Position in the log, starting at 0.
  pub seq:        u32,
  pub action:     String,
  pub actor:      String,
  pub source:     ActionSource,
  pub at:         DateTime<Utc>,
  pub from_stage: RenewalStage,
  pub to_stage:   RenewalStage,
}

/// A stage the record has been in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageChange {
  pub stage:      RenewalStage,
  pub entered_at: DateTime<Utc>,
  pub actor:      String,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Input for creating a renewal record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRenewal {
  pub property: PropertyRef,
  pub lease:    LeaseTerms,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenewalRecord {
  pub record_id:        Uuid,
  pub property:         PropertyRef,
  pub lease:            LeaseTerms,
  pub stage:            RenewalStage,
  pub stage_entered_at: DateTime<Utc>,
  pub stage_history:    Vec<StageChange>,
  pub acknowledgement:  Option<OwnerAcknowledgement>,
  pub agreement:        Option<AgreementUpload>,
  pub actions:          Vec<ActionEntry>,
  pub alerts:           Vec<Alert>,
  pub created_at:       DateTime<Utc>,
  /// Bumped on every mutation.
  pub revision:         u64,
  /// Outstanding verification code; persisted separately by stores and never
  /// sent over the wire.
  #[serde(skip_serializing, default)]
  pub challenge:        Option<OtpChallenge>,
}

impl RenewalRecord {
  pub fn new(input: NewRenewal, now: DateTime<Utc>) -> Self {
    Self::with_id(Uuid::new_v4(), input, now)
  }

  pub fn with_id(record_id: Uuid, input: NewRenewal, now: DateTime<Utc>) -> Self {
    Self {
      record_id,
      property: input.property,
      lease: input.lease,
      stage: RenewalStage::RenewalNotStarted,
      stage_entered_at: now,
      stage_history: vec![StageChange {
        stage:      RenewalStage::RenewalNotStarted,
        entered_at: now,
        actor:      "system".into(),
      }],
      acknowledgement: None,
      agreement: None,
      actions: Vec::new(),
      alerts: Vec::new(),
      created_at: now,
      revision: 0,
      challenge: None,
    }
  }

  // ── Derived inputs ────────────────────────────────────────────────────────

  pub fn has_owner_ack(&self) -> bool {
    self
      .acknowledgement
      .as_ref()
      .is_some_and(OwnerAcknowledgement::is_accepted)
  }

  pub fn has_agreement(&self) -> bool { self.agreement.is_some() }

  pub fn days_to_expiry(&self, now: DateTime<Utc>) -> i64 {
    classify::days_until(self.lease.end_date, now)
  }

  pub fn days_in_stage(&self, now: DateTime<Utc>) -> i64 {
    classify::days_since(self.stage_entered_at, now)
  }

  pub fn escalation(&self, now: DateTime<Utc>) -> EscalationStatus {
    classify::classify_escalation(
      self.days_to_expiry(now),
      self.stage,
      self.has_agreement(),
      self.days_in_stage(now),
    )
  }

  /// Validate `self.stage → target` as a plain PM transition.
  ///
  /// `owner_acknowledged` is never offered here even when the stage graph
  /// permits it: only an owner acceptance can enter that stage.
  pub fn check_transition(&self, target: RenewalStage) -> TransitionCheck {
    let check = self.check_stage_rules(target);
    if check.allowed && target == RenewalStage::OwnerAcknowledged {
      return TransitionCheck {
        allowed:              false,
        reason:               Some(Error::OwnerAckRequired.to_string()),
        required_prior_stage: None,
      };
    }
    check
  }

  fn check_stage_rules(&self, target: RenewalStage) -> TransitionCheck {
    validate_transition(
      self.stage,
      target,
      self.has_owner_ack(),
      self.has_agreement(),
    )
  }

  // ── Stage changes ─────────────────────────────────────────────────────────

  /// Move the record to `target`.
  ///
  /// `owner_acknowledged` is only reachable through
  /// [`Self::respond_acknowledgement`], and `agreement_uploaded` only through
  /// [`Self::upload_agreement`], which carries the document metadata.
  pub fn transition(
    &mut self,
    target: RenewalStage,
    actor: &Actor,
    note: Option<&str>,
    now: DateTime<Utc>,
  ) -> Result<ActionEntry> {
    self.ensure_allowed(target)?;
    match target {
      RenewalStage::OwnerAcknowledged => return Err(Error::OwnerAckRequired),
      RenewalStage::AgreementUploaded if self.agreement.is_none() => {
        return Err(Error::AgreementMissing);
      }
      _ => {}
    }

    let action = match note {
      Some(n) if !n.trim().is_empty() => {
        format!("Moved to {}: {}", target.label(), n.trim())
      }
      _ => format!("Moved to {}", target.label()),
    };
    Ok(self.enter_stage(target, action, actor, now))
  }

  /// Record the signed agreement and advance to `agreement_uploaded`.
  pub fn upload_agreement(
    &mut self,
    upload: NewAgreement,
    actor: &Actor,
    now: DateTime<Utc>,
  ) -> Result<ActionEntry> {
    self.ensure_allowed(RenewalStage::AgreementUploaded)?;
    if upload.file_ref.trim().is_empty() {
      return Err(Error::AgreementMissing);
    }

    let action = format!(
      "Uploaded agreement {} ({} months from {})",
      upload.file_ref, upload.duration_months, upload.effective_date
    );
    self.agreement = Some(AgreementUpload {
      file_ref:        upload.file_ref,
      effective_date:  upload.effective_date,
      duration_months: upload.duration_months,
      uploaded_at:     now,
      uploaded_by:     actor.name.clone(),
    });
    Ok(self.enter_stage(RenewalStage::AgreementUploaded, action, actor, now))
  }

  fn ensure_allowed(&self, target: RenewalStage) -> Result<()> {
    let check = self.check_stage_rules(target);
    if check.allowed {
      Ok(())
    } else {
      Err(Error::TransitionRejected { from: self.stage, to: target, check })
    }
  }

  fn enter_stage(
    &mut self,
    target: RenewalStage,
    action: String,
    actor: &Actor,
    now: DateTime<Utc>,
  ) -> ActionEntry {
    let from = self.stage;
    self.stage = target;
    self.stage_entered_at = now;
    self.stage_history.push(StageChange {
      stage:      target,
      entered_at: now,
      actor:      actor.name.clone(),
    });
    self.log(action, actor, from, now)
  }

  fn log(
    &mut self,
    action: String,
    actor: &Actor,
    from_stage: RenewalStage,
    now: DateTime<Utc>,
  ) -> ActionEntry {
    let entry = ActionEntry {
      seq: self.actions.len() as u32,
      action,
      actor: actor.name.clone(),
      source: actor.source,
      at: now,
      from_stage,
      to_stage: self.stage,
    };
    self.actions.push(entry.clone());
    self.revision += 1;
    entry
  }

  // ── Owner acknowledgement ─────────────────────────────────────────────────

  /// Ask the owner to acknowledge the proposal. Returns the plain code to
  /// deliver; any earlier code stops working.
  pub fn request_acknowledgement(
    &mut self,
    now: DateTime<Utc>,
    rng: &mut impl RngCore,
  ) -> Result<(ActionEntry, String)> {
    if self.stage != RenewalStage::ProposalSent {
      return Err(Error::AckNotExpected(self.stage));
    }
    if self.has_owner_ack() {
      return Err(Error::AlreadyAcknowledged);
    }

    let (challenge, code) = OtpChallenge::issue(self.record_id, now, rng);
    self.challenge = Some(challenge);
    self.acknowledgement = Some(OwnerAcknowledgement::pending(now));

    let action = format!(
      "Verification code sent to owner {}",
      self.property.owner_name
    );
    let entry = self.log(action, &Actor::system(), self.stage, now);
    Ok((entry, code))
  }

  /// Apply the owner's verified answer. Acceptance also advances the record
  /// to `owner_acknowledged`, within the same log entry.
  pub fn respond_acknowledgement(
    &mut self,
    code: &str,
    response: OwnerResponse,
    now: DateTime<Utc>,
  ) -> Result<ActionEntry> {
    if self.stage != RenewalStage::ProposalSent {
      return Err(Error::AckNotExpected(self.stage));
    }
    let challenge = self
      .challenge
      .as_ref()
      .ok_or(Error::NoPendingAcknowledgement)?;
    if challenge.is_expired(now) {
      return Err(Error::OtpExpired);
    }
    if !challenge.matches(self.record_id, code) {
      return Err(Error::OtpMismatch);
    }
    if response == OwnerResponse::Accepted {
      self.ensure_allowed(RenewalStage::OwnerAcknowledged)?;
    }

    let consent = consent_id(self.record_id, challenge, now);
    let requested_at = self
      .acknowledgement
      .as_ref()
      .map_or(challenge.issued_at, |a| a.requested_at);
    self.challenge = None;
    self.acknowledgement = Some(OwnerAcknowledgement {
      status: response.into(),
      verified: true,
      consent_id: Some(consent),
      requested_at,
      responded_at: Some(now),
    });

    let actor = Actor::owner(self.property.owner_name.clone());
    let action = format!("Owner {}", response.label());
    let entry = if response == OwnerResponse::Accepted {
      self.enter_stage(RenewalStage::OwnerAcknowledged, action, &actor, now)
    } else {
      self.log(action, &actor, self.stage, now)
    };
    Ok(entry)
  }

  // ── Alerts ────────────────────────────────────────────────────────────────

  /// Raise an alert for the current escalation unless an unread one of the
  /// same severity is already outstanding. Returns the newly raised alerts.
  pub fn sync_alerts(&mut self, now: DateTime<Utc>) -> Vec<Alert> {
    let escalation = self.escalation(now);
    let Some(severity) = AlertSeverity::for_escalation(escalation) else {
      return Vec::new();
    };
    if self.alerts.iter().any(|a| !a.read && a.severity == severity) {
      return Vec::new();
    }

    let alert = Alert::raise(self, severity, now);
    self.alerts.push(alert.clone());
    self.revision += 1;
    vec![alert]
  }

  pub fn mark_alert_read(&mut self, index: usize) -> Result<()> {
    let alert = self
      .alerts
      .get_mut(index)
      .ok_or(Error::AlertNotFound(index))?;
    if !alert.read {
      alert.read = true;
      self.revision += 1;
    }
    Ok(())
  }
}

#[cfg(test)]
pub(crate) mod tests {
  use chrono::{Duration, TimeZone as _};
  use rand::{SeedableRng as _, rngs::StdRng};

  use super::*;
  use crate::ack::AckStatus;

  pub(crate) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
  }

  pub(crate) fn new_renewal(days_left: i64, notice_period: u32) -> NewRenewal {
    let end = now().date_naive() + Duration::days(days_left);
    NewRenewal {
      property: PropertyRef {
        property_id: Uuid::new_v4(),
        name:        "Maple Court 4B".into(),
        city:        "Bengaluru".into(),
        zone:        "East".into(),
        manager:     "priya".into(),
        owner_name:  "R. Iyer".into(),
      },
      lease:    LeaseTerms {
        start_date:    end - Duration::days(365),
        end_date:      end,
        notice_period,
        current_rent:  32_000,
        proposed_rent: Some(34_000),
      },
    }
  }

  fn agreement() -> NewAgreement {
    NewAgreement {
      file_ref:        "agreements/maple-4b.pdf".into(),
      effective_date:  NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
      duration_months: 11,
    }
  }

  fn pm() -> Actor { Actor::pm("priya") }

  /// Drive a record to `proposal_sent` and through owner acceptance.
  fn acknowledged(record: &mut RenewalRecord) {
    let mut rng = StdRng::seed_from_u64(42);
    record
      .transition(RenewalStage::NegotiationInProgress, &pm(), None, now())
      .unwrap();
    record
      .transition(RenewalStage::ProposalSent, &pm(), None, now())
      .unwrap();
    let (_, code) = record.request_acknowledgement(now(), &mut rng).unwrap();
    record
      .respond_acknowledgement(&code, OwnerResponse::Accepted, now())
      .unwrap();
  }

  #[test]
  fn full_lifecycle_in_order() {
    let mut record = RenewalRecord::new(new_renewal(100, 30), now());
    acknowledged(&mut record);
    assert_eq!(record.stage, RenewalStage::OwnerAcknowledged);
    assert!(record.has_owner_ack());

    record.upload_agreement(agreement(), &pm(), now()).unwrap();
    for target in [
      RenewalStage::TcfCreated,
      RenewalStage::PmsRenewed,
      RenewalStage::RenewalCompleted,
    ] {
      record.transition(target, &pm(), None, now()).unwrap();
    }

    assert_eq!(record.stage, RenewalStage::RenewalCompleted);
    assert_eq!(record.stage_history.len(), 8);
    let stages: Vec<_> = record.stage_history.iter().map(|s| s.stage).collect();
    assert!(stages.windows(2).all(|w| w[0].next() == Some(w[1])));
    assert!(
      record
        .transition(RenewalStage::RenewalFailed, &pm(), None, now())
        .is_err()
    );
  }

  #[test]
  fn jumping_ahead_is_rejected_with_reason() {
    let mut record = RenewalRecord::new(new_renewal(100, 30), now());
    let before = record.clone();

    let err = record
      .upload_agreement(agreement(), &pm(), now())
      .unwrap_err();
    let check = err.transition_check().expect("transition rejection");
    assert!(!check.allowed);
    assert!(check.reason.as_deref().unwrap().contains("Owner acknowledged"));
    assert_eq!(record, before);
  }

  #[test]
  fn log_grows_once_per_successful_transition() {
    let mut record = RenewalRecord::new(new_renewal(100, 30), now());
    assert!(record.actions.is_empty());

    record
      .transition(RenewalStage::NegotiationInProgress, &pm(), Some("called tenant"), now())
      .unwrap();
    assert_eq!(record.actions.len(), 1);
    assert_eq!(record.actions[0].action, "Moved to Negotiation in progress: called tenant");

    for bad in [
      RenewalStage::NegotiationInProgress,
      RenewalStage::RenewalNotStarted,
      RenewalStage::TcfCreated,
    ] {
      assert!(record.transition(bad, &pm(), None, now()).is_err());
      assert_eq!(record.actions.len(), 1);
    }

    record
      .transition(RenewalStage::ProposalSent, &pm(), None, now())
      .unwrap();
    assert_eq!(record.actions.len(), 2);
    let entry = &record.actions[1];
    assert_eq!(entry.seq, 1);
    assert_eq!(entry.from_stage, RenewalStage::NegotiationInProgress);
    assert_eq!(entry.to_stage, RenewalStage::ProposalSent);
    assert_eq!(entry.source, ActionSource::Pm);
  }

  #[test]
  fn agreement_stage_needs_metadata() {
    let mut record = RenewalRecord::new(new_renewal(100, 30), now());
    acknowledged(&mut record);
    let err = record
      .transition(RenewalStage::AgreementUploaded, &pm(), None, now())
      .unwrap_err();
    assert!(matches!(err, Error::AgreementMissing));
  }

  #[test]
  fn only_the_owner_can_acknowledge() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut record = RenewalRecord::new(new_renewal(100, 30), now());
    record
      .transition(RenewalStage::NegotiationInProgress, &pm(), None, now())
      .unwrap();
    record
      .transition(RenewalStage::ProposalSent, &pm(), None, now())
      .unwrap();

    let check = record.check_transition(RenewalStage::OwnerAcknowledged);
    assert!(!check.allowed);
    assert!(check.reason.is_some());

    let err = record
      .transition(RenewalStage::OwnerAcknowledged, &pm(), None, now())
      .unwrap_err();
    assert!(matches!(err, Error::OwnerAckRequired));
    assert_eq!(record.stage, RenewalStage::ProposalSent);
    assert_eq!(record.actions.len(), 2);
    assert_eq!(record.revision, 2);

    let (_, code) = record.request_acknowledgement(now(), &mut rng).unwrap();
    record
      .respond_acknowledgement(&code, OwnerResponse::Accepted, now())
      .unwrap();
    assert_eq!(record.stage, RenewalStage::OwnerAcknowledged);
    record
      .upload_agreement(agreement(), &pm(), now())
      .unwrap();
    assert_eq!(record.stage, RenewalStage::AgreementUploaded);
  }

  #[test]
  fn acknowledgement_flow_validates_code() {
    let mut rng = StdRng::seed_from_u64(9);
    let mut record = RenewalRecord::new(new_renewal(100, 30), now());

    assert!(matches!(
      record.request_acknowledgement(now(), &mut rng),
      Err(Error::AckNotExpected(RenewalStage::RenewalNotStarted))
    ));
    record
      .transition(RenewalStage::NegotiationInProgress, &pm(), None, now())
      .unwrap();
    record
      .transition(RenewalStage::ProposalSent, &pm(), None, now())
      .unwrap();

    assert!(matches!(
      record.respond_acknowledgement("000000", OwnerResponse::Accepted, now()),
      Err(Error::NoPendingAcknowledgement)
    ));

    let (_, code) = record.request_acknowledgement(now(), &mut rng).unwrap();
    let logged = record.actions.len();
    assert_eq!(
      record.acknowledgement.as_ref().unwrap().status,
      AckStatus::Pending
    );

    let wrong = if code == "111111" { "222222" } else { "111111" };
    assert!(matches!(
      record.respond_acknowledgement(wrong, OwnerResponse::Accepted, now()),
      Err(Error::OtpMismatch)
    ));
    let late = now() + Duration::minutes(30);
    assert!(matches!(
      record.respond_acknowledgement(&code, OwnerResponse::Accepted, late),
      Err(Error::OtpExpired)
    ));
    assert_eq!(record.actions.len(), logged);

    let entry = record
      .respond_acknowledgement(&code, OwnerResponse::ChangesRequested, now())
      .unwrap();
    assert_eq!(entry.source, ActionSource::Owner);
    assert_eq!(entry.from_stage, entry.to_stage);
    assert_eq!(record.stage, RenewalStage::ProposalSent);
    let ack = record.acknowledgement.as_ref().unwrap();
    assert_eq!(ack.status, AckStatus::ChangesRequested);
    assert!(ack.verified);
    assert!(ack.consent_id.is_some());
    assert!(record.challenge.is_none());
  }

  #[test]
  fn acceptance_advances_stage_in_one_entry() {
    let mut record = RenewalRecord::new(new_renewal(100, 30), now());
    acknowledged(&mut record);
    let last = record.actions.last().unwrap();
    assert_eq!(last.from_stage, RenewalStage::ProposalSent);
    assert_eq!(last.to_stage, RenewalStage::OwnerAcknowledged);
    assert_eq!(last.actor, "R. Iyer");
    // negotiation, proposal, code request, acceptance
    assert_eq!(record.actions.len(), 4);
  }

  #[test]
  fn alerts_raise_once_per_severity() {
    let mut record = RenewalRecord::new(new_renewal(10, 30), now());
    let raised = record.sync_alerts(now());
    assert_eq!(raised.len(), 1);
    assert_eq!(raised[0].severity, AlertSeverity::Critical);
    assert!(record.sync_alerts(now()).is_empty());

    record.mark_alert_read(0).unwrap();
    assert_eq!(record.sync_alerts(now()).len(), 1);
    assert_eq!(record.alerts.len(), 2);
    assert!(matches!(record.mark_alert_read(5), Err(Error::AlertNotFound(5))));
  }

  #[test]
  fn challenge_is_not_serialized() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut record = RenewalRecord::new(new_renewal(100, 30), now());
    record
      .transition(RenewalStage::NegotiationInProgress, &pm(), None, now())
      .unwrap();
    record
      .transition(RenewalStage::ProposalSent, &pm(), None, now())
      .unwrap();
    record.request_acknowledgement(now(), &mut rng).unwrap();

    let json = serde_json::to_value(&record).unwrap();
    assert!(json.get("challenge").is_none());
    let back: RenewalRecord = serde_json::from_value(json).unwrap();
    assert!(back.challenge.is_none());
  }
}
