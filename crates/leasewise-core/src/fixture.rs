//! Synthetic renewal data for demos and seeding.
//!
//! Generators sit behind [`FixtureSource`] so the engine never depends on
//! randomness. [`SeededFixtures`] is reproducible for a given seed and walks
//! every record through the real state machine, so generated data obeys the
//! same invariants as live data.

use chrono::{DateTime, Duration, Utc};
use rand::{Rng as _, SeedableRng as _, rngs::StdRng, seq::SliceRandom as _};
use uuid::Uuid;

use crate::{
  Result,
  ack::OwnerResponse,
  record::{Actor, LeaseTerms, NewAgreement, NewRenewal, PropertyRef, RenewalRecord},
  stage::RenewalStage,
};

const BUILDINGS: &[&str] = &[
  "Maple", "Cedar", "Lakeview", "Palm", "Orchid", "Banyan", "Silver Oak",
  "Hillcrest", "Riverside", "Sunrise",
];
const SUFFIXES: &[&str] =
  &["Court", "Residency", "Heights", "Enclave", "Towers", "Gardens"];
const CITIES: &[(&str, &[&str])] = &[
  ("Bengaluru", &["North", "South", "East", "West"]),
  ("Hyderabad", &["Central", "West"]),
  ("Pune", &["East", "West"]),
  ("Gurugram", &["North", "South"]),
];
const MANAGERS: &[&str] =
  &["aditi", "rahul", "priya", "vikram", "sneha", "karan"];
const OWNERS: &[&str] = &[
  "R. Iyer", "S. Menon", "A. Kapoor", "N. Reddy", "M. Shah", "T. Das",
  "P. Nair", "L. Fernandes",
];
const NOTICE_PERIODS: &[u32] = &[30, 60, 90];

/// Produces renewal records for seeding a store.
pub trait FixtureSource {
  fn generate(&mut self, now: DateTime<Utc>) -> Result<Vec<RenewalRecord>>;
}

/// Deterministic generator backed by a seeded RNG.
pub struct SeededFixtures {
  rng:   StdRng,
  count: usize,
}

impl SeededFixtures {
  pub fn new(seed: u64, count: usize) -> Self {
    Self { rng: StdRng::seed_from_u64(seed), count }
  }

  fn pick<T: Copy>(&mut self, items: &[T]) -> T {
    // Every pool above is non-empty.
    *items.choose(&mut self.rng).unwrap_or(&items[0])
  }

  fn new_renewal(&mut self, now: DateTime<Utc>) -> NewRenewal {
    let (city, zones) = self.pick(CITIES);
    let building = self.pick(BUILDINGS);
    let suffix = self.pick(SUFFIXES);
    let floor: u8 = self.rng.gen_range(1..=12);
    let unit = self.pick(&['A', 'B', 'C', 'D']);
    let name = format!("{building} {suffix} {floor}{unit}");
    let days_left = self.rng.gen_range(5..=150);
    let end_date = now.date_naive() + Duration::days(days_left);
    let term_days = if self.rng.gen_bool(0.5) { 335 } else { 365 };
    let current_rent = self.rng.gen_range(30..=180) * 500;
    let hike = self.rng.gen_range(3..=8);

    NewRenewal {
      property: PropertyRef {
        property_id: Uuid::from_u128(self.rng.r#gen()),
        name,
        city: city.to_owned(),
        zone: self.pick(zones).to_owned(),
        manager: self.pick(MANAGERS).to_owned(),
        owner_name: self.pick(OWNERS).to_owned(),
      },
      lease:    LeaseTerms {
        start_date: end_date - Duration::days(term_days),
        end_date,
        notice_period: self.pick(NOTICE_PERIODS),
        current_rent,
        proposed_rent: Some(current_rent + current_rent * hike / 100),
      },
    }
  }

  /// Walk a fresh record forward along the happy path, occasionally failing
  /// it when the lease is close to expiry.
  fn build(&mut self, now: DateTime<Utc>) -> Result<RenewalRecord> {
    let input = self.new_renewal(now);
    let started = now - Duration::days(self.rng.gen_range(20..=60));
    let record_id = Uuid::from_u128(self.rng.r#gen());
    let mut record = RenewalRecord::with_id(record_id, input, started);

    let pm = Actor::pm(record.property.manager.clone());
    let steps = self.rng.gen_range(0..=7);
    let mut at = started;

    for _ in 0..steps {
      let Some(next) = record.stage.next() else { break };
      at = (at + Duration::days(self.rng.gen_range(1..=10))).min(now);

      match next {
        RenewalStage::OwnerAcknowledged => {
          let (_, code) = record.request_acknowledgement(at, &mut self.rng)?;
          let answered = (at + Duration::minutes(5)).min(now);
          record.respond_acknowledgement(&code, OwnerResponse::Accepted, answered)?;
        }
        RenewalStage::AgreementUploaded => {
          let upload = NewAgreement {
            file_ref:        format!("agreements/{}.pdf", record.property.property_id),
            effective_date:  record.lease.end_date + Duration::days(1),
            duration_months: 11,
          };
          record.upload_agreement(upload, &pm, at)?;
        }
        other => {
          record.transition(other, &pm, None, at)?;
        }
      }
    }

    let nearly_expired = record.days_to_expiry(now) < 30;
    if !record.stage.is_terminal() && nearly_expired && self.rng.gen_bool(0.25) {
      record.transition(
        RenewalStage::RenewalFailed,
        &pm,
        Some("tenant declined to renew"),
        now,
      )?;
    }

    record.sync_alerts(now);
    Ok(record)
  }
}

impl FixtureSource for SeededFixtures {
  fn generate(&mut self, now: DateTime<Utc>) -> Result<Vec<RenewalRecord>> {
    (0..self.count).map(|_| self.build(now)).collect()
  }
}
