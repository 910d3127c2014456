//! Entity tags for renewal resources.
//!
//! An ETag is the SHA-256 of the record id and its revision, so it changes on
//! every mutation (including alert bookkeeping) and on nothing else.

use axum::http::{HeaderMap, header};
use leasewise_core::record::RenewalRecord;
use sha2::{Digest, Sha256};

use crate::error::ApiError;

/// Compute the quoted ETag for `record`.
pub fn compute_etag(record: &RenewalRecord) -> String {
  let mut hasher = Sha256::new();
  hasher.update(record.record_id.as_bytes());
  hasher.update(record.revision.to_le_bytes());
  format!("\"{}\"", hex::encode(hasher.finalize()))
}

/// Some clients send bare or weak tags; compare on the opaque part only.
pub fn strip_etag_quotes(tag: &str) -> &str {
  let tag = tag.trim();
  tag.strip_prefix("W/").unwrap_or(tag).trim_matches('"')
}

/// Enforce an `If-Match` header against the current state of `record`.
///
/// No header means no precondition. `*` matches any existing record.
pub fn check_if_match(headers: &HeaderMap, record: &RenewalRecord) -> Result<(), ApiError> {
  let Some(value) = headers.get(header::IF_MATCH) else {
    return Ok(());
  };
  let value = value
    .to_str()
    .map_err(|_| ApiError::BadRequest("If-Match is not valid ASCII".into()))?;

  let current = compute_etag(record);
  let matched = value.split(',').any(|candidate| {
    let candidate = candidate.trim();
    candidate == "*" || strip_etag_quotes(candidate) == strip_etag_quotes(&current)
  });

  if matched {
    Ok(())
  } else {
    tracing::debug!(record_id = %record.record_id, if_match = value, "If-Match failed");
    Err(ApiError::PreconditionFailed)
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;
  use chrono::{Duration, TimeZone as _, Utc};
  use leasewise_core::record::{LeaseTerms, NewRenewal, PropertyRef};
  use uuid::Uuid;

  use super::*;

  fn record() -> RenewalRecord {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap();
    let end = now.date_naive() + Duration::days(60);
    RenewalRecord::new(
      NewRenewal {
        property: PropertyRef {
          property_id: Uuid::new_v4(),
          name:        "Cedar Row 12".into(),
          city:        "Chennai".into(),
          zone:        "South".into(),
          manager:     "kavya".into(),
          owner_name:  "T. Raman".into(),
        },
        lease:    LeaseTerms {
          start_date:    end - Duration::days(365),
          end_date:      end,
          notice_period: 30,
          current_rent:  18_000,
          proposed_rent: None,
        },
      },
      now,
    )
  }

  fn if_match(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::IF_MATCH, HeaderValue::from_str(value).unwrap());
    headers
  }

  #[test]
  fn etag_changes_with_revision() {
    let mut r = record();
    let before = compute_etag(&r);
    r.revision += 1;
    assert_ne!(before, compute_etag(&r));
    assert!(before.starts_with('"') && before.ends_with('"'));
  }

  #[test]
  fn if_match_accepts_quoted_bare_weak_and_star() {
    let r = record();
    let tag = compute_etag(&r);
    let bare = strip_etag_quotes(&tag).to_string();

    assert!(check_if_match(&HeaderMap::new(), &r).is_ok());
    assert!(check_if_match(&if_match(&tag), &r).is_ok());
    assert!(check_if_match(&if_match(&bare), &r).is_ok());
    assert!(check_if_match(&if_match(&format!("W/{tag}")), &r).is_ok());
    assert!(check_if_match(&if_match("*"), &r).is_ok());
    assert!(check_if_match(&if_match(&format!("\"other\", {tag}")), &r).is_ok());
  }

  #[test]
  fn stale_if_match_fails() {
    let r = record();
    let err = check_if_match(&if_match("\"stale\""), &r).unwrap_err();
    assert!(matches!(err, ApiError::PreconditionFailed));
  }
}
