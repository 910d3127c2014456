//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{HeaderMap, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use leasewise_core::{
  record::{LeaseTerms, NewRenewal, PropertyRef, RenewalRecord},
  store::RenewalStore as _,
};
use leasewise_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{PmIdentity, api_router, sweep_alerts};

async fn app() -> (Router, Arc<SqliteStore>) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  (api_router(store.clone()), store)
}

struct Reply {
  status:  StatusCode,
  headers: HeaderMap,
  body:    Value,
}

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  body: Option<Value>,
  extra: Vec<(header::HeaderName, String)>,
) -> Reply {
  let mut builder = Request::builder().method(method).uri(uri);
  for (k, v) in extra {
    builder = builder.header(k, v);
  }
  let body = match body {
    Some(json) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };
  let mut req = builder.body(body).unwrap();
  req.extensions_mut().insert(PmIdentity("aditi".into()));

  let resp = app.clone().oneshot(req).await.unwrap();
  let status = resp.status();
  let headers = resp.headers().clone();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  Reply { status, headers, body }
}

fn renewal_body(manager: &str, days_left: i64) -> Value {
  let end = Utc::now().date_naive() + Duration::days(days_left);
  json!({
    "property": {
      "property_id": Uuid::new_v4(),
      "name": "Lakeview 7C",
      "city": "Pune",
      "zone": "West",
      "manager": manager,
      "owner_name": "N. Kulkarni",
    },
    "lease": {
      "start_date": end - Duration::days(365),
      "end_date": end,
      "notice_period": 30,
      "current_rent": 27000,
      "proposed_rent": 28500,
    },
  })
}

async fn create(app: &Router, manager: &str, days_left: i64) -> String {
  let reply = send(app, "POST", "/renewals", Some(renewal_body(manager, days_left)), vec![]).await;
  assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
  reply.body["record"]["record_id"].as_str().unwrap().to_owned()
}

async fn move_to(app: &Router, id: &str, target: &str) -> Reply {
  send(
    app,
    "POST",
    &format!("/renewals/{id}/transition"),
    Some(json!({ "target": target })),
    vec![],
  )
  .await
}

/// Pull the most recent verification code out of the notification feed.
async fn delivered_code(app: &Router) -> String {
  let reply = send(app, "GET", "/notifications", None, vec![]).await;
  let message = reply
    .body
    .as_array()
    .unwrap()
    .iter()
    .find(|n| n["kind"] == "otp_sent")
    .and_then(|n| n["message"].as_str())
    .unwrap()
    .to_owned();
  message
    .split_whitespace()
    .find(|w| w.len() == 6 && w.chars().all(|c| c.is_ascii_digit()))
    .unwrap()
    .to_owned()
}

// ─── Renewals ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_get_renewal() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 100).await;

  let reply = send(&app, "GET", &format!("/renewals/{id}"), None, vec![]).await;
  assert_eq!(reply.status, StatusCode::OK);
  assert!(reply.headers.contains_key(header::ETAG));
  assert_eq!(reply.body["record"]["stage"], "renewal_not_started");
  assert_eq!(reply.body["status"]["days_to_expiry"], 100);
  assert_eq!(reply.body["status"]["risk"], "green");
  assert!(reply.body["record"].get("challenge").is_none());
}

#[tokio::test]
async fn missing_renewal_returns_404() {
  let (app, _) = app().await;
  let reply = send(&app, "GET", &format!("/renewals/{}", Uuid::new_v4()), None, vec![]).await;
  assert_eq!(reply.status, StatusCode::NOT_FOUND);
  assert!(reply.body["error"].is_string());
}

#[tokio::test]
async fn create_rejects_inverted_lease() {
  let (app, _) = app().await;
  let mut body = renewal_body("aditi", 100);
  body["lease"]["start_date"] = body["lease"]["end_date"].clone();
  let reply = send(&app, "POST", "/renewals", Some(body), vec![]).await;
  assert_eq!(reply.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn writes_without_identity_return_401() {
  let (app, _) = app().await;
  let req = Request::builder()
    .method("POST")
    .uri("/renewals")
    .header(header::CONTENT_TYPE, "application/json")
    .body(Body::from(renewal_body("aditi", 100).to_string()))
    .unwrap();
  let resp = app.oneshot(req).await.unwrap();
  assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
}

#[tokio::test]
async fn full_lifecycle() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 100).await;

  assert_eq!(move_to(&app, &id, "negotiation_in_progress").await.status, StatusCode::OK);
  assert_eq!(move_to(&app, &id, "proposal_sent").await.status, StatusCode::OK);

  let reply = send(
    &app,
    "POST",
    &format!("/renewals/{id}/acknowledgement/request"),
    None,
    vec![],
  )
  .await;
  assert_eq!(reply.status, StatusCode::ACCEPTED);
  let code = delivered_code(&app).await;

  let reply = send(
    &app,
    "POST",
    &format!("/renewals/{id}/acknowledgement/respond"),
    Some(json!({ "otp": code, "response": "accepted" })),
    vec![],
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
  assert_eq!(reply.body["record"]["stage"], "owner_acknowledged");
  assert_eq!(reply.body["record"]["acknowledgement"]["verified"], true);

  let reply = send(
    &app,
    "POST",
    &format!("/renewals/{id}/agreement"),
    Some(json!({
      "file_ref": "agreements/lakeview-7c.pdf",
      "effective_date": Utc::now().date_naive() + Duration::days(100),
      "duration_months": 11,
    })),
    vec![],
  )
  .await;
  assert_eq!(reply.status, StatusCode::OK, "{}", reply.body);
  assert_eq!(reply.body["record"]["stage"], "agreement_uploaded");

  for target in ["tcf_created", "pms_renewed", "renewal_completed"] {
    let reply = move_to(&app, &id, target).await;
    assert_eq!(reply.status, StatusCode::OK, "{target}: {}", reply.body);
  }

  let reply = send(&app, "GET", &format!("/renewals/{id}"), None, vec![]).await;
  let actions = reply.body["record"]["actions"].as_array().unwrap();
  assert_eq!(actions.len(), 8);
  assert_eq!(actions[0]["actor"], "aditi");
  assert_eq!(actions[2]["source"], "system");
  assert_eq!(actions[3]["source"], "owner");
  assert_eq!(reply.body["status"]["health"], "green");

  let score = send(&app, "GET", &format!("/renewals/{id}/score"), None, vec![]).await;
  assert_eq!(score.body["current_points"], 25);
  assert_eq!(score.body["at_risk_message"], "No penalty");
}

#[tokio::test]
async fn skipping_ahead_is_rejected_with_reason() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 100).await;

  let reply = move_to(&app, &id, "agreement_uploaded").await;
  assert_eq!(reply.status, StatusCode::CONFLICT);
  assert!(!reply.body["error"].as_str().unwrap().is_empty());
  assert_eq!(reply.body["required_prior_stage"], "owner_acknowledged");

  let reply = send(&app, "GET", &format!("/renewals/{id}"), None, vec![]).await;
  assert_eq!(reply.body["record"]["stage"], "renewal_not_started");
  assert!(reply.body["record"]["actions"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn owner_acknowledged_is_not_a_pm_transition() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 100).await;
  assert_eq!(move_to(&app, &id, "negotiation_in_progress").await.status, StatusCode::OK);
  assert_eq!(move_to(&app, &id, "proposal_sent").await.status, StatusCode::OK);

  let reply = send(&app, "GET", &format!("/renewals/{id}/transitions"), None, vec![]).await;
  let allowed: Vec<_> = reply
    .body
    .as_array()
    .unwrap()
    .iter()
    .filter(|o| o["check"]["allowed"] == true)
    .map(|o| o["target"].as_str().unwrap())
    .collect();
  assert_eq!(allowed, ["renewal_failed"]);

  let reply = move_to(&app, &id, "owner_acknowledged").await;
  assert_eq!(reply.status, StatusCode::CONFLICT);
  assert!(reply.body["error"].as_str().unwrap().contains("verification code"));

  let reply = send(&app, "GET", &format!("/renewals/{id}"), None, vec![]).await;
  assert_eq!(reply.body["record"]["stage"], "proposal_sent");
  assert_eq!(reply.body["record"]["actions"].as_array().unwrap().len(), 2);

  let reply = send(
    &app,
    "POST",
    &format!("/renewals/{id}/acknowledgement/request"),
    None,
    vec![],
  )
  .await;
  assert_eq!(reply.status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn terminal_renewal_rejects_further_moves() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 100).await;
  assert_eq!(move_to(&app, &id, "renewal_failed").await.status, StatusCode::OK);
  assert_eq!(
    move_to(&app, &id, "negotiation_in_progress").await.status,
    StatusCode::CONFLICT
  );
}

#[tokio::test]
async fn transitions_cover_every_stage() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 100).await;

  let reply = send(&app, "GET", &format!("/renewals/{id}/transitions"), None, vec![]).await;
  let options = reply.body.as_array().unwrap();
  assert_eq!(options.len(), 9);

  let allowed: Vec<_> = options
    .iter()
    .filter(|o| o["check"]["allowed"] == true)
    .map(|o| o["target"].as_str().unwrap())
    .collect();
  assert_eq!(allowed, ["negotiation_in_progress", "renewal_failed"]);
}

#[tokio::test]
async fn if_match_guards_writes() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 100).await;
  let reply = send(&app, "GET", &format!("/renewals/{id}"), None, vec![]).await;
  let etag = reply.headers[header::ETAG].to_str().unwrap().to_owned();

  let stale = send(
    &app,
    "POST",
    &format!("/renewals/{id}/transition"),
    Some(json!({ "target": "negotiation_in_progress" })),
    vec![(header::IF_MATCH, "\"stale\"".into())],
  )
  .await;
  assert_eq!(stale.status, StatusCode::PRECONDITION_FAILED);

  let fresh = send(
    &app,
    "POST",
    &format!("/renewals/{id}/transition"),
    Some(json!({ "target": "negotiation_in_progress" })),
    vec![(header::IF_MATCH, etag.clone())],
  )
  .await;
  assert_eq!(fresh.status, StatusCode::OK);
  assert_ne!(fresh.headers[header::ETAG].to_str().unwrap(), etag);
}

// ─── Acknowledgement ──────────────────────────────────────────────────────────

#[tokio::test]
async fn acknowledgement_errors() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 100).await;

  let early = send(
    &app,
    "POST",
    &format!("/renewals/{id}/acknowledgement/request"),
    None,
    vec![],
  )
  .await;
  assert_eq!(early.status, StatusCode::CONFLICT);

  move_to(&app, &id, "negotiation_in_progress").await;
  move_to(&app, &id, "proposal_sent").await;

  let unrequested = send(
    &app,
    "POST",
    &format!("/renewals/{id}/acknowledgement/respond"),
    Some(json!({ "otp": "000000", "response": "accepted" })),
    vec![],
  )
  .await;
  assert_eq!(unrequested.status, StatusCode::CONFLICT);

  send(
    &app,
    "POST",
    &format!("/renewals/{id}/acknowledgement/request"),
    None,
    vec![],
  )
  .await;
  let code = delivered_code(&app).await;
  let wrong = if code == "000000" { "111111" } else { "000000" };

  let mismatch = send(
    &app,
    "POST",
    &format!("/renewals/{id}/acknowledgement/respond"),
    Some(json!({ "otp": wrong, "response": "accepted" })),
    vec![],
  )
  .await;
  assert_eq!(mismatch.status, StatusCode::UNPROCESSABLE_ENTITY);

  let rejected = send(
    &app,
    "POST",
    &format!("/renewals/{id}/acknowledgement/respond"),
    Some(json!({ "otp": code, "response": "rejected" })),
    vec![],
  )
  .await;
  assert_eq!(rejected.status, StatusCode::OK);
  assert_eq!(rejected.body["record"]["stage"], "proposal_sent");
  assert_eq!(rejected.body["record"]["acknowledgement"]["status"], "rejected");
}

// ─── Listing & scorecards ─────────────────────────────────────────────────────

#[tokio::test]
async fn list_filters_by_manager_and_risk() {
  let (app, _) = app().await;
  create(&app, "aditi", 10).await;
  create(&app, "aditi", 100).await;
  create(&app, "rahul", 40).await;

  let all = send(&app, "GET", "/renewals", None, vec![]).await;
  assert_eq!(all.body.as_array().unwrap().len(), 3);

  let aditi = send(&app, "GET", "/renewals?manager=aditi", None, vec![]).await;
  assert_eq!(aditi.body.as_array().unwrap().len(), 2);

  let red = send(&app, "GET", "/renewals?risk=red", None, vec![]).await;
  let red = red.body.as_array().unwrap();
  assert_eq!(red.len(), 1);
  assert_eq!(red[0]["status"]["days_to_expiry"], 10);

  let amber = send(&app, "GET", "/renewals?risk=amber&manager=rahul", None, vec![]).await;
  assert_eq!(amber.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn scorecards_rank_managers() {
  let (app, _) = app().await;
  let done = create(&app, "rahul", 100).await;
  move_to(&app, &done, "renewal_failed").await;
  create(&app, "aditi", 100).await;

  let reply = send(&app, "GET", "/scorecards", None, vec![]).await;
  let board = reply.body.as_array().unwrap();
  assert_eq!(board.len(), 2);
  assert_eq!(board[0]["manager"], "aditi");
  assert_eq!(board[0]["rank"], 1);
  assert_eq!(board[1]["manager"], "rahul");
  assert_eq!(board[1]["failed"], 1);
}

// ─── Alerts & notifications ───────────────────────────────────────────────────

#[tokio::test]
async fn urgent_renewal_raises_alert_on_create() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 10).await;

  let reply = send(&app, "GET", &format!("/renewals/{id}"), None, vec![]).await;
  assert_eq!(reply.body["status"]["escalation"], "critical");
  assert_eq!(reply.body["record"]["alerts"][0]["severity"], "critical");
  assert_eq!(reply.body["status"]["unread_alerts"], 1);

  let notes = send(&app, "GET", "/notifications?unread_only=true", None, vec![]).await;
  assert!(notes.body.as_array().unwrap().iter().any(|n| n["kind"] == "alert"));

  let read = send(&app, "POST", &format!("/renewals/{id}/alerts/0/read"), None, vec![]).await;
  assert_eq!(read.status, StatusCode::OK);
  assert_eq!(read.body["status"]["unread_alerts"], 0);

  let missing = send(&app, "POST", &format!("/renewals/{id}/alerts/5/read"), None, vec![]).await;
  assert_eq!(missing.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn notification_endpoints() {
  let (app, _) = app().await;
  let id = create(&app, "aditi", 100).await;
  move_to(&app, &id, "negotiation_in_progress").await;
  move_to(&app, &id, "proposal_sent").await;

  let notes = send(&app, "GET", "/notifications", None, vec![]).await;
  let notes = notes.body.as_array().unwrap();
  assert_eq!(notes.len(), 2);
  assert_eq!(notes[0]["kind"], "stage_changed");
  let first = notes[0]["notification_id"].as_str().unwrap().to_owned();

  let reply = send(&app, "POST", &format!("/notifications/{first}/read"), None, vec![]).await;
  assert_eq!(reply.status, StatusCode::NO_CONTENT);

  let reply = send(&app, "POST", "/notifications/read-all", None, vec![]).await;
  assert_eq!(reply.body["count"], 1);

  let reply = send(
    &app,
    "POST",
    &format!("/notifications/{}/read", Uuid::new_v4()),
    None,
    vec![],
  )
  .await;
  assert_eq!(reply.status, StatusCode::NOT_FOUND);

  let reply = send(&app, "DELETE", "/notifications", None, vec![]).await;
  assert_eq!(reply.body["count"], 2);
}

#[tokio::test]
async fn sweep_raises_each_alert_once() {
  let (_, store) = app().await;
  let now = Utc::now();
  let end = now.date_naive() + Duration::days(20);
  let record = RenewalRecord::new(
    NewRenewal {
      property: PropertyRef {
        property_id: Uuid::new_v4(),
        name:        "Harbour View 2A".into(),
        city:        "Kochi".into(),
        zone:        "Central".into(),
        manager:     "aditi".into(),
        owner_name:  "J. Thomas".into(),
      },
      lease:    LeaseTerms {
        start_date:    end - Duration::days(365),
        end_date:      end,
        notice_period: 30,
        current_rent:  21_000,
        proposed_rent: None,
      },
    },
    now,
  );
  store.insert_record(&record).await.unwrap();

  assert_eq!(sweep_alerts(&*store, now).await.unwrap(), 1);
  assert_eq!(sweep_alerts(&*store, now).await.unwrap(), 0);

  let stored = store.get_record(record.record_id).await.unwrap().unwrap();
  assert_eq!(stored.alerts.len(), 1);
  assert_eq!(stored.revision, record.revision + 1);
}
