//! [`SqliteStore`]: the SQLite implementation of [`RenewalStore`] and
//! [`NotificationStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use leasewise_core::{
  notify::{NewNotification, Notification, NotificationStore},
  record::RenewalRecord,
  store::{RecordQuery, RenewalStore},
};

use crate::{
  Error, Result,
  encode::{
    RawAction, RawNotification, RawRecord, encode_body, encode_challenge,
    encode_date, encode_dt, encode_kind, encode_source, encode_stage,
    encode_uuid,
  },
  schema::SCHEMA,
};

const SELECT_ACTIONS: &str = "
  SELECT seq, action, actor, source, at, from_stage, to_stage
  FROM renewal_actions
  WHERE record_id = ?1
  ORDER BY seq";

/// Everything written to the `renewals` row for one record.
struct RecordRow {
  record_id:      String,
  property_id:    String,
  manager:        String,
  city:           String,
  zone:           String,
  stage:          &'static str,
  lease_end:      String,
  revision:       i64,
  body_json:      String,
  challenge_json: Option<String>,
  updated_at:     String,
}

impl RecordRow {
  fn encode(record: &RenewalRecord) -> Result<Self> {
    Ok(Self {
      record_id:      encode_uuid(record.record_id),
      property_id:    encode_uuid(record.property.property_id),
      manager:        record.property.manager.clone(),
      city:           record.property.city.clone(),
      zone:           record.property.zone.clone(),
      stage:          encode_stage(record.stage),
      lease_end:      encode_date(record.lease.end_date),
      revision:       revision_to_sql(record.revision)?,
      body_json:      encode_body(record)?,
      challenge_json: encode_challenge(record.challenge.as_ref())?,
      updated_at:     encode_dt(Utc::now()),
    })
  }
}

/// Plain-string form of one action-log entry, ready to insert.
struct ActionRow {
  seq:        i64,
  action:     String,
  actor:      String,
  source:     &'static str,
  at:         String,
  from_stage: &'static str,
  to_stage:   &'static str,
}

fn encode_actions(record: &RenewalRecord) -> Vec<ActionRow> {
  record
    .actions
    .iter()
    .map(|a| ActionRow {
      seq:        i64::from(a.seq),
      action:     a.action.clone(),
      actor:      a.actor.clone(),
      source:     encode_source(a.source),
      at:         encode_dt(a.at),
      from_stage: encode_stage(a.from_stage),
      to_stage:   encode_stage(a.to_stage),
    })
    .collect()
}

fn revision_to_sql(revision: u64) -> Result<i64> {
  i64::try_from(revision).map_err(|_| Error::Decode(format!("revision overflow: {revision}")))
}

fn insert_actions(
  tx: &rusqlite::Transaction<'_>,
  record_id: &str,
  rows: &[ActionRow],
) -> rusqlite::Result<()> {
  let mut stmt = tx.prepare(
    "INSERT INTO renewal_actions
       (record_id, seq, action, actor, source, at, from_stage, to_stage)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
  )?;
  for a in rows {
    stmt.execute(rusqlite::params![
      record_id,
      a.seq,
      a.action,
      a.actor,
      a.source,
      a.at,
      a.from_stage,
      a.to_stage,
    ])?;
  }
  Ok(())
}

fn load_actions(
  conn: &rusqlite::Connection,
  record_id: &str,
) -> rusqlite::Result<Vec<RawAction>> {
  let mut stmt = conn.prepare_cached(SELECT_ACTIONS)?;
  stmt
    .query_map(rusqlite::params![record_id], RawAction::from_row)?
    .collect()
}

/// What a save found when it tried to apply.
enum SaveOutcome {
  Saved,
  Missing,
  Stale { actual: i64 },
  Truncated { stored: usize },
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Leasewise store backed by a single SQLite database.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store. Its contents are lost when the last clone is
  /// dropped.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── RenewalStore impl ───────────────────────────────────────────────────────

impl RenewalStore for SqliteStore {
  type Error = Error;

  async fn insert_record(&self, record: &RenewalRecord) -> Result<()> {
    let row = RecordRow::encode(record)?;
    let actions = encode_actions(record);
    let record_id = record.record_id;

    let inserted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let inserted = tx.execute(
          "INSERT OR IGNORE INTO renewals (
             record_id, property_id, manager, city, zone, stage, lease_end,
             revision, body_json, challenge_json, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
          rusqlite::params![
            row.record_id,
            row.property_id,
            row.manager,
            row.city,
            row.zone,
            row.stage,
            row.lease_end,
            row.revision,
            row.body_json,
            row.challenge_json,
            row.updated_at,
          ],
        )?;
        if inserted == 0 {
          return Ok(false);
        }
        insert_actions(&tx, &row.record_id, &actions)?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !inserted {
      return Err(Error::RecordExists(record_id));
    }
    tracing::debug!(%record_id, "inserted renewal");
    Ok(())
  }

  async fn get_record(&self, id: Uuid) -> Result<Option<RenewalRecord>> {
    let id_str = encode_uuid(id);

    let raw = self
      .conn
      .call(move |conn| {
        let record = conn
          .query_row(
            "SELECT body_json, challenge_json FROM renewals WHERE record_id = ?1",
            rusqlite::params![id_str],
            |row| {
              Ok(RawRecord {
                body_json:      row.get(0)?,
                challenge_json: row.get(1)?,
              })
            },
          )
          .optional()?;
        let Some(record) = record else { return Ok(None) };
        let actions = load_actions(conn, &id_str)?;
        Ok(Some((record, actions)))
      })
      .await?;

    raw
      .map(|(record, actions)| record.into_record(actions))
      .transpose()
  }

  async fn list_records(&self, query: &RecordQuery) -> Result<Vec<RenewalRecord>> {
    let manager = query.manager.clone();
    let stage = query.stage.map(encode_stage);
    let city = query.city.clone();
    let zone = query.zone.clone();
    let open_only = query.open_only;
    // SQLite treats a negative LIMIT as "no limit".
    let limit = query.limit.map_or(-1, |l| l as i64);
    let offset = query.offset.unwrap_or(0) as i64;

    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT record_id, body_json, challenge_json
           FROM renewals
           WHERE (?1 IS NULL OR manager = ?1)
             AND (?2 IS NULL OR stage = ?2)
             AND (?3 IS NULL OR city = ?3)
             AND (?4 IS NULL OR zone = ?4)
             AND (?5 = 0 OR stage NOT IN ('renewal_completed', 'renewal_failed'))
           ORDER BY lease_end, record_id
           LIMIT ?6 OFFSET ?7",
        )?;
        let rows = stmt
          .query_map(
            rusqlite::params![manager, stage, city, zone, open_only, limit, offset],
            |row| {
              Ok((
                row.get::<_, String>(0)?,
                RawRecord {
                  body_json:      row.get(1)?,
                  challenge_json: row.get(2)?,
                },
              ))
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (id, raw) in rows {
          let actions = load_actions(conn, &id)?;
          out.push((raw, actions));
        }
        Ok(out)
      })
      .await?;

    raws
      .into_iter()
      .map(|(raw, actions)| raw.into_record(actions))
      .collect()
  }

  async fn save_record(
    &self,
    record: &RenewalRecord,
    expected_revision: u64,
  ) -> Result<()> {
    let row = RecordRow::encode(record)?;
    let actions = encode_actions(record);
    let expected = revision_to_sql(expected_revision)?;
    let record_id = record.record_id;

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE renewals SET
             manager = ?2, city = ?3, zone = ?4, stage = ?5, lease_end = ?6,
             revision = ?7, body_json = ?8, challenge_json = ?9, updated_at = ?10
           WHERE record_id = ?1 AND revision = ?11",
          rusqlite::params![
            row.record_id,
            row.manager,
            row.city,
            row.zone,
            row.stage,
            row.lease_end,
            row.revision,
            row.body_json,
            row.challenge_json,
            row.updated_at,
            expected,
          ],
        )?;

        if updated == 0 {
          let actual: Option<i64> = tx
            .query_row(
              "SELECT revision FROM renewals WHERE record_id = ?1",
              rusqlite::params![row.record_id],
              |r| r.get(0),
            )
            .optional()?;
          return Ok(match actual {
            Some(actual) => SaveOutcome::Stale { actual },
            None => SaveOutcome::Missing,
          });
        }

        let stored: i64 = tx.query_row(
          "SELECT COUNT(*) FROM renewal_actions WHERE record_id = ?1",
          rusqlite::params![row.record_id],
          |r| r.get(0),
        )?;
        let stored = stored as usize;
        if actions.len() < stored {
          // Dropping the transaction rolls back the UPDATE above.
          return Ok(SaveOutcome::Truncated { stored });
        }

        insert_actions(&tx, &row.record_id, &actions[stored..])?;
        tx.commit()?;
        Ok(SaveOutcome::Saved)
      })
      .await?;

    match outcome {
      SaveOutcome::Saved => {
        tracing::debug!(%record_id, revision = record.revision, "saved renewal");
        Ok(())
      }
      SaveOutcome::Missing => Err(Error::RecordNotFound(record_id)),
      SaveOutcome::Stale { actual } => {
        tracing::warn!(%record_id, expected_revision, actual, "stale renewal save");
        Err(Error::StaleRevision {
          record_id,
          expected: expected_revision,
          actual: actual as u64,
        })
      }
      SaveOutcome::Truncated { stored } => Err(Error::ActionLogTruncated {
        record_id,
        stored,
        given: record.actions.len(),
      }),
    }
  }

  async fn count_records(&self) -> Result<usize> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM renewals", [], |r| r.get(0))?)
      })
      .await?;
    Ok(count as usize)
  }
}

// ─── NotificationStore impl ──────────────────────────────────────────────────

impl NotificationStore for SqliteStore {
  type Error = Error;

  async fn add(&self, input: NewNotification) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      kind:            input.kind,
      title:           input.title,
      message:         input.message,
      record_id:       input.record_id,
      created_at:      Utc::now(),
      read:            false,
    };

    let id_str = encode_uuid(notification.notification_id);
    let kind_str = encode_kind(notification.kind);
    let title = notification.title.clone();
    let message = notification.message.clone();
    let record_str = notification.record_id.map(encode_uuid);
    let at_str = encode_dt(notification.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO notifications
             (notification_id, kind, title, message, record_id, created_at, read)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0)",
          rusqlite::params![id_str, kind_str, title, message, record_str, at_str],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(id = %notification.notification_id, kind = kind_str, "notification added");
    Ok(notification)
  }

  async fn list(&self, unread_only: bool) -> Result<Vec<Notification>> {
    let raws = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT notification_id, kind, title, message, record_id, created_at, read
           FROM notifications
           WHERE (?1 = 0 OR read = 0)
           ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![unread_only], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawNotification::into_notification)
      .collect()
  }

  async fn mark_read(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);
    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE notifications SET read = 1 WHERE notification_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::NotificationNotFound(id));
    }
    Ok(())
  }

  async fn mark_all_read(&self) -> Result<usize> {
    let changed = self
      .conn
      .call(|conn| {
        Ok(conn.execute("UPDATE notifications SET read = 1 WHERE read = 0", [])?)
      })
      .await?;
    Ok(changed)
  }

  async fn clear(&self) -> Result<usize> {
    let removed = self
      .conn
      .call(|conn| Ok(conn.execute("DELETE FROM notifications", [])?))
      .await?;
    tracing::info!(removed, "notifications cleared");
    Ok(removed)
  }
}
