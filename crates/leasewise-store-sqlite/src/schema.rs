//! SQL schema for the Leasewise SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- One row per renewal. Filterable fields are broken out into columns; the
-- rest of the record (minus its action log) lives in body_json.
CREATE TABLE IF NOT EXISTS renewals (
    record_id      TEXT PRIMARY KEY,
    property_id    TEXT NOT NULL,
    manager        TEXT NOT NULL,
    city           TEXT NOT NULL,
    zone           TEXT NOT NULL,
    stage          TEXT NOT NULL,
    lease_end      TEXT NOT NULL,   -- YYYY-MM-DD
    revision       INTEGER NOT NULL,
    body_json      TEXT NOT NULL,
    challenge_json TEXT,            -- outstanding OTP challenge or NULL
    updated_at     TEXT NOT NULL    -- ISO 8601 UTC
);

-- The audit trail is strictly append-only.
CREATE TABLE IF NOT EXISTS renewal_actions (
    record_id  TEXT NOT NULL REFERENCES renewals(record_id),
    seq        INTEGER NOT NULL,
    action     TEXT NOT NULL,
    actor      TEXT NOT NULL,
    source     TEXT NOT NULL,   -- 'pm' | 'owner' | 'system'
    at         TEXT NOT NULL,
    from_stage TEXT NOT NULL,
    to_stage   TEXT NOT NULL,
    PRIMARY KEY (record_id, seq)
);

CREATE TRIGGER IF NOT EXISTS renewal_actions_no_update
BEFORE UPDATE ON renewal_actions
BEGIN
    SELECT RAISE(ABORT, 'renewal_actions is append-only');
END;

CREATE TRIGGER IF NOT EXISTS renewal_actions_no_delete
BEFORE DELETE ON renewal_actions
BEGIN
    SELECT RAISE(ABORT, 'renewal_actions is append-only');
END;

CREATE TABLE IF NOT EXISTS notifications (
    notification_id TEXT PRIMARY KEY,
    kind            TEXT NOT NULL,
    title           TEXT NOT NULL,
    message         TEXT NOT NULL,
    record_id       TEXT,
    created_at      TEXT NOT NULL,
    read            INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS renewals_manager_idx   ON renewals(manager);
CREATE INDEX IF NOT EXISTS renewals_stage_idx     ON renewals(stage);
CREATE INDEX IF NOT EXISTS renewals_lease_end_idx ON renewals(lease_end);
CREATE INDEX IF NOT EXISTS notifications_created_idx ON notifications(created_at);

PRAGMA user_version = 1;
";
