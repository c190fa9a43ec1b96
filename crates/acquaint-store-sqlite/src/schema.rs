//! SQL schema for the Acquaint SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS accounts (
    account_id    TEXT PRIMARY KEY,
    username      TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,      -- argon2 PHC string
    created_at    TEXT NOT NULL
);

-- user_id is an opaque scope; every user-facing query filters on it.
CREATE TABLE IF NOT EXISTS contacts (
    contact_id   TEXT PRIMARY KEY,
    user_id      TEXT NOT NULL,
    name         TEXT NOT NULL,
    summary      TEXT,
    avatar_url   TEXT NOT NULL,
    created_at   TEXT NOT NULL,
    last_updated TEXT NOT NULL
);

-- No ON DELETE CASCADE: records must be removed before their contact.
CREATE TABLE IF NOT EXISTS records (
    record_id     TEXT PRIMARY KEY,
    user_id       TEXT NOT NULL,
    contact_id    TEXT NOT NULL REFERENCES contacts(contact_id),
    image_url     TEXT NOT NULL,
    raw_payload   TEXT NOT NULL,     -- JSON, exactly as analysed
    key_takeaways TEXT NOT NULL,
    keywords      TEXT,              -- payload `keywords`, parsed out for search
    created_at    TEXT NOT NULL      -- RFC 3339 UTC, fixed width; sorts as text
);

CREATE INDEX IF NOT EXISTS contacts_user_name_idx    ON contacts(user_id, name);
CREATE INDEX IF NOT EXISTS contacts_user_updated_idx ON contacts(user_id, last_updated);
CREATE INDEX IF NOT EXISTS records_contact_idx       ON records(contact_id, created_at);

PRAGMA user_version = 1;
";
