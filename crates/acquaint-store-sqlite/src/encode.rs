//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that text ordering equals time ordering. Payloads are stored as compact
//! JSON. UUIDs are stored as hyphenated lowercase strings.

use acquaint_core::contact::{Account, Contact, Record};
use chrono::{DateTime, SecondsFormat, Utc};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

/// Round-trip a timestamp through its column encoding, so values handed back
/// to callers equal what a later read returns.
pub fn truncate_dt(dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
  decode_dt(&encode_dt(dt))
}

// ─── Search ──────────────────────────────────────────────────────────────────

/// A `LIKE` pattern matching `text` anywhere, with `\` as the escape
/// character for literal `%` and `_`.
pub fn like_pattern(text: &str) -> String {
  let mut out = String::with_capacity(text.len() + 2);
  out.push('%');
  for c in text.chars() {
    if matches!(c, '%' | '_' | '\\') {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('%');
  out
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const CONTACT_COLUMNS: &str =
  "contact_id, user_id, name, summary, avatar_url, created_at, last_updated";

/// Raw strings read directly from a `contacts` row.
pub struct RawContact {
  pub contact_id:   String,
  pub user_id:      String,
  pub name:         String,
  pub summary:      Option<String>,
  pub avatar_url:   String,
  pub created_at:   String,
  pub last_updated: String,
}

impl RawContact {
  /// Read a row selected with [`CONTACT_COLUMNS`] (optionally prefixed).
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      contact_id:   row.get(0)?,
      user_id:      row.get(1)?,
      name:         row.get(2)?,
      summary:      row.get(3)?,
      avatar_url:   row.get(4)?,
      created_at:   row.get(5)?,
      last_updated: row.get(6)?,
    })
  }

  pub fn into_contact(self) -> Result<Contact> {
    Ok(Contact {
      contact_id:   decode_uuid(&self.contact_id)?,
      user_id:      decode_uuid(&self.user_id)?,
      name:         self.name,
      summary:      self.summary,
      avatar_url:   self.avatar_url,
      created_at:   decode_dt(&self.created_at)?,
      last_updated: decode_dt(&self.last_updated)?,
    })
  }
}

pub const RECORD_COLUMNS: &str =
  "record_id, user_id, contact_id, image_url, raw_payload, key_takeaways, created_at";

/// Raw strings read directly from a `records` row.
pub struct RawRecord {
  pub record_id:     String,
  pub user_id:       String,
  pub contact_id:    String,
  pub image_url:     String,
  pub raw_payload:   String,
  pub key_takeaways: String,
  pub created_at:    String,
}

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      record_id:     row.get(0)?,
      user_id:       row.get(1)?,
      contact_id:    row.get(2)?,
      image_url:     row.get(3)?,
      raw_payload:   row.get(4)?,
      key_takeaways: row.get(5)?,
      created_at:    row.get(6)?,
    })
  }

  pub fn into_record(self) -> Result<Record> {
    Ok(Record {
      record_id:     decode_uuid(&self.record_id)?,
      user_id:       decode_uuid(&self.user_id)?,
      contact_id:    decode_uuid(&self.contact_id)?,
      image_url:     self.image_url,
      raw_payload:   serde_json::from_str(&self.raw_payload)?,
      key_takeaways: self.key_takeaways,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `accounts` row.
pub struct RawAccount {
  pub account_id:    String,
  pub username:      String,
  pub password_hash: String,
  pub created_at:    String,
}

impl RawAccount {
  pub fn into_account(self) -> Result<Account> {
    Ok(Account {
      account_id:    decode_uuid(&self.account_id)?,
      username:      self.username,
      password_hash: self.password_hash,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width_and_sortable() {
    let a = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let b = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();
    let (ea, eb) = (encode_dt(a), encode_dt(b));
    assert_eq!(ea.len(), eb.len());
    assert!(ea < eb);
    assert_eq!(decode_dt(&ea).unwrap(), a);
  }

  #[test]
  fn like_pattern_escapes_wildcards() {
    assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    assert_eq!(like_pattern("vip"), "%vip%");
  }
}
