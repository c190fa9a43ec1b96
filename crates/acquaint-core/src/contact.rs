//! Contacts, records and accounts: the persisted shapes of the store.
//!
//! A contact is the thin aggregate a user sees in their list; each uploaded
//! photo becomes one immutable record attached to it. Every row is owned by
//! exactly one account, whose id is the opaque `user_id` scope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use uuid::Uuid;

// ─── Placeholder names ───────────────────────────────────────────────────────

/// Extraction artifacts that must never be persisted as a display name.
pub const PLACEHOLDER_NAMES: [&str; 2] = ["{", "Unknown"];

/// `true` for a stored name the repair job should revisit.
pub fn is_placeholder_name(name: &str) -> bool {
  PLACEHOLDER_NAMES.contains(&name)
}

// ─── Avatar ──────────────────────────────────────────────────────────────────

const AVATAR_BASE: &str = "https://ui-avatars.com/api/";

/// Deterministic branded avatar for a display name.
///
/// The same name always yields the same URL, so the avatar can be recomputed
/// on read instead of trusting the stored value.
pub fn avatar_url(name: &str) -> String {
  let query = form_urlencoded::Serializer::new(String::new())
    .append_pair("name", name)
    .append_pair("background", "eef2ff")
    .append_pair("color", "4f46e5")
    .append_pair("bold", "true")
    .append_pair("length", "1")
    .finish();
  format!("{AVATAR_BASE}?{query}")
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// A person aggregating every analysed upload filed under one display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
  pub contact_id:   Uuid,
  pub user_id:      Uuid,
  pub name:         String,
  /// Summary of the most recently attached record.
  pub summary:      Option<String>,
  pub avatar_url:   String,
  pub created_at:   DateTime<Utc>,
  pub last_updated: DateTime<Utc>,
}

/// Input to [`crate::store::ContactStore::add_contact`].
#[derive(Debug, Clone)]
pub struct NewContact {
  pub user_id:    Uuid,
  pub name:       String,
  pub avatar_url: String,
}

impl NewContact {
  /// A contact with the derived avatar and no summary.
  pub fn named(user_id: Uuid, name: impl Into<String>) -> Self {
    let name = name.into();
    Self { user_id, avatar_url: avatar_url(&name), name }
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// One uploaded image plus its analysis. Never updated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub record_id:     Uuid,
  pub user_id:       Uuid,
  pub contact_id:    Uuid,
  pub image_url:     String,
  /// The analysis payload exactly as it was received.
  pub raw_payload:   serde_json::Value,
  pub key_takeaways: String,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::ContactStore::add_record`].
/// `record_id` and `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewRecord {
  pub user_id:       Uuid,
  pub contact_id:    Uuid,
  pub image_url:     String,
  pub raw_payload:   serde_json::Value,
  pub key_takeaways: String,
}

// ─── Account ─────────────────────────────────────────────────────────────────

/// A registered user. `account_id` doubles as the `user_id` scope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  pub account_id:    Uuid,
  pub username:      String,
  /// PHC string produced by argon2. Never serialised to clients.
  #[serde(skip_serializing)]
  pub password_hash: String,
  pub created_at:    DateTime<Utc>,
}

/// Canonical form of a username: trimmed and lower-cased.
pub fn normalize_username(raw: &str) -> String {
  raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn avatar_url_is_deterministic_and_encoded() {
    let a = avatar_url("Zhang Wei");
    assert_eq!(a, avatar_url("Zhang Wei"));
    assert!(a.starts_with("https://ui-avatars.com/api/?name=Zhang+Wei&"));
    assert!(a.ends_with("background=eef2ff&color=4f46e5&bold=true&length=1"));
  }

  #[test]
  fn avatar_url_escapes_reserved_characters() {
    let a = avatar_url("A&B=C");
    assert!(a.contains("name=A%26B%3DC&"), "{a}");
  }

  #[test]
  fn placeholder_names() {
    assert!(is_placeholder_name("{"));
    assert!(is_placeholder_name("Unknown"));
    assert!(!is_placeholder_name("unknown"));
    assert!(!is_placeholder_name("Carol"));
  }

  #[test]
  fn usernames_are_trimmed_and_lowercased() {
    assert_eq!(normalize_username("  Alice@Example.COM "), "alice@example.com");
  }
}
