//! The `ContactStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `acquaint-store-sqlite`).
//! Higher layers (`acquaint-api`, the repair job, the ingest pipeline) depend
//! on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::contact::{Account, Contact, NewContact, NewRecord, Record};

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`ContactStore::search_contacts`].
#[derive(Debug, Clone, Default)]
pub struct ContactQuery {
  /// Case-insensitive substring matched against the contact name, the
  /// contact summary and the latest record's `keywords`.
  pub text:   Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an Acquaint contact store backend.
///
/// Every read and delete that a user can trigger is scoped by `user_id`. A
/// single call is atomic; the store performs no multi-row transactions on a
/// caller's behalf, so records referencing a contact must be deleted before
/// the contact itself.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ContactStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `true` when `error` means an account with that username already exists.
  /// Lets callers tell a lost registration race apart from a failing store.
  fn is_username_taken(error: &Self::Error) -> bool {
    let _ = error;
    false
  }

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Register an account. Fails if the username is already taken.
  fn add_account(
    &self,
    username: String,
    password_hash: String,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  /// Look up an account by its normalised username.
  fn get_account<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  // ── Contacts ──────────────────────────────────────────────────────────

  /// Create and persist a new contact with no summary.
  fn add_contact(
    &self,
    input: NewContact,
  ) -> impl Future<Output = Result<Contact, Self::Error>> + Send + '_;

  /// Exact, case-sensitive name lookup within one user's contacts. When
  /// duplicates exist, the oldest contact wins.
  fn find_contact_by_name<'a>(
    &'a self,
    user_id: Uuid,
    name: &'a str,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + 'a;

  /// Retrieve one of `user_id`'s contacts. Returns `None` if not found.
  fn get_contact(
    &self,
    user_id: Uuid,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<Option<Contact>, Self::Error>> + Send + '_;

  /// All of `user_id`'s contacts, most recently updated first.
  fn list_contacts(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + '_;

  /// Filtered [`ContactStore::list_contacts`].
  fn search_contacts<'a>(
    &'a self,
    user_id: Uuid,
    query: &'a ContactQuery,
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + 'a;

  /// Contacts whose name is exactly one of `names`, limited to `user_id`'s
  /// contacts when one is given and across every user otherwise. The
  /// unscoped form is for offline maintenance only.
  fn find_contacts_named<'a>(
    &'a self,
    user_id: Option<Uuid>,
    names: &'a [&'a str],
  ) -> impl Future<Output = Result<Vec<Contact>, Self::Error>> + Send + 'a;

  /// Overwrite the summary and bump `last_updated` after a record was
  /// attached.
  fn touch_contact(
    &self,
    contact_id: Uuid,
    summary: String,
    at: DateTime<Utc>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Rename a contact in place, replacing the summary when one is given.
  fn rename_contact(
    &self,
    contact_id: Uuid,
    name: String,
    summary: Option<String>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Delete a single contact row. Fails with a constraint error while any
  /// record still references it. Returns `false` if nothing was deleted.
  fn delete_contact(
    &self,
    user_id: Uuid,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Records ───────────────────────────────────────────────────────────

  /// Persist a new record. `record_id` and `created_at` are set by the store.
  fn add_record(
    &self,
    input: NewRecord,
  ) -> impl Future<Output = Result<Record, Self::Error>> + Send + '_;

  /// A contact's timeline, newest first.
  fn list_records(
    &self,
    user_id: Uuid,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Record>, Self::Error>> + Send + '_;

  /// The newest record attached to `contact_id`, regardless of owner.
  fn latest_record(
    &self,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<Option<Record>, Self::Error>> + Send + '_;

  /// Delete one record. Returns `false` if nothing was deleted.
  fn delete_record(
    &self,
    user_id: Uuid,
    record_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Delete every record attached to a contact; returns how many went.
  fn delete_records_for_contact(
    &self,
    user_id: Uuid,
    contact_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;
}

/// Delete a contact together with its timeline: records first, then the
/// contact. If the first step fails nothing is deleted; if the second fails
/// the records are already gone and the error is returned.
pub async fn delete_contact_cascade<S: ContactStore>(
  store: &S,
  user_id: Uuid,
  contact_id: Uuid,
) -> Result<bool, S::Error> {
  let removed = store.delete_records_for_contact(user_id, contact_id).await?;
  let deleted = store.delete_contact(user_id, contact_id).await?;
  tracing::info!(%contact_id, records = removed, deleted, "contact delete");
  Ok(deleted)
}
