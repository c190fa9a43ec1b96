//! Offline repair of contacts that were saved under a placeholder name.
//!
//! Earlier extraction code sometimes persisted `{` or `Unknown` as a display
//! name. This job revisits each such contact, re-reads the payload of its most
//! recent record with [`reextract`], and renames the contact in place when a
//! valid name turns up. Contacts are processed strictly one after another; a
//! crash mid-run leaves the rest untouched, and a re-run skips everything
//! already fixed because fixed names no longer match the placeholder filter.

use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
  contact::{Contact, PLACEHOLDER_NAMES},
  normalize::reextract,
  payload::RawAnalysisPayload,
  store::ContactStore,
};

/// How much of an unparseable payload to echo into the log.
const PAYLOAD_PREVIEW_CHARS: usize = 100;

/// Tally of one repair run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
  pub examined:          usize,
  pub repaired:          usize,
  /// Contacts with no record to re-read.
  pub skipped_no_record: usize,
  /// Contacts whose payload still yields no valid name, or whose lookup or
  /// update failed.
  pub unresolved:        usize,
}

enum Outcome {
  Repaired,
  NoRecord,
  Unresolved,
}

/// Rename every placeholder-named contact, across all users, whose latest
/// record yields a valid name. Only the initial contact query can fail the
/// run; per-contact store errors are logged and counted as unresolved.
pub async fn repair_bad_contacts<S: ContactStore>(store: &S) -> Result<RepairReport, S::Error> {
  repair_scoped(store, None).await
}

/// [`repair_bad_contacts`] limited to one user's contacts.
pub async fn repair_user_contacts<S: ContactStore>(
  store: &S,
  user_id: Uuid,
) -> Result<RepairReport, S::Error> {
  repair_scoped(store, Some(user_id)).await
}

async fn repair_scoped<S: ContactStore>(
  store: &S,
  user_id: Option<Uuid>,
) -> Result<RepairReport, S::Error> {
  let contacts = store.find_contacts_named(user_id, &PLACEHOLDER_NAMES).await?;
  info!(count = contacts.len(), ?user_id, "found contacts with placeholder names");

  let mut report = RepairReport::default();
  for contact in &contacts {
    report.examined += 1;
    match repair_one(store, contact).await {
      Ok(Outcome::Repaired) => report.repaired += 1,
      Ok(Outcome::NoRecord) => report.skipped_no_record += 1,
      Ok(Outcome::Unresolved) => report.unresolved += 1,
      Err(e) => {
        warn!(contact_id = %contact.contact_id, error = %e, "repair failed");
        report.unresolved += 1;
      }
    }
  }

  info!(?report, "repair complete");
  Ok(report)
}

async fn repair_one<S: ContactStore>(store: &S, contact: &Contact) -> Result<Outcome, S::Error> {
  let Some(record) = store.latest_record(contact.contact_id).await? else {
    info!(contact_id = %contact.contact_id, "no records, skipping");
    return Ok(Outcome::NoRecord);
  };

  let payload = RawAnalysisPayload::from_value(record.raw_payload);
  let Some(found) = reextract(&payload) else {
    let preview: String = payload.raw_text().chars().take(PAYLOAD_PREVIEW_CHARS).collect();
    warn!(contact_id = %contact.contact_id, %preview, "could not extract a valid name");
    return Ok(Outcome::Unresolved);
  };

  info!(
    contact_id = %contact.contact_id,
    from = %contact.name,
    to = %found.name,
    "renaming contact"
  );
  store.rename_contact(contact.contact_id, found.name, found.summary).await?;
  Ok(Outcome::Repaired)
}
