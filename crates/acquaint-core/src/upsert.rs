//! Contact resolution for freshly normalised names.
//!
//! The merge key is the display name alone: an exact, case-sensitive match
//! within one user's contacts. Two people who share an extracted name end up
//! on the same timeline, and two uploads racing on a brand-new name can both
//! create a contact. There is no lock around the lookup-then-insert.

use uuid::Uuid;

use crate::{contact::NewContact, store::ContactStore};

/// Return the id of `user_id`'s contact named `name`, creating it (with the
/// derived avatar and no summary) if none exists yet.
pub async fn resolve_contact<S: ContactStore>(
  store: &S,
  user_id: Uuid,
  name: &str,
) -> Result<Uuid, S::Error> {
  if let Some(existing) = store.find_contact_by_name(user_id, name).await? {
    tracing::debug!(contact_id = %existing.contact_id, name, "matched existing contact");
    return Ok(existing.contact_id);
  }

  let created = store.add_contact(NewContact::named(user_id, name)).await?;
  tracing::info!(contact_id = %created.contact_id, name, "created contact");
  Ok(created.contact_id)
}
