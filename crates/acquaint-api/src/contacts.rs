//! Handlers for `/contacts` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/contacts` | Optional `?q=`, `?limit=`, `?offset=` |
//! | `GET`    | `/contacts/{id}` | 404 if not found |
//! | `DELETE` | `/contacts/{id}` | Removes the timeline first |
//! | `GET`    | `/contacts/{id}/records` | Newest first |

use acquaint_core::{
  contact::{Contact, Record},
  ingest::{Analyzer, ImageStore},
  normalize::tags_of,
  payload::RawAnalysisPayload,
  store::{ContactQuery, ContactStore, delete_contact_cascade},
};
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

/// A contact as shown in the list and detail views.
#[derive(Debug, Serialize)]
pub struct ContactListing {
  #[serde(flatten)]
  pub contact: Contact,
  /// Tags of the most recent record.
  pub tags:    Vec<String>,
}

async fn listing<S: ContactStore>(store: &S, contact: Contact) -> Result<ContactListing, ApiError> {
  let tags = store
    .latest_record(contact.contact_id)
    .await
    .map_err(ApiError::store)?
    .map(|r| tags_of(&RawAnalysisPayload::from_value(r.raw_payload)))
    .unwrap_or_default();
  Ok(ContactListing { contact, tags })
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  pub q:      Option<String>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// `GET /contacts[?q=<text>]`
pub async fn list<S, I, A>(
  State(state): State<AppState<S, I, A>>,
  AuthUser(account): AuthUser,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<ContactListing>>, ApiError>
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  let query = ContactQuery { text: params.q, limit: params.limit, offset: params.offset };
  let contacts = state
    .store
    .search_contacts(account.account_id, &query)
    .await
    .map_err(ApiError::store)?;

  let mut out = Vec::with_capacity(contacts.len());
  for contact in contacts {
    out.push(listing(state.store.as_ref(), contact).await?);
  }
  Ok(Json(out))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

async fn owned_contact<S: ContactStore>(
  store: &S,
  user_id: Uuid,
  id: Uuid,
) -> Result<Contact, ApiError> {
  store
    .get_contact(user_id, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))
}

/// `GET /contacts/{id}`
pub async fn get_one<S, I, A>(
  State(state): State<AppState<S, I, A>>,
  AuthUser(account): AuthUser,
  Path(id): Path<Uuid>,
) -> Result<Json<ContactListing>, ApiError>
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  let contact = owned_contact(state.store.as_ref(), account.account_id, id).await?;
  Ok(Json(listing(state.store.as_ref(), contact).await?))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /contacts/{id}`
pub async fn delete_one<S, I, A>(
  State(state): State<AppState<S, I, A>>,
  AuthUser(account): AuthUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  let deleted = delete_contact_cascade(state.store.as_ref(), account.account_id, id)
    .await
    .map_err(ApiError::store)?;
  if !deleted {
    return Err(ApiError::NotFound(format!("contact {id} not found")));
  }
  state.changes.bump();
  Ok(StatusCode::NO_CONTENT)
}

// ─── Timeline ─────────────────────────────────────────────────────────────────

/// `GET /contacts/{id}/records`
pub async fn records<S, I, A>(
  State(state): State<AppState<S, I, A>>,
  AuthUser(account): AuthUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Record>>, ApiError>
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  owned_contact(state.store.as_ref(), account.account_id, id).await?;
  let records = state
    .store
    .list_records(account.account_id, id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(records))
}
