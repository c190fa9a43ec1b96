//! `DELETE /records/{id}`: remove one timeline entry.

use acquaint_core::{
  ingest::{Analyzer, ImageStore},
  store::ContactStore,
};
use axum::{
  extract::{Path, State},
  http::StatusCode,
};
use uuid::Uuid;

use crate::{AppState, auth::AuthUser, error::ApiError};

/// `DELETE /records/{id}`
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
  let deleted = state
    .store
    .delete_record(account.account_id, id)
    .await
    .map_err(ApiError::store)?;
  if !deleted {
    return Err(ApiError::NotFound(format!("record {id} not found")));
  }
  state.changes.bump();
  Ok(StatusCode::NO_CONTENT)
}
