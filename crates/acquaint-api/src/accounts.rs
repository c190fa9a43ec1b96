//! `POST /register`: open sign-up.

use acquaint_core::{
  contact::{Account, normalize_username},
  ingest::{Analyzer, ImageStore},
  store::ContactStore,
};
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use crate::{AppState, auth::hash_password, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username: String,
  pub password: String,
}

/// `POST /register` with body `{"username":"…","password":"…"}`
pub async fn register<S, I, A>(
  State(state): State<AppState<S, I, A>>,
  Json(body): Json<RegisterBody>,
) -> Result<(StatusCode, Json<Account>), ApiError>
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  if !state.settings.allow_registration {
    return Err(ApiError::RegistrationClosed);
  }

  let username = normalize_username(&body.username);
  if username.is_empty() || username.contains(':') {
    return Err(ApiError::BadRequest("invalid username".into()));
  }
  if body.password.is_empty() {
    return Err(ApiError::BadRequest("password must not be empty".into()));
  }

  if state.store.get_account(&username).await.map_err(ApiError::store)?.is_some() {
    return Err(taken(&username));
  }

  let hash = hash_password(&body.password)?;
  let account = state
    .store
    .add_account(username.clone(), hash)
    .await
    .map_err(|e| insert_error::<S>(&username, e))?;

  tracing::info!(account_id = %account.account_id, username = %account.username, "account registered");
  Ok((StatusCode::CREATED, Json(account)))
}

fn taken(username: &str) -> ApiError { ApiError::Conflict(format!("username {username} is taken")) }

/// A concurrent registration can claim the username between the lookup and
/// the insert; that still answers 409.
fn insert_error<S: ContactStore>(username: &str, error: S::Error) -> ApiError {
  if S::is_username_taken(&error) { taken(username) } else { ApiError::store(error) }
}

#[cfg(test)]
mod tests {
  use acquaint_store_sqlite::{Error, SqliteStore};
  use axum::response::IntoResponse as _;

  use super::*;

  #[test]
  fn lost_registration_race_is_a_conflict() {
    let err = insert_error::<SqliteStore>("alice", Error::UsernameTaken("alice".into()));
    assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
  }

  #[test]
  fn other_store_failures_stay_internal() {
    let err = insert_error::<SqliteStore>("alice", Error::Constraint("records".into()));
    assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
  }
}
