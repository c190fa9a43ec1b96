//! HTTP Basic-auth extractor backed by the account table.

use acquaint_core::{
  contact::{Account, normalize_username},
  ingest::{Analyzer, ImageStore},
  store::ContactStore,
};
use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use rand_core::OsRng;

use crate::{AppState, error::ApiError};

/// The authenticated account. Its `account_id` scopes every query.
pub struct AuthUser(pub Account);

/// Hash `password` into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::Hash(e.to_string()))
}

/// Check `password` against a stored PHC string.
pub fn verify_password(password: &str, phc: &str) -> Result<(), ApiError> {
  let parsed = PasswordHash::new(phc).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .map_err(|_| ApiError::Unauthorized)
}

/// Decode `Authorization: Basic …` into `(username, password)`.
pub fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), ApiError> {
  let encoded = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Basic "))
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = String::from_utf8(decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  Ok((username.to_owned(), password.to_owned()))
}

impl<S, I, A> FromRequestParts<AppState<S, I, A>> for AuthUser
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, I, A>,
  ) -> Result<Self, Self::Rejection> {
    let (username, password) = basic_credentials(&parts.headers)?;
    let username = normalize_username(&username);

    let account = state
      .store
      .get_account(&username)
      .await
      .map_err(ApiError::store)?
      .ok_or_else(|| {
        tracing::debug!(%username, "unknown account");
        ApiError::Unauthorized
      })?;

    verify_password(&password, &account.password_hash)?;
    Ok(AuthUser(account))
  }
}
