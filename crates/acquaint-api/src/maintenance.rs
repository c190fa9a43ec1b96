//! Maintenance endpoints: the placeholder-name repair job and the change-feed
//! revision that list views poll.

use acquaint_core::{
  ingest::{Analyzer, ImageStore},
  repair::{RepairReport, repair_user_contacts},
  store::ContactStore,
};
use axum::{Json, extract::State};
use serde::Serialize;

use crate::{AppState, auth::AuthUser, error::ApiError};

/// `POST /repair`: repairs the caller's own contacts. The all-users run is
/// only available offline through the server's `--repair` mode.
pub async fn repair<S, I, A>(
  State(state): State<AppState<S, I, A>>,
  AuthUser(account): AuthUser,
) -> Result<Json<RepairReport>, ApiError>
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  tracing::info!(requested_by = %account.username, "repair run requested");
  let report = repair_user_contacts(state.store.as_ref(), account.account_id)
    .await
    .map_err(ApiError::store)?;
  if report.repaired > 0 {
    state.changes.bump();
  }
  Ok(Json(report))
}

#[derive(Debug, Serialize)]
pub struct Revision {
  pub revision: u64,
}

/// `GET /revision`
pub async fn revision<S, I, A>(
  State(state): State<AppState<S, I, A>>,
  _user: AuthUser,
) -> Json<Revision>
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  Json(Revision { revision: state.changes.revision() })
}
