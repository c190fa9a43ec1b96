//! `POST /uploads`: run an image through the ingest pipeline.

use acquaint_core::{
  ingest::{Analyzer, ImageStore, IngestOutcome, Upload},
  store::ContactStore,
};
use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
};
use bytes::Bytes;
use serde::Deserialize;

use crate::{AppState, auth::AuthUser, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct UploadParams {
  /// Client-side file name; only the extension is used.
  pub file_name: Option<String>,
}

/// `POST /uploads[?file_name=<name>]` with the raw image bytes as body.
pub async fn create<S, I, A>(
  State(state): State<AppState<S, I, A>>,
  AuthUser(account): AuthUser,
  Query(params): Query<UploadParams>,
  body: Bytes,
) -> Result<(StatusCode, Json<IngestOutcome>), ApiError>
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  let upload = Upload {
    file_name: params.file_name.unwrap_or_default(),
    bytes:     body.to_vec(),
  };
  let outcome = state.ingestor.ingest(account.account_id, upload).await?;
  Ok((StatusCode::CREATED, Json(outcome)))
}
