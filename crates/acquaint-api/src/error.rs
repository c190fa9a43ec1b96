//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("registration is disabled")]
  RegistrationClosed,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error(transparent)]
  Ingest(#[from] acquaint_core::Error),

  #[error("password hashing failed: {0}")]
  Hash(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::RegistrationClosed => StatusCode::FORBIDDEN,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) | ApiError::Ingest(acquaint_core::Error::EmptyUpload) => {
        StatusCode::BAD_REQUEST
      }
      ApiError::Conflict(_) => StatusCode::CONFLICT,
      ApiError::Ingest(acquaint_core::Error::Analysis(_)) => StatusCode::BAD_GATEWAY,
      ApiError::Ingest(_) | ApiError::Hash(_) | ApiError::Store(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    if status.is_server_error() {
      tracing::error!(error = %self, "request failed");
    }

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if matches!(self, ApiError::Unauthorized) {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"acquaint\""),
      );
    }
    res
  }
}
