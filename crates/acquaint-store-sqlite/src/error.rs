//! Error type for `acquaint-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A foreign-key or uniqueness constraint rejected the write, e.g. deleting
  /// a contact that still has records.
  #[error("constraint violation: {0}")]
  Constraint(String),

  #[error("username already taken: {0}")]
  UsernameTaken(String),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("invalid object path: {0:?}")]
  InvalidPath(String),
}

impl Error {
  /// Lift constraint violations out of the generic database error.
  pub(crate) fn from_db(e: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(code, msg)) = &e
      && code.code == rusqlite::ErrorCode::ConstraintViolation
    {
      return Error::Constraint(msg.clone().unwrap_or_else(|| code.to_string()));
    }
    Error::Database(e)
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
