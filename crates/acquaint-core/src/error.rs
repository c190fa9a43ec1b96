//! Error types for `acquaint-core`.
//!
//! Collaborator errors are boxed: the core only needs to say which step of
//! the pipeline failed, not what each backend's error looks like.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("upload is empty")]
  EmptyUpload,

  #[error("image store error: {0}")]
  ImageStore(#[source] BoxError),

  #[error("analysis failed: {0}")]
  Analysis(#[source] BoxError),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl Error {
  pub fn image_store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::ImageStore(Box::new(e))
  }

  pub fn analysis(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Analysis(Box::new(e))
  }

  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
