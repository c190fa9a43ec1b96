//! [`FsImageStore`]: uploaded images kept as plain files on disk.
//!
//! No image bytes live in the database; records carry the public URL only.
//! The server exposes `root` under `/images`, so an object stored at
//! `<user>/<file>` is reachable at `<public_base_url>/images/<user>/<file>`.

use std::path::{Component, Path, PathBuf};

use acquaint_core::ingest::ImageStore;

use crate::{Error, Result};

#[derive(Debug, Clone)]
pub struct FsImageStore {
  root:            PathBuf,
  public_base_url: String,
}

impl FsImageStore {
  pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
    Self { root: root.into(), public_base_url: public_base_url.into() }
  }

  pub fn root(&self) -> &Path { &self.root }

  /// Resolve an object path below `root`, refusing anything that could
  /// escape it.
  fn resolve(&self, path: &str) -> Result<PathBuf> {
    let rel = Path::new(path);
    let plain = !path.is_empty()
      && rel.components().all(|c| matches!(c, Component::Normal(_)));
    if !plain {
      return Err(Error::InvalidPath(path.to_owned()));
    }
    Ok(self.root.join(rel))
  }
}

impl ImageStore for FsImageStore {
  type Error = Error;

  async fn upload(&self, path: &str, bytes: Vec<u8>) -> Result<()> {
    let target = self.resolve(path)?;
    if let Some(parent) = target.parent() {
      tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, bytes).await?;
    tracing::debug!(path = %target.display(), "image written");
    Ok(())
  }

  fn public_url(&self, path: &str) -> String {
    format!("{}/images/{}", self.public_base_url.trim_end_matches('/'), path)
  }
}
