//! The upload pipeline and the collaborator traits it drives.
//!
//! An upload is a strictly sequential chain of awaited calls:
//!
//! 1. store the image bytes ([`ImageStore::upload`]);
//! 2. resolve its public URL ([`ImageStore::public_url`]);
//! 3. analyse the image ([`Analyzer::analyze`]);
//! 4. normalise the payload ([`normalize`]);
//! 5. find or create the contact ([`resolve_contact`]);
//! 6. insert the record;
//! 7. overwrite the contact's summary and `last_updated`.
//!
//! The first failure aborts the chain. Earlier steps are not compensated: an
//! uploaded image stays in the image store when analysis fails, and a record
//! inserted before a failed summary update stays until the next upload
//! refreshes the contact.

use std::{future::Future, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
  Error, Result,
  changes::ChangeFeed,
  contact::{NewRecord, Record},
  normalize::{NormalizedResult, normalize},
  payload::RawAnalysisPayload,
  store::ContactStore,
  upsert::resolve_contact,
};

const DEFAULT_EXTENSION: &str = "jpg";

// ─── Collaborators ───────────────────────────────────────────────────────────

/// Object storage for uploaded images. Objects are publicly readable once
/// uploaded.
pub trait ImageStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `bytes` under the relative object `path`.
  fn upload<'a>(
    &'a self,
    path: &'a str,
    bytes: Vec<u8>,
  ) -> impl Future<Output = std::result::Result<(), Self::Error>> + Send + 'a;

  /// The URL under which `path` is publicly reachable.
  fn public_url(&self, path: &str) -> String;
}

/// The external AI workflow that reads an image.
pub trait Analyzer: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Analyse the image at `image_url` on behalf of `user_id`.
  fn analyze<'a>(
    &'a self,
    image_url: &'a str,
    user_id: Uuid,
  ) -> impl Future<Output = std::result::Result<RawAnalysisPayload, Self::Error>> + Send + 'a;
}

// ─── Inputs and outputs ──────────────────────────────────────────────────────

/// An image as received from the client.
#[derive(Debug, Clone)]
pub struct Upload {
  /// Client-side file name; only its extension is kept.
  pub file_name: String,
  pub bytes:     Vec<u8>,
}

/// Everything a caller needs to show the result of an upload.
#[derive(Debug, Clone, Serialize)]
pub struct IngestOutcome {
  pub contact_id: Uuid,
  pub record:     Record,
  pub normalized: NormalizedResult,
  /// Change-feed revision after this upload.
  pub revision:   u64,
}

/// Object path for an upload: `<user_id>/<unix millis>.<ext>`.
///
/// The extension comes from the client file name when it is plain ASCII
/// alphanumerics, and defaults to `jpg` otherwise.
pub fn object_path(user_id: Uuid, file_name: &str, now: DateTime<Utc>) -> String {
  let ext = Path::new(file_name)
    .extension()
    .and_then(|e| e.to_str())
    .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
    .map(str::to_ascii_lowercase)
    .unwrap_or_else(|| DEFAULT_EXTENSION.to_owned());
  format!("{user_id}/{}.{ext}", now.timestamp_millis())
}

// ─── Pipeline ────────────────────────────────────────────────────────────────

/// Runs uploads through the pipeline. Cheap to share behind an `Arc`.
pub struct Ingestor<S, I, A> {
  store:    Arc<S>,
  images:   Arc<I>,
  analyzer: Arc<A>,
  changes:  ChangeFeed,
}

impl<S, I, A> Ingestor<S, I, A>
where
  S: ContactStore,
  I: ImageStore,
  A: Analyzer,
{
  pub fn new(store: Arc<S>, images: Arc<I>, analyzer: Arc<A>, changes: ChangeFeed) -> Self {
    Self { store, images, analyzer, changes }
  }

  pub fn changes(&self) -> &ChangeFeed { &self.changes }

  /// Run one upload for `user_id` through every step of the pipeline.
  pub async fn ingest(&self, user_id: Uuid, upload: Upload) -> Result<IngestOutcome> {
    if upload.bytes.is_empty() {
      return Err(Error::EmptyUpload);
    }

    let path = object_path(user_id, &upload.file_name, Utc::now());
    tracing::info!(%user_id, %path, bytes = upload.bytes.len(), "storing upload");
    self
      .images
      .upload(&path, upload.bytes)
      .await
      .map_err(Error::image_store)?;
    let image_url = self.images.public_url(&path);

    tracing::info!(%image_url, "analysing image");
    let payload = self
      .analyzer
      .analyze(&image_url, user_id)
      .await
      .map_err(Error::analysis)?;

    let normalized = normalize(&payload);
    tracing::info!(name = %normalized.name, tags = ?normalized.tags, "analysis normalised");

    let contact_id = resolve_contact(self.store.as_ref(), user_id, &normalized.name)
      .await
      .map_err(Error::store)?;

    let record = self
      .store
      .add_record(NewRecord {
        user_id,
        contact_id,
        image_url,
        raw_payload: normalized.raw_payload.clone(),
        key_takeaways: normalized.summary.clone(),
      })
      .await
      .map_err(Error::store)?;

    self
      .store
      .touch_contact(contact_id, normalized.summary.clone(), record.created_at)
      .await
      .map_err(Error::store)?;

    let revision = self.changes.bump();
    Ok(IngestOutcome { contact_id, record, normalized, revision })
  }
}
