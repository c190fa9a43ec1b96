//! JSON REST API for Acquaint.
//!
//! Exposes an axum [`Router`] backed by any [`ContactStore`], [`ImageStore`]
//! and [`Analyzer`]. Every route except `POST /register` requires HTTP Basic
//! auth against the account table; the authenticated account scopes all
//! reads and deletes. TLS and static file serving are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", acquaint_api::api_router(state))
//! ```

pub mod accounts;
pub mod auth;
pub mod contacts;
pub mod error;
pub mod maintenance;
pub mod records;
pub mod uploads;

use std::sync::Arc;

use acquaint_core::{
  changes::ChangeFeed,
  ingest::{Analyzer, ImageStore, Ingestor},
  store::ContactStore,
};
use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{delete, get, post},
};

pub use error::ApiError;

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

// ─── Settings ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ApiSettings {
  pub allow_registration: bool,
  /// Largest accepted `POST /uploads` body.
  pub max_upload_bytes:   usize,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self { allow_registration: true, max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct AppState<S, I, A> {
  pub store:    Arc<S>,
  pub ingestor: Arc<Ingestor<S, I, A>>,
  pub changes:  ChangeFeed,
  pub settings: Arc<ApiSettings>,
}

impl<S, I, A> Clone for AppState<S, I, A> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      ingestor: Arc::clone(&self.ingestor),
      changes:  self.changes.clone(),
      settings: Arc::clone(&self.settings),
    }
  }
}

impl<S, I, A> AppState<S, I, A>
where
  S: ContactStore,
  I: ImageStore,
  A: Analyzer,
{
  /// Wire the ingest pipeline and a fresh change feed around `store`.
  pub fn new(store: Arc<S>, images: Arc<I>, analyzer: Arc<A>, settings: ApiSettings) -> Self {
    let changes = ChangeFeed::new();
    let ingestor = Ingestor::new(Arc::clone(&store), images, analyzer, changes.clone());
    Self { store, ingestor: Arc::new(ingestor), changes, settings: Arc::new(settings) }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, I, A>(state: AppState<S, I, A>) -> Router<()>
where
  S: ContactStore + 'static,
  I: ImageStore + 'static,
  A: Analyzer + 'static,
{
  let upload_limit = state.settings.max_upload_bytes;

  Router::new()
    // Accounts
    .route("/register", post(accounts::register::<S, I, A>))
    // Contacts
    .route("/contacts", get(contacts::list::<S, I, A>))
    .route(
      "/contacts/{id}",
      get(contacts::get_one::<S, I, A>).delete(contacts::delete_one::<S, I, A>),
    )
    .route("/contacts/{id}/records", get(contacts::records::<S, I, A>))
    // Records
    .route("/records/{id}", delete(records::delete_one::<S, I, A>))
    // Uploads
    .route(
      "/uploads",
      post(uploads::create::<S, I, A>).layer(DefaultBodyLimit::max(upload_limit)),
    )
    // Maintenance
    .route("/repair", post(maintenance::repair::<S, I, A>))
    .route("/revision", get(maintenance::revision::<S, I, A>))
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::path::PathBuf;

  use acquaint_core::{contact::NewRecord, payload::RawAnalysisPayload};
  use acquaint_store_sqlite::{FsImageStore, SqliteStore};
  use axum::{
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
  };
  use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  /// Replies with a fixed text, or fails when none is set.
  struct FixedAnalyzer(Option<&'static str>);

  impl Analyzer for FixedAnalyzer {
    type Error = std::io::Error;

    async fn analyze(&self, _: &str, _: Uuid) -> Result<RawAnalysisPayload, Self::Error> {
      self
        .0
        .map(RawAnalysisPayload::from_text)
        .ok_or_else(|| std::io::Error::other("workflow unavailable"))
    }
  }

  type TestState = AppState<SqliteStore, FsImageStore, FixedAnalyzer>;

  struct Harness {
    state: TestState,
    root:  PathBuf,
  }

  impl Drop for Harness {
    fn drop(&mut self) { std::fs::remove_dir_all(&self.root).ok(); }
  }

  async fn harness_with(reply: Option<&'static str>, settings: ApiSettings) -> Harness {
    let root = std::env::temp_dir().join(format!("acquaint-api-{}", Uuid::new_v4()));
    let store = SqliteStore::open_in_memory().await.unwrap();
    let state = AppState::new(
      Arc::new(store),
      Arc::new(FsImageStore::new(&root, "http://localhost:8080")),
      Arc::new(FixedAnalyzer(reply)),
      settings,
    );
    Harness { state, root }
  }

  async fn harness(reply: &'static str) -> Harness {
    harness_with(Some(reply), ApiSettings::default()).await
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  async fn send(
    state: &TestState,
    method: &str,
    uri: &str,
    auth: Option<(&str, &str)>,
    body: Body,
  ) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, pass)) = auth {
      builder = builder.header(header::AUTHORIZATION, basic(user, pass));
    }
    if method == "POST" && uri == "/register" {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
    }
    api_router(state.clone()).oneshot(builder.body(body).unwrap()).await.unwrap()
  }

  async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
  }

  const ALICE: Option<(&str, &str)> = Some(("alice", "secret"));

  async fn register_alice(state: &TestState) -> Uuid {
    let resp = send(
      state,
      "POST",
      "/register",
      None,
      Body::from(json!({"username": "  Alice ", "password": "secret"}).to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = json_body(resp).await;
    assert_eq!(body["username"], "alice");
    assert!(body.get("password_hash").is_none());
    body["account_id"].as_str().unwrap().parse().unwrap()
  }

  async fn upload(state: &TestState) -> Value {
    let resp = send(state, "POST", "/uploads?file_name=card.png", ALICE, Body::from(vec![1u8, 2, 3]))
      .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    json_body(resp).await
  }

  // ── Accounts ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn register_then_duplicate_conflicts() {
    let h = harness("{}").await;
    register_alice(&h.state).await;

    let resp = send(
      &h.state,
      "POST",
      "/register",
      None,
      Body::from(json!({"username": "ALICE", "password": "other"}).to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
  }

  #[tokio::test]
  async fn registration_can_be_disabled() {
    let settings = ApiSettings { allow_registration: false, ..Default::default() };
    let h = harness_with(Some("{}"), settings).await;
    let resp = send(
      &h.state,
      "POST",
      "/register",
      None,
      Body::from(json!({"username": "bob", "password": "pw"}).to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
  }

  #[tokio::test]
  async fn requests_without_valid_credentials_are_rejected() {
    let h = harness("{}").await;
    register_alice(&h.state).await;

    let resp = send(&h.state, "GET", "/contacts", None, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let resp = send(&h.state, "GET", "/contacts", Some(("alice", "nope")), Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = send(&h.state, "GET", "/contacts", Some(("ALICE", "secret")), Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
  }

  // ── Uploads ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn upload_creates_contact_visible_in_list() {
    let h = harness("```json\n{\"name\":\"Bob\",\"summary\":\"expo\",\"tag\":\"vip, partner\"}\n```").await;
    register_alice(&h.state).await;

    let outcome = upload(&h.state).await;
    assert_eq!(outcome["normalized"]["name"], "Bob");
    assert_eq!(outcome["revision"], 1);
    assert!(outcome["record"]["image_url"].as_str().unwrap().starts_with("http://localhost:8080/images/"));

    let resp = send(&h.state, "GET", "/contacts", ALICE, Body::empty()).await;
    let list = json_body(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["name"], "Bob");
    assert_eq!(list[0]["summary"], "expo");
    assert_eq!(list[0]["tags"], json!(["vip", "partner"]));

    let resp = send(&h.state, "GET", "/revision", ALICE, Body::empty()).await;
    assert_eq!(json_body(resp).await["revision"], 1);
  }

  #[tokio::test]
  async fn keywords_from_fenced_reply_are_searchable() {
    let h = harness("```json\n{\"name\":\"Bob\",\"keywords\":\"solar robotics\"}\n```").await;
    register_alice(&h.state).await;
    upload(&h.state).await;

    let resp = send(&h.state, "GET", "/contacts?q=robotics", ALICE, Body::empty()).await;
    let list = json_body(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["name"], "Bob");
  }

  #[tokio::test]
  async fn empty_upload_is_bad_request() {
    let h = harness("{}").await;
    register_alice(&h.state).await;
    let resp = send(&h.state, "POST", "/uploads", ALICE, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn oversized_upload_is_rejected() {
    let settings = ApiSettings { max_upload_bytes: 4, ..Default::default() };
    let h = harness_with(Some("{}"), settings).await;
    register_alice(&h.state).await;
    let resp = send(&h.state, "POST", "/uploads", ALICE, Body::from(vec![0u8; 16])).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
  }

  #[tokio::test]
  async fn analysis_failure_is_bad_gateway() {
    let h = harness_with(None, ApiSettings::default()).await;
    register_alice(&h.state).await;

    let resp = send(&h.state, "POST", "/uploads", ALICE, Body::from(vec![1u8])).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(json_body(resp).await["error"].as_str().unwrap().contains("workflow unavailable"));

    let resp = send(&h.state, "GET", "/contacts", ALICE, Body::empty()).await;
    assert_eq!(json_body(resp).await, json!([]));
  }

  // ── Contacts and records ────────────────────────────────────────────────────

  #[tokio::test]
  async fn search_filters_contacts() {
    let h = harness("{\"name\":\"Bob\",\"summary\":\"robotics expo\"}").await;
    register_alice(&h.state).await;
    upload(&h.state).await;

    let resp = send(&h.state, "GET", "/contacts?q=ROBOTICS", ALICE, Body::empty()).await;
    assert_eq!(json_body(resp).await.as_array().unwrap().len(), 1);

    let resp = send(&h.state, "GET", "/contacts?q=gardening", ALICE, Body::empty()).await;
    assert_eq!(json_body(resp).await, json!([]));
  }

  #[tokio::test]
  async fn timeline_and_deletes() {
    let h = harness("{\"name\":\"Bob\",\"summary\":\"s\"}").await;
    register_alice(&h.state).await;
    let first = upload(&h.state).await;
    upload(&h.state).await;
    let contact_id = first["contact_id"].as_str().unwrap().to_owned();

    let resp =
      send(&h.state, "GET", &format!("/contacts/{contact_id}/records"), ALICE, Body::empty()).await;
    let records = json_body(resp).await;
    assert_eq!(records.as_array().unwrap().len(), 2);

    let record_id = first["record"]["record_id"].as_str().unwrap();
    let resp = send(&h.state, "DELETE", &format!("/records/{record_id}"), ALICE, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&h.state, "DELETE", &format!("/records/{record_id}"), ALICE, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&h.state, "DELETE", &format!("/contacts/{contact_id}"), ALICE, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send(&h.state, "GET", &format!("/contacts/{contact_id}"), ALICE, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    // two uploads, one record delete, one contact delete
    assert_eq!(h.state.changes.revision(), 4);
  }

  #[tokio::test]
  async fn contacts_of_other_users_are_invisible() {
    let h = harness("{\"name\":\"Bob\"}").await;
    register_alice(&h.state).await;
    let outcome = upload(&h.state).await;
    let contact_id = outcome["contact_id"].as_str().unwrap();

    send(
      &h.state,
      "POST",
      "/register",
      None,
      Body::from(json!({"username": "mallory", "password": "pw"}).to_string()),
    )
    .await;
    let mallory = Some(("mallory", "pw"));

    let resp = send(&h.state, "GET", &format!("/contacts/{contact_id}"), mallory, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp =
      send(&h.state, "DELETE", &format!("/contacts/{contact_id}"), mallory, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send(&h.state, "GET", "/contacts", mallory, Body::empty()).await;
    assert_eq!(json_body(resp).await, json!([]));
  }

  // ── Maintenance ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn repair_renames_placeholder_contacts() {
    let h = harness("{}").await;
    let user = register_alice(&h.state).await;

    let store = h.state.store.as_ref();
    let contact = store
      .add_contact(acquaint_core::contact::NewContact::named(user, "Unknown"))
      .await
      .unwrap();
    store
      .add_record(NewRecord {
        user_id:       user,
        contact_id:    contact.contact_id,
        image_url:     "http://localhost:8080/images/x.jpg".into(),
        raw_payload:   json!("noise {\"name\": \"Carol\""),
        key_takeaways: String::new(),
      })
      .await
      .unwrap();

    let resp = send(&h.state, "POST", "/repair", ALICE, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report = json_body(resp).await;
    assert_eq!(report["examined"], 1);
    assert_eq!(report["repaired"], 1);
    assert_eq!(h.state.changes.revision(), 1);

    let resp = send(&h.state, "GET", &format!("/contacts/{}", contact.contact_id), ALICE, Body::empty())
      .await;
    assert_eq!(json_body(resp).await["name"], "Carol");
  }

  #[tokio::test]
  async fn repair_only_touches_the_callers_contacts() {
    let h = harness("{}").await;
    let alice = register_alice(&h.state).await;
    let resp = send(
      &h.state,
      "POST",
      "/register",
      None,
      Body::from(json!({"username": "mallory", "password": "pw"}).to_string()),
    )
    .await;
    let mallory: Uuid = json_body(resp).await["account_id"].as_str().unwrap().parse().unwrap();

    let store = h.state.store.as_ref();
    let mut placeholders = Vec::new();
    for (user, name) in [(alice, "Carol"), (mallory, "Dave")] {
      let contact = store
        .add_contact(acquaint_core::contact::NewContact::named(user, "Unknown"))
        .await
        .unwrap();
      store
        .add_record(NewRecord {
          user_id:       user,
          contact_id:    contact.contact_id,
          image_url:     "http://localhost:8080/images/x.jpg".into(),
          raw_payload:   json!({ "name": name }),
          key_takeaways: String::new(),
        })
        .await
        .unwrap();
      placeholders.push((user, contact.contact_id));
    }

    let resp = send(&h.state, "POST", "/repair", Some(("mallory", "pw")), Body::empty()).await;
    let report = json_body(resp).await;
    assert_eq!((report["examined"].as_u64(), report["repaired"].as_u64()), (Some(1), Some(1)));

    let (user, id) = placeholders[0];
    assert_eq!(store.get_contact(user, id).await.unwrap().unwrap().name, "Unknown");
    let (user, id) = placeholders[1];
    assert_eq!(store.get_contact(user, id).await.unwrap().unwrap().name, "Dave");
  }
}
