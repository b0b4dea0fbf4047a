//! JSON REST API for the Folio testimonials board.
//!
//! Exposes an axum [`Router`] backed by any [`folio_core::store::ReviewStore`]
//! and any [`folio_core::contact::Mailer`]. TLS and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", folio_api::api_router(state, Arc::new(LogMailer)))
//! ```

pub mod contact;
pub mod error;
pub mod reviews;
pub mod session;

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  routing::{get, post},
};
use folio_core::{contact::Mailer, store::ReviewStore};

pub use contact::LogMailer;
pub use error::ApiError;
pub use session::{AdminCredentials, SessionGrant, Sessions};

/// Upper bound on a single long-poll wait unless configured otherwise.
pub const DEFAULT_MAX_POLL: Duration = Duration::from_secs(30);

/// Shared state threaded through the review and session handlers.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  pub sessions: Arc<Sessions>,
  pub admin:    Arc<AdminCredentials>,
  /// Cap on `GET /reviews?wait=`.
  pub max_poll: Duration,
}

impl<S> ApiState<S> {
  pub fn new(store: Arc<S>, admin: AdminCredentials) -> Self {
    Self {
      store,
      sessions: Arc::new(Sessions::new()),
      admin: Arc::new(admin),
      max_poll: DEFAULT_MAX_POLL,
    }
  }
}

// Manual impl: `S` itself need not be `Clone`.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      sessions: Arc::clone(&self.sessions),
      admin:    Arc::clone(&self.admin),
      max_poll: self.max_poll,
    }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, M>(state: ApiState<S>, mailer: Arc<M>) -> Router<()>
where
  S: ReviewStore + 'static,
  M: Mailer + 'static,
{
  let contact = Router::new()
    .route("/contact", post(contact::submit::<M>))
    .with_state(mailer);

  Router::new()
    // Sessions
    .route("/session", get(session::current).delete(session::sign_out::<S>))
    .route("/session/anonymous", post(session::anonymous::<S>))
    .route("/session/admin", post(session::admin::<S>))
    // Reviews
    .route("/reviews", get(reviews::list::<S>).post(reviews::create::<S>))
    .route(
      "/reviews/{id}",
      get(reviews::get_one::<S>)
        .patch(reviews::update::<S>)
        .delete(reviews::remove::<S>),
    )
    .route("/reviews/{id}/vote", post(reviews::vote::<S>))
    .with_state(state)
    .merge(contact)
}

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicUsize, Ordering};

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use folio_core::{
    identity::AdminPolicy,
    review::{NewReview, Review, ReviewPatch},
    store::{Snapshot, Subscription},
    vote::VoteKind,
  };
  use folio_store_sqlite::SqliteStore;
  use rand_core::OsRng;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  const ADMIN_EMAIL: &str = "owner@example.com";
  const ADMIN_PASSWORD: &str = "correct horse";

  /// Delegates to SQLite and counts the deletes that reach the store.
  #[derive(Clone)]
  struct CountingStore {
    inner:   SqliteStore,
    deletes: Arc<AtomicUsize>,
  }

  impl ReviewStore for CountingStore {
    type Error = folio_store_sqlite::Error;

    async fn list(&self) -> Result<Snapshot, Self::Error> { self.inner.list().await }

    fn subscribe(&self) -> Subscription { self.inner.subscribe() }

    async fn get(&self, id: Uuid) -> Result<Option<Review>, Self::Error> {
      self.inner.get(id).await
    }

    async fn create(&self, input: NewReview) -> Result<Review, Self::Error> {
      self.inner.create(input).await
    }

    async fn update(&self, id: Uuid, patch: ReviewPatch) -> Result<Option<Review>, Self::Error> {
      self.inner.update(id, patch).await
    }

    async fn vote<'a>(
      &'a self,
      id: Uuid,
      voter: &'a str,
      kind: VoteKind,
    ) -> Result<Option<Review>, Self::Error> {
      self.inner.vote(id, voter, kind).await
    }

    async fn delete(&self, id: Uuid) -> Result<bool, Self::Error> {
      self.deletes.fetch_add(1, Ordering::SeqCst);
      self.inner.delete(id).await
    }
  }

  struct Harness {
    app:     Router,
    deletes: Arc<AtomicUsize>,
  }

  async fn harness() -> Harness {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(ADMIN_PASSWORD.as_bytes(), &salt)
      .unwrap()
      .to_string();

    let deletes = Arc::new(AtomicUsize::new(0));
    let store = CountingStore {
      inner:   SqliteStore::open_in_memory().await.unwrap(),
      deletes: Arc::clone(&deletes),
    };
    let mut state = ApiState::new(
      Arc::new(store),
      AdminCredentials {
        policy:        AdminPolicy::new(ADMIN_EMAIL),
        password_hash: hash,
      },
    );
    state.max_poll = Duration::from_secs(5);

    Harness { app: api_router(state, Arc::new(LogMailer)), deletes }
  }

  async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
      builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
    }
    let req = match body {
      Some(b) => builder
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(b.to_string()))
        .unwrap(),
      None => builder.body(Body::empty()).unwrap(),
    };

    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  /// Returns `(token, user_id)`.
  async fn anonymous(app: &Router) -> (String, String) {
    let (status, body) = call(app, "POST", "/session/anonymous", None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    (
      body["token"].as_str().unwrap().to_string(),
      body["actor"]["identity"]["id"].as_str().unwrap().to_string(),
    )
  }

  async fn admin(app: &Router) -> String {
    let (status, body) = call(
      app,
      "POST",
      "/session/admin",
      None,
      Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["actor"]["isAdmin"], json!(true));
    body["token"].as_str().unwrap().to_string()
  }

  async fn post_review(app: &Router, token: &str) -> Value {
    let (status, body) = call(
      app,
      "POST",
      "/reviews",
      Some(token),
      Some(json!({
        "authorName": "Ada",
        "comment": "Great work on this project!",
        "rating": 5,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
  }

  // ── Sessions ──────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn anonymous_session_resolves_and_signs_out() {
    let h = harness().await;
    let (token, user_id) = anonymous(&h.app).await;

    let (status, body) = call(&h.app, "GET", "/session", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["identity"]["id"], json!(user_id));
    assert_eq!(body["isAdmin"], json!(false));

    let (status, _) = call(&h.app, "DELETE", "/session", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&h.app, "GET", "/session", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn admin_sign_in_requires_exact_credentials() {
    let h = harness().await;
    for (email, password) in [
      (ADMIN_EMAIL, "wrong"),
      ("Owner@example.com", ADMIN_PASSWORD),
      ("someone@example.com", ADMIN_PASSWORD),
    ] {
      let (status, _) = call(
        &h.app,
        "POST",
        "/session/admin",
        None,
        Some(json!({ "email": email, "password": password })),
      )
      .await;
      assert_eq!(status, StatusCode::UNAUTHORIZED, "{email}");
    }
    admin(&h.app).await;
  }

  // ── Create ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn create_records_the_caller_as_author() {
    let h = harness().await;
    let (token, user_id) = anonymous(&h.app).await;
    let review = post_review(&h.app, &token).await;
    assert_eq!(review["userId"], json!(user_id));
    assert_eq!(review["likedBy"], json!([]));

    let (status, snapshot) = call(&h.app, "GET", "/reviews", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["reviews"][0]["id"], review["id"]);
  }

  #[tokio::test]
  async fn create_without_session_is_refused() {
    let h = harness().await;
    let (status, body) = call(
      &h.app,
      "POST",
      "/reviews",
      None,
      Some(json!({ "authorName": "Ada", "comment": "Great work on this project!", "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("not signed in"));
  }

  #[tokio::test]
  async fn create_validates_before_writing() {
    let h = harness().await;
    let (token, _) = anonymous(&h.app).await;

    for (comment, rating, field) in [
      ("123456789", 3, "comment"),
      ("Great work on this project!", 0, "rating"),
      ("Great work on this project!", 6, "rating"),
    ] {
      let (status, body) = call(
        &h.app,
        "POST",
        "/reviews",
        Some(token.as_str()),
        Some(json!({ "authorName": "Ada", "comment": comment, "rating": rating })),
      )
      .await;
      assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
      assert!(body["fields"][field].is_array(), "{body}");
    }

    let (_, snapshot) = call(&h.app, "GET", "/reviews", None, None).await;
    assert_eq!(snapshot["reviews"], json!([]));

    let (status, _) = call(
      &h.app,
      "POST",
      "/reviews",
      Some(token.as_str()),
      Some(json!({ "authorName": "Ada", "comment": "1234567890", "rating": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  // ── Delete ────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn only_the_author_or_admin_may_delete() {
    let h = harness().await;
    let (token_a, _) = anonymous(&h.app).await;
    let (token_b, _) = anonymous(&h.app).await;
    let review = post_review(&h.app, &token_a).await;
    let uri = format!("/reviews/{}", review["id"].as_str().unwrap());

    let (status, _) = call(&h.app, "DELETE", &uri, Some(token_b.as_str()), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(h.deletes.load(Ordering::SeqCst), 0, "store was called");

    let (status, _) = call(&h.app, "DELETE", &uri, None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(h.deletes.load(Ordering::SeqCst), 0);

    let (status, _) = call(&h.app, "DELETE", &uri, Some(token_a.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(h.deletes.load(Ordering::SeqCst), 1);

    let (status, _) = call(&h.app, "GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn admin_may_delete_any_review() {
    let h = harness().await;
    let (token_a, _) = anonymous(&h.app).await;
    let review = post_review(&h.app, &token_a).await;
    let admin_token = admin(&h.app).await;

    let uri = format!("/reviews/{}", review["id"].as_str().unwrap());
    let (status, _) = call(&h.app, "DELETE", &uri, Some(admin_token.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
  }

  // ── Edit ──────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn edit_is_gated_and_validated() {
    let h = harness().await;
    let (token_a, _) = anonymous(&h.app).await;
    let (token_b, _) = anonymous(&h.app).await;
    let review = post_review(&h.app, &token_a).await;
    let uri = format!("/reviews/{}", review["id"].as_str().unwrap());

    let (status, _) =
      call(&h.app, "PATCH", &uri, Some(token_b.as_str()), Some(json!({ "rating": 1 }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) =
      call(&h.app, "PATCH", &uri, Some(token_a.as_str()), Some(json!({ "rating": 6 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["fields"]["rating"].is_array());

    let (status, body) =
      call(&h.app, "PATCH", &uri, Some(token_a.as_str()), Some(json!({ "rating": 4 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"], json!(4));
    assert_eq!(body["comment"], review["comment"]);

    let admin_token = admin(&h.app).await;
    let (status, body) = call(
      &h.app,
      "PATCH",
      &uri,
      Some(admin_token.as_str()),
      Some(json!({ "comment": "Edited by the site owner." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["comment"], json!("Edited by the site owner."));
    assert_eq!(body["userId"], review["userId"]);
  }

  // ── Votes ─────────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn like_then_dislike_through_the_api() {
    let h = harness().await;
    let (token_owner, _) = anonymous(&h.app).await;
    let (token_a, user_a) = anonymous(&h.app).await;
    let review = post_review(&h.app, &token_owner).await;
    let uri = format!("/reviews/{}/vote", review["id"].as_str().unwrap());

    let (status, body) =
      call(&h.app, "POST", &uri, Some(token_a.as_str()), Some(json!({ "kind": "like" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["likedBy"], json!([user_a]));
    assert_eq!(body["dislikedBy"], json!([]));

    let (_, body) =
      call(&h.app, "POST", &uri, Some(token_a.as_str()), Some(json!({ "kind": "dislike" }))).await;
    assert_eq!(body["likedBy"], json!([]));
    assert_eq!(body["dislikedBy"], json!([user_a]));
  }

  #[tokio::test]
  async fn vote_without_session_reports_not_signed_in() {
    let h = harness().await;
    let (token, _) = anonymous(&h.app).await;
    let review = post_review(&h.app, &token).await;
    let uri = format!("/reviews/{}/vote", review["id"].as_str().unwrap());

    let (status, body) = call(&h.app, "POST", &uri, None, Some(json!({ "kind": "like" }))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("not signed in"));
  }

  #[tokio::test]
  async fn vote_on_missing_review_is_404() {
    let h = harness().await;
    let (token, _) = anonymous(&h.app).await;
    let uri = format!("/reviews/{}/vote", Uuid::new_v4());
    let (status, _) = call(&h.app, "POST", &uri, Some(token.as_str()), Some(json!({ "kind": "like" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
  }

  // ── Long-poll ─────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn long_poll_returns_when_a_write_lands() {
    let h = harness().await;
    let (token, _) = anonymous(&h.app).await;
    let (_, snapshot) = call(&h.app, "GET", "/reviews", None, None).await;
    let revision = snapshot["revision"].as_u64().unwrap();

    let app = h.app.clone();
    let poll = tokio::spawn(async move {
      call(&app, "GET", &format!("/reviews?after={revision}&wait=5"), None, None).await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    let review = post_review(&h.app, &token).await;

    let (status, snapshot) = poll.await.unwrap();
    assert_eq!(status, StatusCode::OK);
    assert!(snapshot["revision"].as_u64().unwrap() > revision);
    assert_eq!(snapshot["reviews"][0]["id"], review["id"]);
  }

  #[tokio::test]
  async fn long_poll_answers_immediately_when_behind() {
    let h = harness().await;
    let (token, _) = anonymous(&h.app).await;
    post_review(&h.app, &token).await;

    let (status, snapshot) =
      tokio::time::timeout(Duration::from_secs(1), call(&h.app, "GET", "/reviews?after=0&wait=5", None, None))
        .await
        .expect("no wait when the caller is behind");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(snapshot["reviews"].as_array().unwrap().len(), 1);
  }

  #[tokio::test]
  async fn long_poll_from_another_epoch_answers_immediately() {
    let h = harness().await;
    let (_, snapshot) = call(&h.app, "GET", "/reviews", None, None).await;
    let epoch = snapshot["epoch"].as_u64().unwrap();
    let revision = snapshot["revision"].as_u64().unwrap();

    // A revision from an earlier run can be ahead of this one's counter.
    let uri = format!("/reviews?after={}&epoch={}&wait=5", revision + 1, epoch.wrapping_add(1));
    let (status, body) = tokio::time::timeout(Duration::from_secs(1), call(&h.app, "GET", &uri, None, None))
      .await
      .expect("no wait across epochs");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["epoch"], json!(epoch));
    assert_eq!(body["revision"], json!(revision));

    // Same epoch and revision still waits for the next write.
    let uri = format!("/reviews?after={revision}&epoch={epoch}&wait=5");
    let waited = tokio::time::timeout(Duration::from_millis(200), call(&h.app, "GET", &uri, None, None)).await;
    assert!(waited.is_err(), "answered without a new snapshot");
  }

  // ── Session lifetime ──────────────────────────────────────────────────────

  #[tokio::test]
  async fn idle_sessions_do_not_accumulate() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let mut state = ApiState::new(
      Arc::new(store),
      AdminCredentials {
        policy:        AdminPolicy::new(ADMIN_EMAIL),
        password_hash: String::new(),
      },
    );
    let sessions = Arc::new(Sessions::with_idle_limit(Duration::ZERO));
    state.sessions = Arc::clone(&sessions);
    let app = api_router(state, Arc::new(LogMailer));

    for _ in 0..100 {
      anonymous(&app).await;
    }
    assert!(sessions.len() <= 1, "{} sessions held", sessions.len());
  }

  #[tokio::test]
  async fn signed_out_sessions_are_released() {
    let h = harness().await;
    let (token, _) = anonymous(&h.app).await;
    let (status, _) = call(&h.app, "DELETE", "/session", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&h.app, "DELETE", "/session", Some(token.as_str()), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], json!("not signed in"));
  }

  // ── Contact ───────────────────────────────────────────────────────────────

  #[tokio::test]
  async fn contact_form_is_validated() {
    let h = harness().await;
    let (status, _) = call(
      &h.app,
      "POST",
      "/contact",
      None,
      Some(json!({ "name": "Ada", "email": "ada@example.com", "message": "Let's build something." })),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let (status, body) = call(
      &h.app,
      "POST",
      "/contact",
      None,
      Some(json!({ "name": "A", "email": "nope", "message": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    for field in ["name", "email", "message"] {
      assert!(body["fields"][field].is_array(), "{field}");
    }
  }
}
