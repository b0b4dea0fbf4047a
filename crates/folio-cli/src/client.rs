//! Async HTTP client wrapping the folio JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use folio_core::{
  identity::Actor,
  review::{Review, ReviewDraft, ReviewEdit},
  store::Snapshot,
  vote::VoteKind,
};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::board::Command;

/// How long the server may hold one long-poll request.
pub const POLL_WAIT: Duration = Duration::from_secs(25);

/// Connection settings for the folio API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url:       String,
  /// Sign in as the administrator instead of anonymously when both are set.
  pub admin_email:    String,
  pub admin_password: String,
}

/// Body of both sign-in responses.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionGrant {
  pub token: String,
  pub actor: Actor,
}

/// Async HTTP client for the folio JSON REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
  token:  Option<String>,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(POLL_WAIT + Duration::from_secs(10))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config, token: None })
  }

  pub fn set_token(&mut self, token: String) { self.token = Some(token); }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => req.bearer_auth(token),
      None => req,
    }
  }

  // ── Session ───────────────────────────────────────────────────────────────

  /// Admin sign-in when credentials are configured, anonymous otherwise.
  pub async fn sign_in(&self) -> Result<SessionGrant> {
    let req = if self.config.admin_email.is_empty() {
      self.client.post(self.url("/session/anonymous"))
    } else {
      self.client.post(self.url("/session/admin")).json(&json!({
        "email": self.config.admin_email,
        "password": self.config.admin_password,
      }))
    };
    let resp = req.send().await.context("POST /session failed")?;
    checked(resp, "POST /session")
      .await?
      .json()
      .await
      .context("deserialising session")
  }

  /// `DELETE /api/session`. A no-op when no session was granted.
  pub async fn sign_out(&self) -> Result<()> {
    if self.token.is_none() {
      return Ok(());
    }
    let resp = self
      .auth(self.client.delete(self.url("/session")))
      .send()
      .await
      .context("DELETE /session failed")?;
    checked(resp, "DELETE /session").await?;
    Ok(())
  }

  // ── Reviews ───────────────────────────────────────────────────────────────

  /// `GET /api/reviews?after=<revision>&epoch=<epoch>&wait=<secs>`
  ///
  /// `after` is the [`Snapshot::position`] last seen. Without it the current
  /// snapshot is returned at once.
  pub async fn poll(&self, after: Option<(u64, u64)>) -> Result<Snapshot> {
    let mut req = self.client.get(self.url("/reviews"));
    if let Some((epoch, revision)) = after {
      req = req.query(&[("after", revision), ("epoch", epoch), ("wait", POLL_WAIT.as_secs())]);
    }
    let resp = req.send().await.context("GET /reviews failed")?;
    checked(resp, "GET /reviews")
      .await?
      .json()
      .await
      .context("deserialising snapshot")
  }

  pub async fn create(&self, draft: &ReviewDraft) -> Result<Review> {
    let resp = self
      .auth(self.client.post(self.url("/reviews")))
      .json(draft)
      .send()
      .await
      .context("POST /reviews failed")?;
    checked(resp, "POST /reviews").await?.json().await.context("deserialising review")
  }

  pub async fn update(&self, id: Uuid, edit: &ReviewEdit) -> Result<Review> {
    let resp = self
      .auth(self.client.patch(self.url(&format!("/reviews/{id}"))))
      .json(edit)
      .send()
      .await
      .context("PATCH /reviews failed")?;
    checked(resp, "PATCH /reviews").await?.json().await.context("deserialising review")
  }

  pub async fn delete(&self, id: Uuid) -> Result<()> {
    let resp = self
      .auth(self.client.delete(self.url(&format!("/reviews/{id}"))))
      .send()
      .await
      .context("DELETE /reviews failed")?;
    checked(resp, "DELETE /reviews").await?;
    Ok(())
  }

  pub async fn vote(&self, id: Uuid, kind: VoteKind) -> Result<Review> {
    let resp = self
      .auth(self.client.post(self.url(&format!("/reviews/{id}/vote"))))
      .json(&json!({ "kind": kind }))
      .send()
      .await
      .context("POST /vote failed")?;
    checked(resp, "POST /vote").await?.json().await.context("deserialising review")
  }

  /// Send one board command; the resulting state arrives through the feed.
  pub async fn execute(&self, command: &Command) -> Result<()> {
    match command {
      Command::Create(draft) => self.create(draft).await.map(drop),
      Command::Update { id, edit } => self.update(*id, edit).await.map(drop),
      Command::Delete(id) => self.delete(*id).await,
      Command::Vote { id, kind } => self.vote(*id, *kind).await.map(drop),
    }
  }
}

#[derive(Deserialize)]
struct ErrorBody {
  error: String,
}

/// Pass successful responses through; turn the rest into an error carrying
/// the server's message.
async fn checked(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  match resp.json::<ErrorBody>().await {
    Ok(body) => Err(anyhow!("{what} → {status}: {}", body.error)),
    Err(_) => Err(anyhow!("{what} → {status}")),
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use folio_api::{AdminCredentials, ApiState, LogMailer, Sessions, api_router};
  use folio_core::identity::AdminPolicy;
  use folio_store_sqlite::SqliteStore;

  use super::*;

  /// Serve the API on an ephemeral port; returns the base URL and the
  /// server's session registry.
  async fn serve() -> (String, Arc<Sessions>) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let state = ApiState::new(
      Arc::new(store),
      AdminCredentials {
        policy:        AdminPolicy::new("owner@example.com"),
        password_hash: String::new(),
      },
    );
    let sessions = Arc::clone(&state.sessions);
    let app = axum::Router::new().nest("/api", api_router(state, Arc::new(LogMailer)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}"), sessions)
  }

  fn client(base_url: String) -> ApiClient {
    ApiClient::new(ApiConfig {
      base_url,
      admin_email: String::new(),
      admin_password: String::new(),
    })
    .unwrap()
  }

  #[tokio::test]
  async fn sign_out_releases_the_server_session() {
    let (url, sessions) = serve().await;
    let mut client = client(url);

    let grant = client.sign_in().await.unwrap();
    assert!(!grant.actor.is_admin);
    assert_eq!(sessions.len(), 1);

    client.set_token(grant.token);
    client.sign_out().await.unwrap();
    assert!(sessions.is_empty());

    // The token is gone, so a second sign-out is refused.
    assert!(client.sign_out().await.is_err());
  }

  #[tokio::test]
  async fn sign_out_without_a_session_sends_nothing() {
    // Nothing listens on the discard port; a request would fail.
    client("http://127.0.0.1:9".into()).sign_out().await.unwrap();
  }

  #[tokio::test]
  async fn poll_carries_the_epoch() {
    let (url, _) = serve().await;
    let client = client(url);

    let first = client.poll(None).await.unwrap();
    let stale = (first.epoch.wrapping_add(1), first.revision + 5);
    let answered = tokio::time::timeout(Duration::from_secs(2), client.poll(Some(stale)))
      .await
      .expect("a stale epoch is answered at once")
      .unwrap();
    assert_eq!(answered.position(), first.position());
  }
}
