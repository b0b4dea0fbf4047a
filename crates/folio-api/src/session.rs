//! Sessions: issuing identities and resolving the caller of each request.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/session/anonymous` | New anonymous identity; 201 + [`SessionGrant`] |
//! | `POST`   | `/session/admin` | Body: `{"email":"…","password":"…"}` |
//! | `GET`    | `/session` | The caller's [`Actor`]; 401 without a session |
//! | `DELETE` | `/session` | Revoke the presented token |
//!
//! Tokens are opaque bearer strings. Only their SHA-256 digest is kept, in
//! memory, until the session is revoked or goes idle.

use std::{
  collections::HashMap,
  sync::{PoisonError, RwLock},
  time::{Duration, Instant},
};

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  Json,
  extract::{FromRequestParts, State},
  http::{HeaderMap, StatusCode, header, request::Parts},
  response::IntoResponse,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use folio_core::{
  identity::{Actor, AdminPolicy, Identity},
  store::ReviewStore,
};
use rand_core::{OsRng, RngCore as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::{ApiState, error::ApiError};

// ─── Registry ─────────────────────────────────────────────────────────────────

/// Sessions unused for this long are dropped.
pub const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug)]
struct Entry {
  actor:     Actor,
  last_seen: Instant,
}

/// Live sessions keyed by token digest.
///
/// A session expires once it has gone unused for the idle limit. Expired
/// entries stop resolving at once and are swept out whenever a new session
/// is issued.
#[derive(Debug)]
pub struct Sessions {
  by_digest: RwLock<HashMap<String, Entry>>,
  idle:      Duration,
}

impl Default for Sessions {
  fn default() -> Self { Self::with_idle_limit(DEFAULT_SESSION_IDLE) }
}

impl Sessions {
  pub fn new() -> Self { Self::default() }

  pub fn with_idle_limit(idle: Duration) -> Self {
    Self { by_digest: RwLock::default(), idle }
  }

  /// Register `actor` and return the bearer token that resolves to it.
  pub fn issue(&self, actor: Actor) -> String { self.issue_at(actor, Instant::now()) }

  fn issue_at(&self, actor: Actor, now: Instant) -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let token = URL_SAFE_NO_PAD.encode(bytes);

    let mut map = self.by_digest.write().unwrap_or_else(PoisonError::into_inner);
    let before = map.len();
    map.retain(|_, entry| now.saturating_duration_since(entry.last_seen) < self.idle);
    if map.len() < before {
      tracing::debug!(expired = before - map.len(), "idle sessions dropped");
    }
    map.insert(digest(&token), Entry { actor, last_seen: now });
    token
  }

  /// The actor behind `token`, refreshing its idle timer.
  pub fn resolve(&self, token: &str) -> Option<Actor> { self.resolve_at(token, Instant::now()) }

  fn resolve_at(&self, token: &str, now: Instant) -> Option<Actor> {
    let mut map = self.by_digest.write().unwrap_or_else(PoisonError::into_inner);
    let entry = map.get_mut(&digest(token))?;
    if now.saturating_duration_since(entry.last_seen) >= self.idle {
      return None;
    }
    entry.last_seen = now;
    Some(entry.actor.clone())
  }

  /// Returns whether the token was live.
  pub fn revoke(&self, token: &str) -> bool {
    self
      .by_digest
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&digest(token))
      .is_some()
  }

  /// Number of sessions held, expired ones not yet swept included.
  pub fn len(&self) -> usize {
    self.by_digest.read().unwrap_or_else(PoisonError::into_inner).len()
  }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

fn digest(token: &str) -> String { hex::encode(Sha256::digest(token.as_bytes())) }

// ─── Admin credentials ────────────────────────────────────────────────────────

/// The administrator account: the configured email plus an argon2 PHC hash.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
  pub policy:        AdminPolicy,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

impl AdminCredentials {
  /// Check an email/password sign-in. The email must match exactly.
  pub fn verify(&self, email: &str, password: &str) -> Result<Identity, ApiError> {
    let invalid = || ApiError::Unauthorized("invalid credentials".into());

    let identity = Identity::credentialed(email);
    if !self.policy.is_admin(&identity) {
      return Err(invalid());
    }

    let parsed_hash = PasswordHash::new(&self.password_hash).map_err(|_| invalid())?;
    Argon2::default()
      .verify_password(password.as_bytes(), &parsed_hash)
      .map_err(|_| invalid())?;

    Ok(identity)
  }
}

// ─── Extractors ───────────────────────────────────────────────────────────────

/// The bearer token of the request, if any.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
}

/// The resolved caller, or `None` when no live session was presented.
pub struct Caller(pub Option<Actor>);

/// A caller with a live session; rejects with 401 `not signed in` otherwise.
pub struct SignedIn(pub Actor);

impl<S> FromRequestParts<ApiState<S>> for Caller
where
  S: ReviewStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(Caller(
      bearer_token(&parts.headers).and_then(|t| state.sessions.resolve(t)),
    ))
  }
}

impl<S> FromRequestParts<ApiState<S>> for SignedIn
where
  S: ReviewStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    let Caller(actor) = Caller::from_request_parts(parts, state).await?;
    actor
      .map(SignedIn)
      .ok_or_else(|| ApiError::Unauthorized("not signed in".into()))
  }
}

// ─── Handlers ─────────────────────────────────────────────────────────────────

/// Response body of both sign-in endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGrant {
  pub token: String,
  pub actor: Actor,
}

/// `POST /session/anonymous`
pub async fn anonymous<S>(State(state): State<ApiState<S>>) -> impl IntoResponse
where
  S: ReviewStore + 'static,
{
  let actor = state.admin.policy.actor(Identity::anonymous());
  let token = state.sessions.issue(actor.clone());
  tracing::info!(user_id = %actor.id(), "anonymous session issued");
  (StatusCode::CREATED, Json(SessionGrant { token, actor }))
}

#[derive(Debug, Deserialize)]
pub struct AdminSignIn {
  pub email:    String,
  pub password: String,
}

/// `POST /session/admin`
pub async fn admin<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<AdminSignIn>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReviewStore + 'static,
{
  let identity = state
    .admin
    .verify(&body.email, &body.password)
    .inspect_err(|_| tracing::warn!(email = %body.email, "admin sign-in rejected"))?;

  let actor = state.admin.policy.actor(identity);
  let token = state.sessions.issue(actor.clone());
  tracing::info!(user_id = %actor.id(), "admin signed in");
  Ok((StatusCode::CREATED, Json(SessionGrant { token, actor })))
}

/// `GET /session`
pub async fn current(SignedIn(actor): SignedIn) -> Json<Actor> { Json(actor) }

/// `DELETE /session`
pub async fn sign_out<S>(
  State(state): State<ApiState<S>>,
  headers: HeaderMap,
) -> Result<StatusCode, ApiError>
where
  S: ReviewStore + 'static,
{
  let token =
    bearer_token(&headers).ok_or_else(|| ApiError::Unauthorized("not signed in".into()))?;
  if state.sessions.revoke(token) {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::Unauthorized("not signed in".into()))
  }
}
