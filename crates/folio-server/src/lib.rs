//! HTTP front end for the Folio review board.
//!
//! Wires a [`ReviewStore`] and a [`Mailer`] into the JSON API under `/api`
//! and adds a liveness probe.

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{Router, routing::get};
use folio_api::{AdminCredentials, ApiState, Sessions, api_router};
use folio_core::{contact::Mailer, identity::AdminPolicy, store::ReviewStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `FOLIO_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                String,
  #[serde(default = "default_port")]
  pub port:                u16,
  pub store_path:          PathBuf,
  /// The one account that may edit or delete any review. Empty disables it.
  #[serde(default)]
  pub admin_email:         String,
  /// argon2 PHC string; see `folio-server --hash-password`.
  #[serde(default)]
  pub admin_password_hash: String,
  #[serde(default = "default_max_poll_secs")]
  pub max_poll_secs:       u64,
  /// Sessions unused for this many seconds expire.
  #[serde(default = "default_session_idle_secs")]
  pub session_idle_secs:   u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_max_poll_secs() -> u64 { 30 }

fn default_session_idle_secs() -> u64 { folio_api::session::DEFAULT_SESSION_IDLE.as_secs() }

impl ServerConfig {
  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn admin_credentials(&self) -> AdminCredentials {
    AdminCredentials {
      policy:        AdminPolicy::new(self.admin_email.clone()),
      password_hash: self.admin_password_hash.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the complete application router.
pub fn app<S, M>(config: &ServerConfig, store: Arc<S>, mailer: Arc<M>) -> Router
where
  S: ReviewStore + 'static,
  M: Mailer + 'static,
{
  let mut state = ApiState::new(store, config.admin_credentials());
  state.max_poll = Duration::from_secs(config.max_poll_secs);
  state.sessions = Arc::new(Sessions::with_idle_limit(Duration::from_secs(
    config.session_idle_secs,
  )));

  Router::new()
    .route("/healthz", get(healthz))
    .nest("/api", api_router(state, mailer))
    .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str { "ok" }
