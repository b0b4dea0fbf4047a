//! Caller identities and the administrator policy.
//!
//! Identities are not stored entities of the board: they are attached to the
//! caller by whichever layer resolved them (the session registry on the
//! server, the sign-in flow on the client).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prefix of the stable id given to the administrator identity.
pub const ADMIN_ID_PREFIX: &str = "admin:";

/// An established caller identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
  /// Opaque id; recorded as `userId` on created reviews and used as the key
  /// in vote sets.
  pub id:    String,
  /// Sign-in email. `None` for anonymous session identities.
  pub email: Option<String>,
}

impl Identity {
  /// A fresh anonymous session identity.
  pub fn anonymous() -> Self {
    Self { id: Uuid::new_v4().to_string(), email: None }
  }

  /// The identity of a credentialed sign-in with `email`.
  pub fn credentialed(email: impl Into<String>) -> Self {
    let email = email.into();
    Self { id: format!("{ADMIN_ID_PREFIX}{email}"), email: Some(email) }
  }

  pub fn is_anonymous(&self) -> bool { self.email.is_none() }
}

/// Recognises the single administrator by exact email match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPolicy {
  pub admin_email: String,
}

impl AdminPolicy {
  pub fn new(admin_email: impl Into<String>) -> Self {
    Self { admin_email: admin_email.into() }
  }

  /// Case-sensitive comparison; anonymous identities are never admin.
  pub fn is_admin(&self, identity: &Identity) -> bool {
    !self.admin_email.is_empty()
      && identity.email.as_deref() == Some(self.admin_email.as_str())
  }

  /// Bind `identity` to its admin status.
  pub fn actor(&self, identity: Identity) -> Actor {
    let is_admin = self.is_admin(&identity);
    Actor { identity, is_admin }
  }
}

/// A resolved caller: the identity plus its admin status at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
  pub identity: Identity,
  pub is_admin: bool,
}

impl Actor {
  pub fn id(&self) -> &str { &self.identity.id }
}

/// Client-side resolution progress.
///
/// Nothing that needs an identity may act on `Pending` or `Failed`, and admin
/// status is only ever read from `Resolved`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdentityState {
  #[default]
  Pending,
  Resolved(Actor),
  Failed(String),
}

impl IdentityState {
  pub fn actor(&self) -> Option<&Actor> {
    match self {
      Self::Resolved(actor) => Some(actor),
      _ => None,
    }
  }

  pub fn is_pending(&self) -> bool { matches!(self, Self::Pending) }

  /// `false` until resolution has completed with an admin actor.
  pub fn is_admin(&self) -> bool { self.actor().is_some_and(|a| a.is_admin) }
}
