//! Contact form messages and the mail delivery seam.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::validation::{ValidationErrors, char_len};

/// A message submitted through the contact form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactMessage {
  #[serde(default)]
  pub name:    String,
  #[serde(default)]
  pub email:   String,
  #[serde(default)]
  pub message: String,
}

impl ContactMessage {
  pub fn validate(self) -> Result<Self, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if char_len(&self.name) < 2 {
      errors.add("name", "Name must be at least 2 characters.");
    }
    if !is_plausible_email(&self.email) {
      errors.add("email", "Please enter a valid email address.");
    }
    if char_len(&self.message) < 10 {
      errors.add("message", "Message must be at least 10 characters.");
    }
    errors.into_result(self)
  }
}

/// Syntactic check only: one `@`, a non-empty local part, and a dotted
/// domain without whitespace.
fn is_plausible_email(s: &str) -> bool {
  if s.chars().any(char::is_whitespace) {
    return false;
  }
  let Some((local, domain)) = s.split_once('@') else {
    return false;
  };
  !local.is_empty()
    && !domain.contains('@')
    && domain
      .split_once('.')
      .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}

/// Delivers validated contact messages, e.g. via a transactional email API.
pub trait Mailer: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn send<'a>(
    &'a self,
    message: &'a ContactMessage,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
