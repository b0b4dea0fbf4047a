//! `POST /contact`: validate a contact form message and hand it to a
//! [`Mailer`].

use std::{convert::Infallible, sync::Arc};

use axum::{Json, extract::State, http::StatusCode};
use folio_core::contact::{ContactMessage, Mailer};

use crate::error::ApiError;

/// `POST /contact`: 202 once the mailer accepted the message.
pub async fn submit<M>(
  State(mailer): State<Arc<M>>,
  Json(message): Json<ContactMessage>,
) -> Result<StatusCode, ApiError>
where
  M: Mailer + 'static,
{
  let message = message.validate()?;
  mailer
    .send(&message)
    .await
    .map_err(|e| ApiError::Mail(Box::new(e)))?;
  Ok(StatusCode::ACCEPTED)
}

/// A [`Mailer`] that only records the message in the log. Stands in for a
/// transactional email provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
  type Error = Infallible;

  async fn send<'a>(&'a self, message: &'a ContactMessage) -> Result<(), Infallible> {
    tracing::info!(
      name = %message.name,
      email = %message.email,
      chars = message.message.chars().count(),
      "contact message received"
    );
    Ok(())
  }
}
