//! Error types for `folio-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid review: {0}")]
  Invalid(#[from] ValidationErrors),

  /// A record reached the store boundary with an identity in both vote sets.
  #[error("review {review_id}: {identity:?} is in both likedBy and dislikedBy")]
  VoteSetsOverlap { review_id: Uuid, identity: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
