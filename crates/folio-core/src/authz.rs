//! The authorization gate for review actions.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{identity::Actor, review::Review};

/// An action a caller may attempt on an existing review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
  Vote,
  Edit,
  Delete,
}

/// Why an action was refused. Always decided before any write is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Denied {
  #[error("not signed in")]
  NotSignedIn,
  #[error("only the author or the administrator may change this review")]
  NotOwner,
}

/// Creator or administrator.
pub fn can_modify(review: &Review, actor: &Actor) -> bool {
  actor.is_admin || actor.identity.id == review.user_id
}

/// Any resolved identity may vote.
pub fn can_vote(actor: Option<&Actor>) -> bool { actor.is_some() }

/// Gate `action` on `review` for the (possibly unresolved) caller.
pub fn authorize(
  action: Action,
  review: &Review,
  actor: Option<&Actor>,
) -> Result<(), Denied> {
  let actor = actor.ok_or(Denied::NotSignedIn)?;
  match action {
    Action::Vote => Ok(()),
    Action::Edit | Action::Delete if can_modify(review, actor) => Ok(()),
    Action::Edit | Action::Delete => Err(Denied::NotOwner),
  }
}
