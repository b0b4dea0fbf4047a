//! The like/dislike toggle engine.
//!
//! Pure state transitions over a review's two vote sets. Nothing here writes
//! anywhere; callers apply the returned [`VoteChange`] and persist it.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::review::Review;

/// The vote a caller asks for.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VoteKind {
  Like,
  Dislike,
}

/// Where one identity currently stands on one review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteState {
  #[default]
  None,
  Liked,
  Disliked,
}

impl VoteState {
  pub fn kind(self) -> Option<VoteKind> {
    match self {
      Self::None => None,
      Self::Liked => Some(VoteKind::Like),
      Self::Disliked => Some(VoteKind::Dislike),
    }
  }
}

/// The next value of both vote sets after a toggle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteChange {
  pub liked_by:    BTreeSet<String>,
  pub disliked_by: BTreeSet<String>,
  /// The voter's state after the change.
  pub outcome:     VoteState,
}

impl VoteChange {
  pub fn apply(self, review: &mut Review) {
    review.liked_by = self.liked_by;
    review.disliked_by = self.disliked_by;
  }
}

/// Current vote state of `voter`.
///
/// Sets that violate disjointness are reported as `Liked`; the store boundary
/// refuses to persist such records in the first place.
pub fn vote_state(
  liked_by: &BTreeSet<String>,
  disliked_by: &BTreeSet<String>,
  voter: &str,
) -> VoteState {
  if liked_by.contains(voter) {
    VoteState::Liked
  } else if disliked_by.contains(voter) {
    VoteState::Disliked
  } else {
    VoteState::None
  }
}

/// Compute the sets that result from `voter` requesting `kind`.
///
/// Requesting the vote the voter already holds withdraws it and leaves the
/// other set alone. Otherwise the voter joins the requested set and leaves
/// the opposite one in the same transition.
pub fn toggle(
  liked_by: &BTreeSet<String>,
  disliked_by: &BTreeSet<String>,
  voter: &str,
  kind: VoteKind,
) -> VoteChange {
  let mut liked = liked_by.clone();
  let mut disliked = disliked_by.clone();

  let (target, opposite, joined) = match kind {
    VoteKind::Like => (&mut liked, &mut disliked, VoteState::Liked),
    VoteKind::Dislike => (&mut disliked, &mut liked, VoteState::Disliked),
  };

  let outcome = if target.remove(voter) {
    VoteState::None
  } else {
    target.insert(voter.to_owned());
    opposite.remove(voter);
    joined
  };

  VoteChange { liked_by: liked, disliked_by: disliked, outcome }
}

/// [`toggle`] against a review's current sets.
pub fn toggle_review(review: &Review, voter: &str, kind: VoteKind) -> VoteChange {
  toggle(&review.liked_by, &review.disliked_by, voter, kind)
}
