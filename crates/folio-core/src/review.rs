//! Review types, the single entity of the testimonials board.
//!
//! A review is created from a validated [`ReviewDraft`]; the store assigns
//! `id` and `created_at`. Afterwards only `comment`, `rating` and the two vote
//! sets ever change.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  validation::{ValidationErrors, char_len},
};

pub const MIN_AUTHOR_NAME_LEN: usize = 2;
pub const MIN_COMMENT_LEN: usize = 10;
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

// ─── Review ──────────────────────────────────────────────────────────────────

/// A persisted review as stored and served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
  pub id:          Uuid,
  pub author_name: String,
  pub comment:     String,
  pub rating:      u8,
  /// Server-assigned; never changes after creation.
  pub created_at:  DateTime<Utc>,
  /// Identity id of the creator; never changes after creation.
  pub user_id:     String,
  #[serde(default)]
  pub liked_by:    BTreeSet<String>,
  #[serde(default)]
  pub disliked_by: BTreeSet<String>,
}

impl Review {
  pub fn likes(&self) -> usize { self.liked_by.len() }

  pub fn dislikes(&self) -> usize { self.disliked_by.len() }

  /// Full record validation, run at the store boundary before every write.
  pub fn check_invariants(&self) -> Result<()> {
    let mut errors = ValidationErrors::new();
    check_author_name(&self.author_name, &mut errors);
    check_comment(&self.comment, &mut errors);
    check_rating(i64::from(self.rating), &mut errors);
    if self.user_id.is_empty() {
      errors.add("userId", "Creator identity is required.");
    }
    if !errors.is_empty() {
      return Err(Error::Invalid(errors));
    }

    if let Some(both) = self.liked_by.intersection(&self.disliked_by).next() {
      return Err(Error::VoteSetsOverlap {
        review_id: self.id,
        identity:  both.clone(),
      });
    }
    Ok(())
  }

  /// Merge a validated partial update into this record.
  pub fn apply_patch(&mut self, patch: &ReviewPatch) {
    if let Some(comment) = &patch.comment {
      self.comment = comment.clone();
    }
    if let Some(rating) = patch.rating {
      self.rating = rating;
    }
  }
}

// ─── Draft (create) ──────────────────────────────────────────────────────────

/// Unvalidated review form input, exactly as submitted.
///
/// `rating` is wide so that out-of-range input survives deserialisation and
/// is reported as a field error instead of a parse failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewDraft {
  #[serde(default)]
  pub author_name: String,
  #[serde(default)]
  pub comment:     String,
  #[serde(default)]
  pub rating:      i64,
}

impl ReviewDraft {
  /// Validate the form and attach the creator identity.
  pub fn validate(self, user_id: impl Into<String>) -> Result<NewReview, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    check_author_name(&self.author_name, &mut errors);
    check_comment(&self.comment, &mut errors);
    check_rating(self.rating, &mut errors);
    if !errors.is_empty() {
      return Err(errors);
    }

    Ok(NewReview {
      author_name: self.author_name,
      comment:     self.comment,
      // In range, checked above.
      rating:      self.rating as u8,
      user_id:     user_id.into(),
    })
  }
}

/// Input to [`crate::store::ReviewStore::create`].
/// `id` and `created_at` are always set by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewReview {
  pub author_name: String,
  pub comment:     String,
  pub rating:      u8,
  pub user_id:     String,
}

// ─── Edit (update) ───────────────────────────────────────────────────────────

/// Unvalidated edit input. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewEdit {
  pub comment: Option<String>,
  pub rating:  Option<i64>,
}

impl ReviewEdit {
  pub fn validate(self) -> Result<ReviewPatch, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(comment) = &self.comment {
      check_comment(comment, &mut errors);
    }
    if let Some(rating) = self.rating {
      check_rating(rating, &mut errors);
    }
    errors.into_result(ReviewPatch {
      comment: self.comment,
      rating:  self.rating.map(|r| r as u8),
    })
  }
}

/// A validated partial update for [`crate::store::ReviewStore::update`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewPatch {
  pub comment: Option<String>,
  pub rating:  Option<u8>,
}

impl ReviewPatch {
  pub fn is_empty(&self) -> bool { self.comment.is_none() && self.rating.is_none() }
}

// ─── Field rules ─────────────────────────────────────────────────────────────

fn check_author_name(name: &str, errors: &mut ValidationErrors) {
  if char_len(name) < MIN_AUTHOR_NAME_LEN {
    errors.add("authorName", "Name must be at least 2 characters.");
  }
}

fn check_comment(comment: &str, errors: &mut ValidationErrors) {
  if char_len(comment) < MIN_COMMENT_LEN {
    errors.add("comment", "Comment must be at least 10 characters.");
  }
}

fn check_rating(rating: i64, errors: &mut ValidationErrors) {
  if rating < i64::from(MIN_RATING) {
    errors.add("rating", "Please provide a rating.");
  } else if rating > i64::from(MAX_RATING) {
    errors.add("rating", "Rating must be at most 5.");
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn draft(comment: &str, rating: i64) -> ReviewDraft {
    ReviewDraft {
      author_name: "Ada".into(),
      comment: comment.into(),
      rating,
    }
  }

  #[test]
  fn comment_of_nine_chars_is_rejected() {
    let err = draft("123456789", 3).validate("u1").unwrap_err();
    assert_eq!(err.field("comment").len(), 1);
    assert!(err.field("rating").is_empty());
  }

  #[test]
  fn comment_of_ten_chars_is_accepted() {
    let new = draft("1234567890", 3).validate("u1").unwrap();
    assert_eq!(new.comment, "1234567890");
    assert_eq!(new.user_id, "u1");
  }

  #[test]
  fn comment_length_counts_characters_not_bytes() {
    // Nine two-byte characters.
    assert!(draft("ééééééééé", 3).validate("u1").is_err());
    assert!(draft("éééééééééé", 3).validate("u1").is_ok());
  }

  #[test]
  fn rating_bounds() {
    for bad in [0, 6, -1, 300] {
      let err = draft("Great work on this project!", bad)
        .validate("u1")
        .unwrap_err();
      assert!(!err.field("rating").is_empty(), "rating {bad} accepted");
    }
    for good in [1, 5] {
      let new = draft("Great work on this project!", good)
        .validate("u1")
        .unwrap();
      assert_eq!(i64::from(new.rating), good);
    }
  }

  #[test]
  fn short_author_name_is_reported_alongside_other_fields() {
    let err = ReviewDraft {
      author_name: "A".into(),
      comment:     "short".into(),
      rating:      0,
    }
    .validate("u1")
    .unwrap_err();
    let fields: Vec<_> = err.fields().map(|(f, _)| f).collect();
    assert_eq!(fields, ["authorName", "comment", "rating"]);
  }

  #[test]
  fn edit_validates_only_present_fields() {
    let patch = ReviewEdit { comment: None, rating: Some(4) }.validate().unwrap();
    assert_eq!(patch, ReviewPatch { comment: None, rating: Some(4) });

    let err = ReviewEdit { comment: Some("too short".into()), rating: None }
      .validate()
      .unwrap_err();
    assert_eq!(err.field("comment").len(), 1);
  }

  #[test]
  fn invariants_reject_overlapping_vote_sets() {
    let mut review = Review {
      id:          Uuid::new_v4(),
      author_name: "Ada".into(),
      comment:     "Great work on this project!".into(),
      rating:      5,
      created_at:  Utc::now(),
      user_id:     "u1".into(),
      liked_by:    BTreeSet::new(),
      disliked_by: BTreeSet::new(),
    };
    assert!(review.check_invariants().is_ok());

    review.liked_by.insert("u2".into());
    review.disliked_by.insert("u2".into());
    assert!(matches!(
      review.check_invariants(),
      Err(Error::VoteSetsOverlap { identity, .. }) if identity == "u2"
    ));
  }

  #[test]
  fn wire_names_are_camel_case() {
    let review = Review {
      id:          Uuid::nil(),
      author_name: "Ada".into(),
      comment:     "Great work on this project!".into(),
      rating:      5,
      created_at:  Utc::now(),
      user_id:     "u1".into(),
      liked_by:    BTreeSet::from(["u2".to_string()]),
      disliked_by: BTreeSet::new(),
    };
    let json = serde_json::to_value(&review).unwrap();
    for key in ["authorName", "createdAt", "userId", "likedBy", "dislikedBy"] {
      assert!(json.get(key).is_some(), "missing {key}");
    }
  }
}
