//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that text ordering matches time ordering. Vote
//! sets are stored as compact JSON arrays. UUIDs are stored as hyphenated
//! lowercase strings.

use std::collections::BTreeSet;

use chrono::{DateTime, SecondsFormat, Utc};
use folio_core::review::Review;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── Vote sets ───────────────────────────────────────────────────────────────

pub fn encode_set(set: &BTreeSet<String>) -> Result<String> {
  Ok(serde_json::to_string(set)?)
}

pub fn decode_set(s: &str) -> Result<BTreeSet<String>> { Ok(serde_json::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `reviews` row.
pub struct RawReview {
  pub id:          String,
  pub author_name: String,
  pub comment:     String,
  pub rating:      i64,
  pub created_at:  String,
  pub user_id:     String,
  pub liked_by:    String,
  pub disliked_by: String,
}

impl RawReview {
  /// Map a row selected with [`crate::schema::REVIEW_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:          row.get(0)?,
      author_name: row.get(1)?,
      comment:     row.get(2)?,
      rating:      row.get(3)?,
      created_at:  row.get(4)?,
      user_id:     row.get(5)?,
      liked_by:    row.get(6)?,
      disliked_by: row.get(7)?,
    })
  }

  pub fn into_review(self) -> Result<Review> {
    let rating = u8::try_from(self.rating)
      .map_err(|_| Error::Decode(format!("rating out of range: {}", self.rating)))?;

    Ok(Review {
      id: decode_uuid(&self.id)?,
      author_name: self.author_name,
      comment: self.comment,
      rating,
      created_at: decode_dt(&self.created_at)?,
      user_id: self.user_id,
      liked_by: decode_set(&self.liked_by)?,
      disliked_by: decode_set(&self.disliked_by)?,
    })
  }
}

/// Column values for an `INSERT` or full-row `UPDATE`, in
/// [`crate::schema::REVIEW_COLUMNS`] order.
pub struct EncodedReview {
  pub id:          String,
  pub author_name: String,
  pub comment:     String,
  pub rating:      i64,
  pub created_at:  String,
  pub user_id:     String,
  pub liked_by:    String,
  pub disliked_by: String,
}

impl EncodedReview {
  pub fn new(review: &Review) -> Result<Self> {
    Ok(Self {
      id:          encode_uuid(review.id),
      author_name: review.author_name.clone(),
      comment:     review.comment.clone(),
      rating:      i64::from(review.rating),
      created_at:  encode_dt(review.created_at),
      user_id:     review.user_id.clone(),
      liked_by:    encode_set(&review.liked_by)?,
      disliked_by: encode_set(&review.disliked_by)?,
    })
  }
}
