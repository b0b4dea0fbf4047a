//! SQL schema for the Folio SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS reviews (
    id           TEXT PRIMARY KEY,
    author_name  TEXT NOT NULL,
    comment      TEXT NOT NULL,
    rating       INTEGER NOT NULL CHECK (rating BETWEEN 1 AND 5),
    created_at   TEXT NOT NULL,              -- RFC 3339 UTC, microseconds; server-assigned
    user_id      TEXT NOT NULL,              -- creator identity; never updated
    liked_by     TEXT NOT NULL DEFAULT '[]', -- JSON array of identity ids
    disliked_by  TEXT NOT NULL DEFAULT '[]'  -- JSON array, disjoint from liked_by
);

CREATE INDEX IF NOT EXISTS reviews_created_idx ON reviews(created_at);

PRAGMA user_version = 1;
";

/// Column list shared by every `SELECT` that decodes into a review.
pub const REVIEW_COLUMNS: &str =
  "id, author_name, comment, rating, created_at, user_id, liked_by, disliked_by";
