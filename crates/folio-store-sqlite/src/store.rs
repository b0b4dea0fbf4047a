//! [`SqliteStore`]: the SQLite implementation of [`ReviewStore`].

use std::{
  path::Path,
  sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
  },
};

use chrono::{SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use folio_core::{
  review::{NewReview, Review, ReviewPatch},
  store::{ReviewStore, Snapshot, SnapshotFeed, Subscription},
  vote::{VoteKind, toggle_review},
};

use crate::{
  Result,
  encode::{EncodedReview, RawReview, encode_uuid},
  schema::{REVIEW_COLUMNS, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A review store backed by a single SQLite file.
///
/// Cloning is cheap; the connection handle and the snapshot feed are
/// reference-counted, and all clones publish into the same feed.
#[derive(Clone)]
pub struct SqliteStore {
  conn:     tokio_rusqlite::Connection,
  feed:     SnapshotFeed,
  /// Random per open, so revisions from an earlier run never collide with
  /// this one's.
  epoch:    u64,
  /// Bumped on the connection thread inside each write closure, so revision
  /// order matches commit order.
  revision: Arc<AtomicU64>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let rows = conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(select_all(conn)?)
      })
      .await?;

    let reviews = decode_all(rows)?;
    let (epoch, _) = Uuid::new_v4().as_u64_pair();
    tracing::debug!(count = reviews.len(), epoch, "review store opened");

    Ok(Self {
      conn,
      feed: SnapshotFeed::new(Snapshot { epoch, revision: 1, reviews }),
      epoch,
      revision: Arc::new(AtomicU64::new(1)),
    })
  }

  /// Shut the connection down. Later calls on any clone fail, and
  /// subscribers are released once the last clone is dropped.
  pub async fn close(&self) -> Result<()> {
    self.conn.clone().close().await?;
    Ok(())
  }

  /// Run `write` in a transaction, then re-read the collection and publish
  /// it. Nothing is published if `write` fails, or if `changed` says the
  /// outcome left the table as it was; the transaction is rolled back.
  async fn commit<T, F>(&self, write: F, changed: fn(&T) -> bool) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Transaction<'_>) -> Result<T> + Send + 'static,
  {
    let revision = Arc::clone(&self.revision);

    let (outcome, published) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let value = match write(&tx) {
          Ok(v) if changed(&v) => v,
          other => return Ok((other, None)),
        };
        let rows = select_all(&tx)?;
        tx.commit()?;
        let rev = revision.fetch_add(1, Ordering::SeqCst) + 1;
        Ok((Ok(value), Some((rev, rows))))
      })
      .await?;

    let value = outcome?;
    if let Some((rev, rows)) = published {
      let reviews = decode_all(rows)?;
      self.feed.publish(Snapshot { epoch: self.epoch, revision: rev, reviews });
    }
    Ok(value)
  }
}

// ─── Row helpers (run on the connection thread) ──────────────────────────────

fn select_all(conn: &rusqlite::Connection) -> rusqlite::Result<Vec<RawReview>> {
  let mut stmt = conn.prepare(&format!(
    "SELECT {REVIEW_COLUMNS} FROM reviews ORDER BY created_at DESC, rowid DESC"
  ))?;
  stmt
    .query_map([], RawReview::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()
}

fn select_one(conn: &rusqlite::Connection, id: &str) -> rusqlite::Result<Option<RawReview>> {
  conn
    .query_row(
      &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = ?1"),
      rusqlite::params![id],
      RawReview::from_row,
    )
    .optional()
}

/// Load one review, let `change` mutate it, validate, and write it back.
fn modify_one(
  tx: &rusqlite::Transaction<'_>,
  id: Uuid,
  change: impl FnOnce(&mut Review),
) -> Result<Option<Review>> {
  let Some(raw) = select_one(tx, &encode_uuid(id))? else {
    return Ok(None);
  };
  let mut review = raw.into_review()?;
  change(&mut review);
  review.check_invariants()?;

  let row = EncodedReview::new(&review)?;
  tx.execute(
    "UPDATE reviews SET comment = ?2, rating = ?3, liked_by = ?4, disliked_by = ?5
     WHERE id = ?1",
    rusqlite::params![row.id, row.comment, row.rating, row.liked_by, row.disliked_by],
  )?;
  Ok(Some(review))
}

fn decode_all(rows: Vec<RawReview>) -> Result<Vec<Review>> {
  rows.into_iter().map(RawReview::into_review).collect()
}

// ─── ReviewStore impl ────────────────────────────────────────────────────────

impl ReviewStore for SqliteStore {
  type Error = crate::Error;

  async fn list(&self) -> Result<Snapshot> {
    // The feed is refreshed after every commit; re-reading would only race it.
    Ok(self.feed.current())
  }

  fn subscribe(&self) -> Subscription { self.feed.subscribe() }

  async fn get(&self, id: Uuid) -> Result<Option<Review>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(select_one(conn, &id_str)?))
      .await?;
    raw.map(RawReview::into_review).transpose()
  }

  async fn create(&self, input: NewReview) -> Result<Review> {
    let review = Review {
      id:          Uuid::new_v4(),
      author_name: input.author_name,
      comment:     input.comment,
      rating:      input.rating,
      // Truncated to the stored precision so the returned value round-trips.
      created_at:  Utc::now().trunc_subsecs(6),
      user_id:     input.user_id,
      liked_by:    Default::default(),
      disliked_by: Default::default(),
    };
    review.check_invariants()?;

    let row = EncodedReview::new(&review)?;
    self
      .commit(
        move |tx| {
          tx.execute(
            &format!(
              "INSERT INTO reviews ({REVIEW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"
            ),
            rusqlite::params![
              row.id,
              row.author_name,
              row.comment,
              row.rating,
              row.created_at,
              row.user_id,
              row.liked_by,
              row.disliked_by,
            ],
          )?;
          Ok(())
        },
        |_| true,
      )
      .await?;

    tracing::info!(review_id = %review.id, user_id = %review.user_id, "review created");
    Ok(review)
  }

  async fn update(&self, id: Uuid, patch: ReviewPatch) -> Result<Option<Review>> {
    let updated = self
      .commit(move |tx| modify_one(tx, id, |review| review.apply_patch(&patch)), Option::is_some)
      .await?;
    if updated.is_some() {
      tracing::info!(review_id = %id, "review updated");
    }
    Ok(updated)
  }

  async fn vote<'a>(&'a self, id: Uuid, voter: &'a str, kind: VoteKind) -> Result<Option<Review>> {
    let voter = voter.to_owned();
    self
      .commit(
        move |tx| {
          modify_one(tx, id, |review| {
            let change = toggle_review(review, &voter, kind);
            tracing::debug!(review_id = %id, voter = %voter, ?kind, outcome = ?change.outcome, "vote toggled");
            change.apply(review);
          })
        },
        Option::is_some,
      )
      .await
  }

  async fn delete(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let removed = self
      .commit(
        move |tx| Ok(tx.execute("DELETE FROM reviews WHERE id = ?1", rusqlite::params![id_str])? > 0),
        |removed| *removed,
      )
      .await?;
    if removed {
      tracing::info!(review_id = %id, "review deleted");
    }
    Ok(removed)
  }
}
