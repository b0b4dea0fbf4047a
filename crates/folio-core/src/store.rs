//! The `ReviewStore` trait and the live snapshot feed.
//!
//! The trait is implemented by storage backends (e.g. `folio-store-sqlite`).
//! Higher layers (`folio-api`) depend on this abstraction, not on any
//! concrete backend.

use std::{future::Future, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::{
  review::{NewReview, Review, ReviewPatch},
  vote::VoteKind,
};

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// The whole collection at one store revision, newest review first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
  /// Chosen once per opened store. Revisions are only comparable within one
  /// epoch; a restarted server starts a new one.
  #[serde(default)]
  pub epoch:    u64,
  /// Increases with every committed write. `0` means "nothing loaded yet".
  pub revision: u64,
  pub reviews:  Vec<Review>,
}

impl Snapshot {
  /// Where this snapshot sits in the store's history.
  pub fn position(&self) -> (u64, u64) { (self.epoch, self.revision) }

  pub fn is_empty(&self) -> bool { self.reviews.is_empty() }

  pub fn len(&self) -> usize { self.reviews.len() }

  /// Restartable: every call starts again from the newest review.
  pub fn iter(&self) -> std::slice::Iter<'_, Review> { self.reviews.iter() }

  pub fn get(&self, id: Uuid) -> Option<&Review> { self.reviews.iter().find(|r| r.id == id) }
}

impl<'a> IntoIterator for &'a Snapshot {
  type Item = &'a Review;
  type IntoIter = std::slice::Iter<'a, Review>;

  fn into_iter(self) -> Self::IntoIter { self.iter() }
}

// ─── Feed ────────────────────────────────────────────────────────────────────

/// Publisher side of the live snapshot stream. Backends own one and publish
/// after each committed write.
///
/// Cloning is cheap; clones publish into the same stream.
#[derive(Debug, Clone)]
pub struct SnapshotFeed {
  tx: Arc<watch::Sender<Snapshot>>,
}

impl SnapshotFeed {
  pub fn new(initial: Snapshot) -> Self {
    let (tx, _rx) = watch::channel(initial);
    Self { tx: Arc::new(tx) }
  }

  /// Replace the current snapshot if `next` is newer. Writers may finish in
  /// any order; an older read never overwrites a newer one.
  ///
  /// Returns whether subscribers were notified.
  pub fn publish(&self, next: Snapshot) -> bool {
    self.tx.send_if_modified(|current| {
      if next.revision > current.revision {
        *current = next;
        true
      } else {
        false
      }
    })
  }

  pub fn current(&self) -> Snapshot { self.tx.borrow().clone() }

  pub fn subscribe(&self) -> Subscription {
    Subscription { rx: self.tx.subscribe() }
  }

  pub fn subscriber_count(&self) -> usize { self.tx.receiver_count() }
}

/// A live listener on the review collection.
///
/// Dropping the handle unsubscribes.
#[derive(Debug)]
pub struct Subscription {
  rx: watch::Receiver<Snapshot>,
}

impl Subscription {
  /// The latest published snapshot.
  pub fn current(&mut self) -> Snapshot { self.rx.borrow_and_update().clone() }

  /// Wait for the next snapshot. `None` once the store has shut down.
  pub async fn changed(&mut self) -> Option<Snapshot> {
    self.rx.changed().await.ok()?;
    Some(self.rx.borrow_and_update().clone())
  }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a review store backend.
///
/// Every write validates the resulting record with
/// [`Review::check_invariants`] before committing and publishes a new
/// [`Snapshot`] after it.
///
/// Concurrent updates of the same review are not versioned: the last write
/// wins.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ReviewStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The current snapshot, ordered by `created_at` descending.
  fn list(&self) -> impl Future<Output = Result<Snapshot, Self::Error>> + Send + '_;

  /// Listen for new snapshots.
  fn subscribe(&self) -> Subscription;

  /// Retrieve a review by id. Returns `None` if not found.
  fn get(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Review>, Self::Error>> + Send + '_;

  /// Persist a new review. `id` and `created_at` are assigned by the store.
  fn create(
    &self,
    input: NewReview,
  ) -> impl Future<Output = Result<Review, Self::Error>> + Send + '_;

  /// Merge `patch` into an existing review. `None` if it does not exist.
  fn update(
    &self,
    id: Uuid,
    patch: ReviewPatch,
  ) -> impl Future<Output = Result<Option<Review>, Self::Error>> + Send + '_;

  /// Toggle `voter`'s vote on a review in one transaction. `None` if the
  /// review does not exist.
  fn vote<'a>(
    &'a self,
    id: Uuid,
    voter: &'a str,
    kind: VoteKind,
  ) -> impl Future<Output = Result<Option<Review>, Self::Error>> + Send + 'a;

  /// Remove a review. Returns whether anything was removed.
  fn delete(&self, id: Uuid) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
