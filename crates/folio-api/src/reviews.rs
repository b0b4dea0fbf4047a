//! Handlers for `/reviews` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/reviews` | Optional `?after=<revision>&epoch=<epoch>&wait=<secs>` long-poll |
//! | `POST`   | `/reviews` | Body: [`ReviewDraft`]; 201 + stored review; 422 on bad input |
//! | `GET`    | `/reviews/:id` | 404 if not found |
//! | `PATCH`  | `/reviews/:id` | Body: [`ReviewEdit`]; author or admin only |
//! | `DELETE` | `/reviews/:id` | Author or admin only; 204 |
//! | `POST`   | `/reviews/:id/vote` | Body: `{"kind":"like"\|"dislike"}` |
//!
//! Every write requires a session. Authorization is decided before the store
//! is touched.

use std::time::Duration;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use folio_core::{
  authz::{Action, authorize},
  review::{Review, ReviewDraft, ReviewEdit},
  store::{ReviewStore, Snapshot},
  vote::VoteKind,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, error::ApiError, session::SignedIn};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// The revision the caller already has. When the store is still at that
  /// revision the request waits for the next one.
  pub after: Option<u64>,
  /// The epoch `after` belongs to. A different epoch means the caller's
  /// revision came from an earlier run of the store and is answered at once.
  pub epoch: Option<u64>,
  /// Seconds to wait; capped by the server's configured maximum.
  pub wait:  Option<u64>,
}

/// `GET /reviews[?after=<revision>&epoch=<epoch>&wait=<secs>]`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Snapshot>, ApiError>
where
  S: ReviewStore + 'static,
{
  let Some(after) = params.after else {
    return Ok(Json(state.store.list().await.map_err(ApiError::store)?));
  };

  // Subscribe before reading so a write in between is not missed. The
  // subscription is released when this handler returns, on every path.
  let mut sub = state.store.subscribe();
  let current = sub.current();
  let wait = Duration::from_secs(params.wait.unwrap_or(0)).min(state.max_poll);
  let stale_epoch = params.epoch.is_some_and(|e| e != current.epoch);
  if stale_epoch || current.revision > after || wait.is_zero() {
    return Ok(Json(current));
  }

  let next = tokio::time::timeout(wait, sub.changed())
    .await
    .ok()
    .flatten()
    .unwrap_or(current);
  Ok(Json(next))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /reviews/:id`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Review>, ApiError>
where
  S: ReviewStore + 'static,
{
  Ok(Json(load(&state, id).await?))
}

async fn load<S: ReviewStore>(state: &ApiState<S>, id: Uuid) -> Result<Review, ApiError> {
  state
    .store
    .get(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("review {id} not found")))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /reviews`: the caller becomes the review's author.
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  SignedIn(actor): SignedIn,
  Json(draft): Json<ReviewDraft>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReviewStore + 'static,
{
  let input = draft.validate(actor.id())?;
  let review = state.store.create(input).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(review)))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PATCH /reviews/:id`: body: `{"comment":"…","rating":4}`, both optional.
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  SignedIn(actor): SignedIn,
  Path(id): Path<Uuid>,
  Json(edit): Json<ReviewEdit>,
) -> Result<Json<Review>, ApiError>
where
  S: ReviewStore + 'static,
{
  let review = load(&state, id).await?;
  authorize(Action::Edit, &review, Some(&actor)).inspect_err(|denied| {
    tracing::warn!(review_id = %id, user_id = %actor.id(), %denied, "edit denied");
  })?;

  let patch = edit.validate()?;
  if patch.is_empty() {
    return Ok(Json(review));
  }

  let updated = state
    .store
    .update(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("review {id} not found")))?;
  Ok(Json(updated))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /reviews/:id`
pub async fn remove<S>(
  State(state): State<ApiState<S>>,
  SignedIn(actor): SignedIn,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: ReviewStore + 'static,
{
  let review = load(&state, id).await?;
  authorize(Action::Delete, &review, Some(&actor)).inspect_err(|denied| {
    tracing::warn!(review_id = %id, user_id = %actor.id(), %denied, "delete denied");
  })?;

  if state.store.delete(id).await.map_err(ApiError::store)? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("review {id} not found")))
  }
}

// ─── Vote ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VoteBody {
  pub kind: VoteKind,
}

/// `POST /reviews/:id/vote`: toggles the caller's own vote.
pub async fn vote<S>(
  State(state): State<ApiState<S>>,
  SignedIn(actor): SignedIn,
  Path(id): Path<Uuid>,
  Json(body): Json<VoteBody>,
) -> Result<Json<Review>, ApiError>
where
  S: ReviewStore + 'static,
{
  let review = state
    .store
    .vote(id, actor.id(), body.kind)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("review {id} not found")))?;
  Ok(Json(review))
}
