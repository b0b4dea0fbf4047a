//! Review board view orchestration.
//!
//! [`Board`] combines the latest [`Snapshot`], the viewer's identity and the
//! open forms into a [`BoardView`]. It never performs I/O: every intent
//! either yields a [`Command`] for the caller to dispatch or a [`Notice`]
//! saying why nothing was dispatched.

use std::fmt;

use chrono::{DateTime, Utc};
use folio_core::{
  authz::{Action, Denied, authorize},
  identity::{Actor, IdentityState},
  review::{Review, ReviewDraft, ReviewEdit},
  store::Snapshot,
  validation::ValidationErrors,
  vote::{VoteKind, VoteState, vote_state},
};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use uuid::Uuid;

/// Skeleton cards shown until the first snapshot arrives.
pub const SKELETON_CARDS: usize = 3;

pub const EMPTY_MESSAGE: &str = "Be the first to leave a review!";

// ─── View ─────────────────────────────────────────────────────────────────────

/// One review as the viewer sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewCard {
  pub id:          Uuid,
  pub author_name: String,
  pub comment:     String,
  pub rating:      u8,
  pub created_at:  DateTime<Utc>,
  pub likes:       usize,
  pub dislikes:    usize,
  pub my_vote:     VoteState,
  pub can_edit:    bool,
  pub can_delete:  bool,
}

impl ReviewCard {
  fn new(review: &Review, viewer: Option<&Actor>) -> Self {
    Self {
      id:          review.id,
      author_name: review.author_name.clone(),
      comment:     review.comment.clone(),
      rating:      review.rating,
      created_at:  review.created_at,
      likes:       review.likes(),
      dislikes:    review.dislikes(),
      my_vote:     viewer
        .map(|a| vote_state(&review.liked_by, &review.disliked_by, a.id()))
        .unwrap_or_default(),
      can_edit:    authorize(Action::Edit, review, viewer).is_ok(),
      can_delete:  authorize(Action::Delete, review, viewer).is_ok(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardView {
  /// No snapshot yet.
  Loading { placeholders: usize },
  /// The first snapshot arrived and holds no reviews.
  Empty(&'static str),
  /// Newest first, narrowed by the author filter.
  Cards(Vec<ReviewCard>),
}

// ─── Commands and notices ─────────────────────────────────────────────────────

/// A write to hand to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Create(ReviewDraft),
  Update { id: Uuid, edit: ReviewEdit },
  Delete(Uuid),
  Vote { id: Uuid, kind: VoteKind },
}

/// Where a command came from, reported back to [`Board::settle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
  Draft,
  Edit(Uuid),
  Delete(Uuid),
  Vote(Uuid),
}

impl Command {
  pub fn origin(&self) -> Origin {
    match self {
      Self::Create(_) => Origin::Draft,
      Self::Update { id, .. } => Origin::Edit(*id),
      Self::Delete(id) => Origin::Delete(*id),
      Self::Vote { id, .. } => Origin::Vote(*id),
    }
  }
}

/// Transient feedback for the viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
  /// Identity resolution has not finished yet.
  SigningIn,
  SignInFailed(String),
  Denied(Denied),
  Invalid(ValidationErrors),
  /// The same form is already being submitted.
  Busy,
  /// The review is no longer on the board.
  Gone,
  WriteFailed(String),
  FeedFailed(String),
  Info(String),
}

impl Notice {
  pub fn is_error(&self) -> bool { !matches!(self, Self::Info(_) | Self::SigningIn) }
}

impl fmt::Display for Notice {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::SigningIn => f.write_str("Still signing in, try again in a moment."),
      Self::SignInFailed(e) => write!(f, "Sign-in failed: {e}"),
      Self::Denied(d) => write!(f, "Not allowed: {d}."),
      Self::Invalid(errors) => write!(f, "{errors}"),
      Self::Busy => f.write_str("Already submitting."),
      Self::Gone => f.write_str("That review is no longer on the board."),
      Self::WriteFailed(e) => write!(f, "Could not save: {e}"),
      Self::FeedFailed(e) => write!(f, "Live updates interrupted: {e}"),
      Self::Info(s) => f.write_str(s),
    }
  }
}

impl From<Denied> for Notice {
  fn from(denied: Denied) -> Self { Self::Denied(denied) }
}

// ─── Forms ────────────────────────────────────────────────────────────────────

/// Focused input of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Field {
  #[default]
  Author,
  Comment,
  Rating,
}

/// An empty or unparsable rating is sent as 0 and reported as missing.
fn parse_rating(input: &str) -> i64 { input.trim().parse().unwrap_or(0) }

/// The "leave a review" form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DraftForm {
  pub author_name: String,
  pub comment:     String,
  pub rating:      String,
  pub focus:       Field,
  pub errors:      ValidationErrors,
  /// Set from submission until the write settles.
  pub submitting:  bool,
}

impl DraftForm {
  pub fn draft(&self) -> ReviewDraft {
    ReviewDraft {
      author_name: self.author_name.clone(),
      comment:     self.comment.clone(),
      rating:      parse_rating(&self.rating),
    }
  }

  pub fn input(&mut self) -> &mut String {
    match self.focus {
      Field::Author => &mut self.author_name,
      Field::Comment => &mut self.comment,
      Field::Rating => &mut self.rating,
    }
  }

  pub fn next_field(&mut self) {
    self.focus = match self.focus {
      Field::Author => Field::Comment,
      Field::Comment => Field::Rating,
      Field::Rating => Field::Author,
    };
  }
}

/// Inline editor for an existing review. Author name is fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
  pub review_id:  Uuid,
  pub comment:    String,
  pub rating:     String,
  pub focus:      Field,
  pub errors:     ValidationErrors,
  pub submitting: bool,
}

impl EditForm {
  fn new(review: &Review) -> Self {
    Self {
      review_id:  review.id,
      comment:    review.comment.clone(),
      rating:     review.rating.to_string(),
      focus:      Field::Comment,
      errors:     ValidationErrors::new(),
      submitting: false,
    }
  }

  pub fn edit(&self) -> ReviewEdit {
    ReviewEdit {
      comment: Some(self.comment.clone()),
      rating:  Some(parse_rating(&self.rating)),
    }
  }

  pub fn input(&mut self) -> &mut String {
    match self.focus {
      Field::Rating => &mut self.rating,
      Field::Author | Field::Comment => &mut self.comment,
    }
  }

  pub fn next_field(&mut self) {
    self.focus = match self.focus {
      Field::Comment => Field::Rating,
      Field::Author | Field::Rating => Field::Comment,
    };
  }
}

// ─── Board ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct Board {
  snapshot:           Option<Snapshot>,
  identity:           IdentityState,
  filter:             String,
  pub compose:        Option<DraftForm>,
  pub editing:        Option<EditForm>,
  /// Review awaiting delete confirmation.
  pub pending_delete: Option<Uuid>,
}

impl Board {
  pub fn new() -> Self { Self::default() }

  pub fn identity(&self) -> &IdentityState { &self.identity }

  pub fn set_identity(&mut self, identity: IdentityState) { self.identity = identity; }

  pub fn snapshot(&self) -> Option<&Snapshot> { self.snapshot.as_ref() }

  /// Replace the rendered snapshot. Forms pointing at reviews that vanished
  /// are closed.
  pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
    if let Some(form) = &self.editing
      && snapshot.get(form.review_id).is_none()
    {
      self.editing = None;
    }
    if let Some(id) = self.pending_delete
      && snapshot.get(id).is_none()
    {
      self.pending_delete = None;
    }
    self.snapshot = Some(snapshot);
  }

  pub fn filter(&self) -> &str { &self.filter }

  pub fn set_filter(&mut self, filter: impl Into<String>) { self.filter = filter.into(); }

  pub fn view(&self) -> BoardView {
    let Some(snapshot) = &self.snapshot else {
      return BoardView::Loading { placeholders: SKELETON_CARDS };
    };
    if snapshot.is_empty() {
      return BoardView::Empty(EMPTY_MESSAGE);
    }

    let viewer = self.identity.actor();
    let matcher = SkimMatcherV2::default();
    BoardView::Cards(
      snapshot
        .iter()
        .filter(|r| {
          self.filter.is_empty() || matcher.fuzzy_match(&r.author_name, &self.filter).is_some()
        })
        .map(|r| ReviewCard::new(r, viewer))
        .collect(),
    )
  }

  fn actor(&self) -> Result<&Actor, Notice> {
    match &self.identity {
      IdentityState::Pending => Err(Notice::SigningIn),
      IdentityState::Failed(_) => Err(Denied::NotSignedIn.into()),
      IdentityState::Resolved(actor) => Ok(actor),
    }
  }

  fn review(&self, id: Uuid) -> Result<&Review, Notice> {
    self
      .snapshot
      .as_ref()
      .and_then(|s| s.get(id))
      .ok_or(Notice::Gone)
  }

  fn authorize(&self, action: Action, id: Uuid) -> Result<(), Notice> {
    let actor = self.actor()?;
    let review = self.review(id)?;
    Ok(authorize(action, review, Some(actor))?)
  }

  // ── Intents ───────────────────────────────────────────────────────────────

  pub fn vote(&self, id: Uuid, kind: VoteKind) -> Result<Command, Notice> {
    self.authorize(Action::Vote, id)?;
    Ok(Command::Vote { id, kind })
  }

  pub fn open_compose(&mut self) {
    if self.compose.is_none() {
      self.compose = Some(DraftForm::default());
    }
  }

  pub fn submit_draft(&mut self) -> Result<Command, Notice> {
    let user_id = self.actor()?.id().to_owned();
    let form = self.compose.get_or_insert_with(DraftForm::default);
    if form.submitting {
      return Err(Notice::Busy);
    }

    let draft = form.draft();
    if let Err(errors) = draft.clone().validate(user_id) {
      form.errors = errors.clone();
      return Err(Notice::Invalid(errors));
    }
    form.errors = ValidationErrors::new();
    form.submitting = true;
    Ok(Command::Create(draft))
  }

  pub fn begin_edit(&mut self, id: Uuid) -> Result<(), Notice> {
    self.authorize(Action::Edit, id)?;
    let form = EditForm::new(self.review(id)?);
    self.editing = Some(form);
    Ok(())
  }

  pub fn submit_edit(&mut self) -> Result<Command, Notice> {
    let id = self.editing.as_ref().ok_or(Notice::Gone)?.review_id;
    self.authorize(Action::Edit, id)?;

    let form = self.editing.as_mut().ok_or(Notice::Gone)?;
    if form.submitting {
      return Err(Notice::Busy);
    }
    let edit = form.edit();
    if let Err(errors) = edit.clone().validate() {
      form.errors = errors.clone();
      return Err(Notice::Invalid(errors));
    }
    form.errors = ValidationErrors::new();
    form.submitting = true;
    Ok(Command::Update { id, edit })
  }

  pub fn request_delete(&mut self, id: Uuid) -> Result<(), Notice> {
    self.authorize(Action::Delete, id)?;
    self.pending_delete = Some(id);
    Ok(())
  }

  pub fn confirm_delete(&mut self) -> Result<Command, Notice> {
    let id = self.pending_delete.take().ok_or(Notice::Gone)?;
    self.authorize(Action::Delete, id)?;
    Ok(Command::Delete(id))
  }

  /// Back out of the innermost open step.
  pub fn cancel(&mut self) {
    if self.pending_delete.take().is_some() {
      return;
    }
    if self.editing.take().is_some() {
      return;
    }
    self.compose = None;
  }

  /// Record the outcome of a dispatched command.
  pub fn settle(&mut self, origin: Origin, result: Result<(), String>) -> Option<Notice> {
    let ok = result.is_ok();
    match origin {
      Origin::Draft => {
        if let Some(form) = &mut self.compose {
          form.submitting = false;
          if ok {
            self.compose = None;
          }
        }
      }
      Origin::Edit(id) => {
        if let Some(form) = self.editing.as_mut().filter(|f| f.review_id == id) {
          form.submitting = false;
          if ok {
            self.editing = None;
          }
        }
      }
      Origin::Delete(_) | Origin::Vote(_) => {}
    }
    result.err().map(Notice::WriteFailed)
  }
}
