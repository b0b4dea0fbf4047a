//! Application state machine and event dispatcher.
//!
//! Network work never runs on the input path: sign-in, the live feed and
//! every write are spawned tasks that report back through one unbounded
//! channel of [`AppEvent`]s, drained by the UI loop.

use std::{
  future::Future,
  time::{Duration, Instant},
};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use folio_core::{identity::IdentityState, store::Snapshot, vote::VoteKind};
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};
use uuid::Uuid;

use crate::{
  board::{Board, BoardView, Command, Notice, Origin},
  client::{ApiClient, SessionGrant},
};

/// Notices disappear on their own after this long.
pub const NOTICE_TTL: Duration = Duration::from_secs(4);

/// Delay before re-polling after the feed failed.
pub const FEED_RETRY: Duration = Duration::from_secs(3);

// ─── Events ───────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum AppEvent {
  SignedIn(Result<SessionGrant, String>),
  Snapshot(Snapshot),
  FeedFailed(String),
  Settled { origin: Origin, result: Result<(), String> },
}

// ─── Live feed ────────────────────────────────────────────────────────────────

/// Owns the long-poll task and aborts it when dropped.
pub struct FeedGuard(JoinHandle<()>);

impl FeedGuard {
  pub fn spawn(client: ApiClient, events: UnboundedSender<AppEvent>) -> Self {
    let poll = move |after| {
      let client = client.clone();
      async move { client.poll(after).await }
    };
    Self(tokio::spawn(run_feed(poll, events, FEED_RETRY)))
  }
}

impl Drop for FeedGuard {
  fn drop(&mut self) { self.0.abort(); }
}

/// Long-poll until the receiving side goes away. `poll` is handed the
/// position of the last snapshot forwarded.
async fn run_feed<P, F>(mut poll: P, events: UnboundedSender<AppEvent>, retry: Duration)
where
  P: FnMut(Option<(u64, u64)>) -> F,
  F: Future<Output = anyhow::Result<Snapshot>>,
{
  let mut after = None;
  loop {
    match poll(after).await {
      // Timed out with nothing new.
      Ok(snapshot) if after == Some(snapshot.position()) => {}
      Ok(snapshot) => {
        // A new epoch means the server restarted; take it as is.
        after = Some(snapshot.position());
        if events.send(AppEvent::Snapshot(snapshot)).is_err() {
          return;
        }
      }
      Err(e) => {
        let message = format!("{e:#}");
        tracing::warn!(error = %message, "review feed failed");
        if events.send(AppEvent::FeedFailed(message)).is_err() {
          return;
        }
        tokio::time::sleep(retry).await;
      }
    }
  }
}

// ─── Mode ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
  Browse,
  Filter,
  Compose,
  Edit,
  ConfirmDelete,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  pub board:         Board,

  /// Cursor position within the visible cards.
  pub cursor:        usize,

  /// Whether the user is typing a filter query.
  pub filter_active: bool,

  /// Current notice and when it was raised.
  pub notice:        Option<(Notice, Instant)>,

  client: ApiClient,
  events: UnboundedSender<AppEvent>,
  feed:   Option<FeedGuard>,
}

impl App {
  pub fn new(client: ApiClient, events: UnboundedSender<AppEvent>) -> Self {
    Self {
      board: Board::new(),
      cursor: 0,
      filter_active: false,
      notice: None,
      client,
      events,
      feed: None,
    }
  }

  /// Begin identity resolution and subscribe to the live feed.
  pub fn start(&mut self) {
    let client = self.client.clone();
    let events = self.events.clone();
    tokio::spawn(async move {
      let result = client.sign_in().await.map_err(|e| format!("{e:#}"));
      let _ = events.send(AppEvent::SignedIn(result));
    });

    self.feed = Some(FeedGuard::spawn(self.client.clone(), self.events.clone()));
  }

  /// The client, carrying the session token once signed in.
  pub fn client(&self) -> &ApiClient { &self.client }

  /// Whether the live feed task is running.
  pub fn is_live(&self) -> bool { self.feed.is_some() }

  pub fn mode(&self) -> Mode {
    if self.board.pending_delete.is_some() {
      Mode::ConfirmDelete
    } else if self.board.editing.is_some() {
      Mode::Edit
    } else if self.board.compose.is_some() {
      Mode::Compose
    } else if self.filter_active {
      Mode::Filter
    } else {
      Mode::Browse
    }
  }

  // ── Events ────────────────────────────────────────────────────────────────

  pub fn handle_event(&mut self, event: AppEvent) {
    match event {
      AppEvent::SignedIn(Ok(grant)) => {
        self.client.set_token(grant.token);
        tracing::info!(user_id = %grant.actor.id(), admin = grant.actor.is_admin, "signed in");
        if grant.actor.is_admin {
          self.notify(Notice::Info("Signed in as administrator.".into()));
        }
        self.board.set_identity(IdentityState::Resolved(grant.actor));
      }
      AppEvent::SignedIn(Err(e)) => {
        tracing::warn!(error = %e, "sign-in failed");
        self.board.set_identity(IdentityState::Failed(e.clone()));
        self.notify(Notice::SignInFailed(e));
      }
      AppEvent::Snapshot(snapshot) => {
        self.board.apply_snapshot(snapshot);
        self.clamp_cursor();
      }
      AppEvent::FeedFailed(e) => self.notify(Notice::FeedFailed(e)),
      AppEvent::Settled { origin, result } => {
        if let Some(notice) = self.board.settle(origin, result) {
          self.notify(notice);
        }
      }
    }
  }

  /// Drop the notice once it has been shown long enough.
  pub fn tick(&mut self) {
    if self.notice.as_ref().is_some_and(|(_, at)| at.elapsed() >= NOTICE_TTL) {
      self.notice = None;
    }
  }

  fn notify(&mut self, notice: Notice) { self.notice = Some((notice, Instant::now())); }

  /// Send `command` on its own task; the outcome comes back as an event.
  fn dispatch(&self, command: Command) {
    let client = self.client.clone();
    let events = self.events.clone();
    tokio::spawn(async move {
      let origin = command.origin();
      let result = client.execute(&command).await.map_err(|e| {
        let message = format!("{e:#}");
        tracing::warn!(error = %message, ?origin, "write failed");
        message
      });
      let _ = events.send(AppEvent::Settled { origin, result });
    });
  }

  fn run(&mut self, intent: Result<Command, Notice>) {
    match intent {
      Ok(command) => self.dispatch(command),
      Err(notice) => self.notify(notice),
    }
  }

  fn refuse(&mut self, intent: Result<(), Notice>) {
    if let Err(notice) = intent {
      self.notify(notice);
    }
  }

  // ── Cursor ────────────────────────────────────────────────────────────────

  fn card_count(&self) -> usize {
    match self.board.view() {
      BoardView::Cards(cards) => cards.len(),
      _ => 0,
    }
  }

  fn clamp_cursor(&mut self) {
    let len = self.card_count();
    if self.cursor >= len {
      self.cursor = len.saturating_sub(1);
    }
  }

  /// The review under the cursor, if any.
  pub fn selected(&self) -> Option<Uuid> {
    match self.board.view() {
      BoardView::Cards(cards) => cards.get(self.cursor).map(|c| c.id),
      _ => None,
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub fn handle_key(&mut self, key: KeyEvent) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
      return false;
    }

    match self.mode() {
      Mode::ConfirmDelete => self.handle_confirm_key(key),
      Mode::Edit | Mode::Compose => self.handle_form_key(key),
      Mode::Filter => self.handle_filter_key(key),
      Mode::Browse => return self.handle_browse_key(key),
    }
    true
  }

  fn handle_confirm_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('y') | KeyCode::Enter => {
        let intent = self.board.confirm_delete();
        self.run(intent);
      }
      KeyCode::Char('n') | KeyCode::Esc => self.board.cancel(),
      _ => {}
    }
  }

  fn handle_form_key(&mut self, key: KeyEvent) {
    let editing = self.board.editing.is_some();
    match key.code {
      KeyCode::Esc => self.board.cancel(),
      KeyCode::Tab => {
        if let Some(form) = &mut self.board.editing {
          form.next_field();
        } else if let Some(form) = &mut self.board.compose {
          form.next_field();
        }
      }
      KeyCode::Enter => {
        let intent =
          if editing { self.board.submit_edit() } else { self.board.submit_draft() };
        self.run(intent);
      }
      KeyCode::Backspace => {
        if let Some(input) = self.form_input() {
          input.pop();
        }
      }
      KeyCode::Char(c) => {
        if let Some(input) = self.form_input() {
          input.push(c);
        }
      }
      _ => {}
    }
  }

  fn form_input(&mut self) -> Option<&mut String> {
    if let Some(form) = &mut self.board.editing {
      return Some(form.input());
    }
    self.board.compose.as_mut().map(|form| form.input())
  }

  fn handle_filter_key(&mut self, key: KeyEvent) {
    let mut filter = self.board.filter().to_owned();
    match key.code {
      KeyCode::Esc => {
        self.filter_active = false;
        filter.clear();
      }
      KeyCode::Enter => self.filter_active = false,
      KeyCode::Backspace => {
        filter.pop();
      }
      KeyCode::Char(c) => filter.push(c),
      _ => return,
    }
    self.board.set_filter(filter);
    self.cursor = 0;
  }

  fn handle_browse_key(&mut self, key: KeyEvent) -> bool {
    match key.code {
      KeyCode::Char('q') => return false,

      KeyCode::Esc => {
        if self.notice.take().is_none() && !self.board.filter().is_empty() {
          self.board.set_filter("");
          self.cursor = 0;
        }
      }

      // Navigation
      KeyCode::Down | KeyCode::Char('j') => {
        if self.cursor + 1 < self.card_count() {
          self.cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.cursor = self.cursor.saturating_sub(1);
      }

      // Votes
      KeyCode::Char('l') => self.vote_selected(VoteKind::Like),
      KeyCode::Char('d') => self.vote_selected(VoteKind::Dislike),

      // Writes
      KeyCode::Char('n') => self.board.open_compose(),
      KeyCode::Char('e') => {
        if let Some(id) = self.selected() {
          let intent = self.board.begin_edit(id);
          self.refuse(intent);
        }
      }
      KeyCode::Char('x') => {
        if let Some(id) = self.selected() {
          let intent = self.board.request_delete(id);
          self.refuse(intent);
        }
      }

      // Filter
      KeyCode::Char('/') => {
        self.filter_active = true;
        self.board.set_filter("");
        self.cursor = 0;
      }

      _ => {}
    }
    true
  }

  fn vote_selected(&mut self, kind: VoteKind) {
    if let Some(id) = self.selected() {
      let intent = self.board.vote(id, kind);
      self.run(intent);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::{
    collections::{BTreeSet, VecDeque},
    pin::Pin,
    sync::{Arc, Mutex},
  };

  use chrono::Utc;
  use folio_core::{
    identity::{AdminPolicy, Identity},
    review::Review,
  };
  use tokio::sync::{mpsc, oneshot};

  use super::*;
  use crate::client::ApiConfig;

  fn key(c: char) -> KeyEvent { KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE) }

  fn app() -> (App, mpsc::UnboundedReceiver<AppEvent>) {
    let client = ApiClient::new(ApiConfig {
      base_url:       "http://127.0.0.1:9".into(),
      admin_email:    String::new(),
      admin_password: String::new(),
    })
    .unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    (App::new(client, tx), rx)
  }

  fn snapshot_with(user_id: &str) -> Snapshot {
    Snapshot {
      epoch:    1,
      revision: 1,
      reviews:  vec![Review {
        id:          Uuid::new_v4(),
        author_name: "Ada".into(),
        comment:     "Great work on this project!".into(),
        rating:      5,
        created_at:  Utc::now(),
        user_id:     user_id.into(),
        liked_by:    BTreeSet::new(),
        disliked_by: BTreeSet::new(),
      }],
    }
  }

  #[tokio::test]
  async fn dropping_the_guard_stops_the_feed() {
    let (tx, rx) = oneshot::channel::<()>();
    let guard = FeedGuard(tokio::spawn(async move {
      let _held = tx;
      std::future::pending::<()>().await
    }));
    drop(guard);
    assert!(rx.await.is_err(), "task still running");
  }

  /// Hands out scripted poll results in order and records the position each
  /// call was given. Once the script runs out the poll never returns.
  fn scripted(
    script: Vec<anyhow::Result<Snapshot>>,
  ) -> (
    impl FnMut(Option<(u64, u64)>) -> Pin<Box<dyn Future<Output = anyhow::Result<Snapshot>> + Send>>
    + Send,
    Arc<Mutex<Vec<Option<(u64, u64)>>>>,
  ) {
    let script = Arc::new(Mutex::new(VecDeque::from(script)));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let poll = move |after: Option<(u64, u64)>| {
      log.lock().unwrap().push(after);
      let next = script.lock().unwrap().pop_front();
      Box::pin(async move {
        match next {
          Some(result) => result,
          None => std::future::pending().await,
        }
      }) as Pin<Box<dyn Future<Output = anyhow::Result<Snapshot>> + Send>>
    };
    (poll, seen)
  }

  fn at(epoch: u64, revision: u64) -> Snapshot {
    Snapshot { epoch, revision, ..snapshot_with("A") }
  }

  #[tokio::test]
  async fn feed_skips_repeats_retries_failures_and_follows_restarts() {
    let (poll, seen) = scripted(vec![
      Ok(at(7, 1)),
      // Long-poll timed out: same position, nothing forwarded.
      Ok(at(7, 1)),
      Err(anyhow::anyhow!("connection refused")),
      // Restarted server: a new epoch at the same revision number.
      Ok(at(9, 1)),
      Ok(at(9, 2)),
    ]);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run_feed(poll, tx, Duration::ZERO));

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, AppEvent::Snapshot(s) if s.position() == (7, 1)));
    let event = rx.recv().await.unwrap();
    assert!(matches!(event, AppEvent::FeedFailed(e) if e.contains("connection refused")));
    let event = rx.recv().await.unwrap();
    assert!(matches!(event, AppEvent::Snapshot(s) if s.position() == (9, 1)));
    let event = rx.recv().await.unwrap();
    assert!(matches!(event, AppEvent::Snapshot(s) if s.position() == (9, 2)));
    task.abort();

    let seen = seen.lock().unwrap().clone();
    assert_eq!(seen[..5], [
      None,
      Some((7, 1)),
      Some((7, 1)),
      Some((7, 1)),
      Some((9, 1)),
    ]);
  }

  #[tokio::test]
  async fn feed_stops_when_the_app_is_gone() {
    let (poll, _) = scripted(vec![Ok(at(1, 1))]);
    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);
    tokio::time::timeout(Duration::from_secs(1), run_feed(poll, tx, Duration::ZERO))
      .await
      .expect("feed kept running");
  }

  #[tokio::test]
  async fn votes_before_sign_in_raise_a_notice() {
    let (mut app, _rx) = app();
    app.handle_event(AppEvent::Snapshot(snapshot_with("A")));

    assert!(app.handle_key(key('l')));
    let (notice, _) = app.notice.as_ref().unwrap();
    assert_eq!(notice, &Notice::SigningIn);
  }

  #[tokio::test]
  async fn delete_asks_for_confirmation() {
    let (mut app, _rx) = app();
    app.handle_event(AppEvent::Snapshot(snapshot_with("A")));
    app.board.set_identity(IdentityState::Resolved(
      AdminPolicy::new("owner@example.com").actor(Identity { id: "A".into(), email: None }),
    ));

    app.handle_key(key('x'));
    assert_eq!(app.mode(), Mode::ConfirmDelete);
    app.handle_key(key('n'));
    assert_eq!(app.mode(), Mode::Browse);
  }

  #[tokio::test]
  async fn failed_writes_come_back_as_notices() {
    let (mut app, _rx) = app();
    app.handle_event(AppEvent::Settled {
      origin: Origin::Vote(Uuid::new_v4()),
      result: Err("connection refused".into()),
    });
    let (notice, _) = app.notice.as_ref().unwrap();
    assert!(notice.is_error());

    app.handle_key(KeyEvent::from(KeyCode::Esc));
    assert!(app.notice.is_none());
  }
}
