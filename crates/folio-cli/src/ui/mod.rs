//! TUI rendering: draws every pane each frame.

pub mod form;
pub mod review_list;

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Paragraph},
};

use crate::app::{App, Mode};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(f.area());

  draw_header(f, rows[0], app);
  review_list::draw(f, rows[1], app);
  draw_status(f, rows[2], app);

  match app.mode() {
    Mode::Compose | Mode::Edit => form::draw(f, rows[1], app),
    Mode::ConfirmDelete => form::draw_confirm(f, rows[1]),
    Mode::Browse | Mode::Filter => {}
  }
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
  let left = Span::styled(
    " folio  reviews",
    Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
  );

  let who = match app.board.identity().actor() {
    None if app.board.identity().is_pending() => "signing in…".to_string(),
    None => "signed out".to_string(),
    Some(actor) if actor.is_admin => "admin".to_string(),
    Some(actor) => format!("guest {}", short_id(actor.id())),
  };
  let live = if app.is_live() { "● live" } else { "○ offline" };
  let right = Span::styled(format!("{who}  {live} "), Style::default().fg(Color::Gray));

  let pad = area
    .width
    .saturating_sub(left.width() as u16)
    .saturating_sub(right.width() as u16);
  let line = Line::from(vec![left, Span::raw(" ".repeat(pad as usize)), right]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

fn short_id(id: &str) -> &str { id.get(..8).unwrap_or(id) }

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let (mode_label, hints) = match app.mode() {
    Mode::Browse => (
      "NORMAL",
      "jk move  l like  d dislike  n new  e edit  x delete  / search  q quit",
    ),
    Mode::Filter => ("SEARCH", "Type an author name  Esc clear  Enter keep"),
    Mode::Compose => ("NEW", "Tab next field  Enter submit  Esc cancel"),
    Mode::Edit => ("EDIT", "Tab next field  Enter save  Esc cancel"),
    Mode::ConfirmDelete => ("DELETE", "y confirm  n cancel"),
  };

  let (text, color) = match &app.notice {
    Some((notice, _)) if notice.is_error() => (format!("{notice}  (Esc)"), Color::Red),
    Some((notice, _)) => (notice.to_string(), Color::Green),
    None => (hints.to_string(), Color::DarkGray),
  };

  let line = Line::from(vec![
    Span::styled(
      format!(" {mode_label} "),
      Style::default()
        .fg(Color::Black)
        .bg(Color::Cyan)
        .add_modifier(Modifier::BOLD),
    ),
    Span::styled(format!("  {text}"), Style::default().fg(color)),
  ]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
