//! Compose/edit form and delete confirmation, drawn over the list.

use folio_core::validation::ValidationErrors;
use ratatui::{
  Frame,
  layout::{Constraint, Flex, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::{app::App, board::Field};

fn centered(area: Rect, width: u16, height: u16) -> Rect {
  let [row] = Layout::vertical([Constraint::Length(height)])
    .flex(Flex::Center)
    .areas(area);
  let [cell] = Layout::horizontal([Constraint::Length(width)])
    .flex(Flex::Center)
    .areas(row);
  cell
}

/// Render whichever form is open.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let (title, fields, focus, errors, submitting) = if let Some(form) = &app.board.editing {
    (
      " Edit review ",
      vec![
        (Field::Comment, "Comment", "comment", form.comment.as_str()),
        (Field::Rating, "Rating (1-5)", "rating", form.rating.as_str()),
      ],
      form.focus,
      &form.errors,
      form.submitting,
    )
  } else if let Some(form) = &app.board.compose {
    (
      " Leave a review ",
      vec![
        (Field::Author, "Name", "authorName", form.author_name.as_str()),
        (Field::Comment, "Comment", "comment", form.comment.as_str()),
        (Field::Rating, "Rating (1-5)", "rating", form.rating.as_str()),
      ],
      form.focus,
      &form.errors,
      form.submitting,
    )
  } else {
    return;
  };

  let mut lines = Vec::new();
  for (field, label, wire_name, value) in fields {
    let focused = field == focus;
    let label_style = if focused {
      Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(Color::Gray)
    };
    let cursor = if focused && !submitting { "_" } else { "" };
    lines.push(Line::from(Span::styled(label, label_style)));
    lines.push(Line::from(format!("  {value}{cursor}")));
    lines.extend(field_errors(errors, wire_name));
    lines.push(Line::from(""));
  }
  if submitting {
    lines.push(Line::styled("Submitting…", Style::default().fg(Color::Yellow)));
  }

  let height = (lines.len() as u16 + 2).min(area.height);
  let popup = centered(area, area.width.saturating_sub(8).min(72), height);
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Cyan));
  f.render_widget(Clear, popup);
  f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }).block(block), popup);
}

fn field_errors<'a>(errors: &'a ValidationErrors, field: &str) -> impl Iterator<Item = Line<'a>> {
  errors
    .field(field)
    .iter()
    .map(|m| Line::styled(format!("  {m}"), Style::default().fg(Color::Red)))
}

/// Render the delete confirmation prompt.
pub fn draw_confirm(f: &mut Frame, area: Rect) {
  let popup = centered(area, 40.min(area.width), 3);
  let block = Block::default()
    .title(" Delete review ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));
  f.render_widget(Clear, popup);
  f.render_widget(Paragraph::new("Delete this review? [y/n]").block(block), popup);
}
