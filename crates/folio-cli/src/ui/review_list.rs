//! Review list pane.

use folio_core::{review::MAX_RATING, vote::VoteState};
use ratatui::{
  Frame,
  layout::{Alignment, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};

use crate::{
  app::App,
  board::{BoardView, ReviewCard},
};

/// Render the board into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let view = app.board.view();
  let filtering = app.filter_active || !app.board.filter().is_empty();

  let title = match &view {
    BoardView::Cards(cards) if filtering => {
      let total = app.board.snapshot().map_or(0, |s| s.len());
      format!(" Reviews ({}/{}) ", cards.len(), total)
    }
    BoardView::Cards(cards) => format!(" Reviews ({}) ", cards.len()),
    BoardView::Loading { .. } | BoardView::Empty(_) => " Reviews ".to_string(),
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let mut inner = block.inner(area);
  f.render_widget(block, area);

  if filtering && inner.height > 2 {
    let filter_area = Rect { y: inner.y + inner.height - 1, height: 1, ..inner };
    inner.height -= 1;
    let cursor = if app.filter_active { "_" } else { "" };
    f.render_widget(
      Paragraph::new(format!("/{}{cursor}", app.board.filter()))
        .style(Style::default().fg(Color::Yellow)),
      filter_area,
    );
  }

  match view {
    BoardView::Loading { placeholders } => draw_skeleton(f, inner, placeholders),
    BoardView::Empty(message) => {
      f.render_widget(
        Paragraph::new(message)
          .alignment(Alignment::Center)
          .style(Style::default().fg(Color::Gray).add_modifier(Modifier::ITALIC)),
        inner,
      );
    }
    BoardView::Cards(cards) if cards.is_empty() => {
      f.render_widget(
        Paragraph::new("No reviews by a matching author.")
          .style(Style::default().fg(Color::DarkGray)),
        inner,
      );
    }
    BoardView::Cards(cards) => {
      let items: Vec<ListItem> = cards.iter().map(card_item).collect();
      let mut state = ListState::default();
      state.select(Some(app.cursor.min(cards.len() - 1)));
      f.render_stateful_widget(
        List::new(items)
          .highlight_style(Style::default().bg(Color::Blue).fg(Color::White))
          .highlight_symbol("▍"),
        inner,
        &mut state,
      );
    }
  }
}

fn draw_skeleton(f: &mut Frame, area: Rect, placeholders: usize) {
  let shade = Style::default().fg(Color::DarkGray);
  let width = usize::from(area.width.saturating_sub(4));
  let lines: Vec<Line> = (0..placeholders)
    .flat_map(|_| {
      [
        Line::styled("░".repeat(width / 3), shade),
        Line::styled("░".repeat(width), shade),
        Line::styled("░".repeat(width * 2 / 3), shade),
        Line::from(""),
      ]
    })
    .collect();
  f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn card_item(card: &ReviewCard) -> ListItem<'static> {
  let stars = format!(
    "{}{}",
    "★".repeat(usize::from(card.rating)),
    "☆".repeat(usize::from(MAX_RATING.saturating_sub(card.rating)))
  );

  let vote_style = |active: bool| {
    if active {
      Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
    } else {
      Style::default().fg(Color::Gray)
    }
  };

  let mut footer = vec![
    Span::styled(
      format!("▲ {}", card.likes),
      vote_style(card.my_vote == VoteState::Liked),
    ),
    Span::raw("  "),
    Span::styled(
      format!("▼ {}", card.dislikes),
      vote_style(card.my_vote == VoteState::Disliked),
    ),
  ];
  if card.can_edit || card.can_delete {
    footer.push(Span::styled("   [e] edit  [x] delete", Style::default().fg(Color::DarkGray)));
  }

  ListItem::new(vec![
    Line::from(vec![
      Span::styled(stars, Style::default().fg(Color::Yellow)),
      Span::raw("  "),
      Span::styled(card.author_name.clone(), Style::default().add_modifier(Modifier::BOLD)),
      Span::styled(
        format!("  {}", card.created_at.format("%Y-%m-%d")),
        Style::default().fg(Color::DarkGray),
      ),
    ]),
    Line::from(format!("  {}", card.comment)),
    Line::from(footer),
    Line::from(""),
  ])
}
