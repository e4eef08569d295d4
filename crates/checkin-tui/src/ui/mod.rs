//! TUI rendering — orchestrates all panes.

pub mod feed_list;
pub mod post_detail;

use chrono::Local;
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph},
};

use crate::app::{App, Screen};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw(f: &mut Frame, app: &App) {
  let area = f.area();

  // Vertical stack: header, body, status bar.
  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(area);

  draw_header(f, rows[0], app);
  draw_body(f, rows[1], app);
  draw_status(f, rows[2], app);
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header(f: &mut Frame, area: Rect, app: &App) {
  let date = Local::now().format("%Y-%m-%d").to_string();

  let role = if app.is_owner() { "  (owner)" } else { "" };
  let left = Span::styled(
    format!(" Daily Check-In{role}  [c] category  [q] quit"),
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  );
  let playing = app.now_playing.as_ref().map(|np| match &np.artist {
    Some(artist) => format!("♫ {} · {artist}  ", np.title),
    None => format!("♫ {}  ", np.title),
  });
  let right = Span::styled(
    format!("{}{date} ", playing.unwrap_or_default()),
    Style::default().fg(Color::DarkGray),
  );

  // Simple left-right header: pad the middle.
  let left_width = left.content.len() as u16;
  let right_width = right.content.len() as u16;
  let pad = area
    .width
    .saturating_sub(left_width)
    .saturating_sub(right_width);

  let line = Line::from(vec![
    left,
    Span::raw(" ".repeat(pad as usize)),
    right,
  ]);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(line), inner);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body(f: &mut Frame, area: Rect, app: &App) {
  // Split into feed pane (40%) and detail pane (60%).
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
    .split(area);

  feed_list::draw(f, cols[0], app);

  if app.not_found.is_some() {
    draw_not_found(f, cols[1]);
  } else if app.detail.is_some() {
    post_detail::draw(f, cols[1], app);
  } else {
    draw_empty_detail(f, cols[1]);
  }
}

fn draw_empty_detail(f: &mut Frame, area: Rect) {
  let block = Block::default()
    .title(" Post ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(
    Paragraph::new(Line::from(vec![Span::styled(
      "Select a post and press Enter.",
      Style::default().fg(Color::DarkGray),
    )])),
    inner,
  );
}

/// The dedicated view for a post that no longer exists.
fn draw_not_found(f: &mut Frame, area: Rect) {
  let block = Block::default()
    .title(" Post ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Red));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(
    Paragraph::new(vec![
      Line::from(Span::styled(
        "This post doesn't exist any more.",
        Style::default().fg(Color::Red),
      )),
      Line::from(Span::styled(
        "Press Esc to close.",
        Style::default().fg(Color::DarkGray),
      )),
    ]),
    inner,
  );
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status(f: &mut Frame, area: Rect, app: &App) {
  let composing = app.detail.as_ref().is_some_and(|d| d.composing);
  let (mode_label, hints) = match &app.screen {
    Screen::PostDetail if composing => (
      "COMMENT",
      "Type your comment  Enter send  Esc cancel",
    ),
    Screen::Feed => (
      "FEED",
      "↑↓/jk navigate  Enter open  Space like  m more  c category  r refresh  q quit",
    ),
    Screen::PostDetail => (
      "POST",
      "↑↓/jk scroll  Space like  c comment  Esc back  q quit",
    ),
  };

  let status = if app.status_msg.is_empty() {
    hints.to_string()
  } else {
    app.status_msg.clone()
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(
    format!("  {status}"),
    Style::default().fg(Color::DarkGray),
  );

  let line = Line::from(vec![mode_span, hint_span]);
  f.render_widget(
    Paragraph::new(line).style(Style::default().bg(Color::Black)),
    area,
  );
}
