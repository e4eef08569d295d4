//! Post pane — one post with its comment thread and compose line.

use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::{App, category_emoji, format_likes, relative_time};

/// Render the open post into `area`. Callers only invoke this while
/// `app.detail` is populated.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let Some(detail) = app.detail.as_ref() else {
    return;
  };
  let post = &detail.post;

  let block = Block::default()
    .title(format!(" {} {} ", category_emoji(post.category), post.title))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Min(0),    // post + comments
      Constraint::Length(1), // compose line
    ])
    .split(inner);

  draw_content(f, rows[0], app);
  draw_compose(f, rows[1], app);
}

fn draw_content(f: &mut Frame, area: Rect, app: &App) {
  let Some(detail) = app.detail.as_ref() else {
    return;
  };
  let post = &detail.post;
  let like_state = app.tracker.like_state(post.id);

  let mut lines: Vec<Line> = Vec::new();

  // Byline.
  lines.push(Line::from(Span::styled(
    format!("Blog Owner · {}", relative_time(post.created_at)),
    Style::default().fg(Color::DarkGray),
  )));

  // Weather snapshot, as captured at writing time.
  if let Some(weather) = &post.weather {
    lines.push(Line::from(Span::raw(format!(
      "{} {}°C in {}",
      weather.icon, weather.temp, weather.location
    ))));
  }

  // Music snapshot.
  if let Some(music) = &post.music {
    let line = match &music.artist {
      Some(artist) => format!("♫ {} · {artist}", music.title),
      None => format!("♫ {}", music.title),
    };
    lines.push(Line::from(Span::styled(
      line,
      Style::default().fg(Color::Green),
    )));
  }

  lines.push(Line::raw(""));
  for text_line in post.content.lines() {
    lines.push(Line::raw(text_line.to_string()));
  }
  lines.push(Line::raw(""));

  if !post.hashtags.is_empty() {
    let tags: Vec<String> =
      post.hashtags.iter().map(|t| format!("#{t}")).collect();
    lines.push(Line::from(Span::styled(
      tags.join(" "),
      Style::default().fg(Color::Blue),
    )));
  }

  if !post.image_urls.is_empty() || !post.video_urls.is_empty() {
    lines.push(Line::from(Span::styled(
      format!(
        "{} image(s), {} video(s) attached",
        post.image_urls.len(),
        post.video_urls.len()
      ),
      Style::default().fg(Color::DarkGray),
    )));
  }

  // Likes line.
  let heart = if like_state.liked { "♥" } else { "♡" };
  let likes = format_likes(like_state.count);
  lines.push(Line::from(Span::styled(
    if likes.is_empty() { heart.to_string() } else { format!("{heart} {likes}") },
    Style::default().fg(if like_state.liked {
      Color::Red
    } else {
      Color::DarkGray
    }),
  )));
  lines.push(Line::raw(""));

  // Comment thread, creation-ascending; realtime appends land at the
  // bottom as they arrive.
  lines.push(Line::from(Span::styled(
    format!("Comments ({})", detail.comments.len()),
    Style::default().add_modifier(Modifier::BOLD),
  )));
  if detail.comments.is_empty() {
    lines.push(Line::from(Span::styled(
      "No comments yet. Be the first!",
      Style::default().fg(Color::DarkGray),
    )));
  }
  for comment in &detail.comments {
    let author = comment.author_name.as_deref().unwrap_or("Blog Owner");
    lines.push(Line::from(vec![
      Span::styled(
        format!("{author} "),
        Style::default().add_modifier(Modifier::BOLD),
      ),
      Span::raw(comment.content.clone()),
      Span::styled(
        format!("  {}", relative_time(comment.created_at)),
        Style::default().fg(Color::DarkGray),
      ),
    ]));
  }

  f.render_widget(
    Paragraph::new(lines)
      .wrap(Wrap { trim: false })
      .scroll((detail.scroll as u16, 0)),
    area,
  );
}

fn draw_compose(f: &mut Frame, area: Rect, app: &App) {
  let Some(detail) = app.detail.as_ref() else {
    return;
  };

  let line = if detail.composing {
    Line::from(vec![
      Span::styled("> ", Style::default().fg(Color::Yellow)),
      Span::raw(detail.compose.clone()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ])
  } else {
    Line::from(Span::styled(
      "[c] Add a comment…",
      Style::default().fg(Color::DarkGray),
    ))
  };

  f.render_widget(Paragraph::new(line), area);
}
