//! Feed pane — the paginated post list.

use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState},
};

use crate::app::{App, category_emoji, format_likes, relative_time};

/// Render the feed list into `area`.
pub fn draw(f: &mut Frame, area: Rect, app: &App) {
  let posts = app.feed.posts();

  let title = match app.feed.category() {
    Some(category) => format!(" {category} posts ({}) ", posts.len()),
    None => format!(" All posts ({}) ", posts.len()),
  };

  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let items: Vec<ListItem> = posts
    .iter()
    .enumerate()
    .map(|(i, post)| {
      let is_cursor = i == app.list_cursor;
      let style = if is_cursor {
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD)
      } else {
        Style::default()
      };

      let like_state = app.tracker.like_state(post.id);
      let heart = if like_state.liked { "♥" } else { "♡" };
      let likes = format_likes(like_state.count);

      let mut spans = vec![
        Span::styled(format!("{} ", category_emoji(post.category)), style),
        Span::styled(post.title.clone(), style),
        Span::styled(
          format!(" · {}", relative_time(post.created_at)),
          style.fg(if is_cursor { Color::White } else { Color::DarkGray }),
        ),
      ];
      if !likes.is_empty() || like_state.liked {
        spans.push(Span::styled(
          format!("  {heart} {likes}"),
          style.fg(if like_state.liked { Color::Red } else { Color::DarkGray }),
        ));
      }
      ListItem::new(Line::from(spans))
    })
    .collect();

  let mut inner_area = block.inner(area);
  f.render_widget(block, area);

  // Footer hint while more pages exist.
  if app.feed.has_more() && inner_area.height > 2 {
    let footer_area = Rect {
      x:      inner_area.x,
      y:      inner_area.y + inner_area.height - 1,
      width:  inner_area.width,
      height: 1,
    };
    inner_area.height = inner_area.height.saturating_sub(1);
    f.render_widget(
      ratatui::widgets::Paragraph::new("[m] Load more")
        .style(Style::default().fg(Color::Yellow)),
      footer_area,
    );
  }

  let mut state = ListState::default();
  state.select(if posts.is_empty() {
    None
  } else {
    Some(app.list_cursor)
  });

  f.render_stateful_widget(
    List::new(items)
      .highlight_style(
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol(""),
    inner_area,
    &mut state,
  );
}
