//! Application state machine and event dispatcher.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use strum::IntoEnumIterator as _;
use uuid::Uuid;

use checkin_core::{
  comment::Comment,
  identity::Identity,
  post::{Category, NowPlaying, Post},
  store::{BlogStore as _, WatchTable},
};
use checkin_feed::{
  bridge::{CommentsWatch, RefreshBridge, TableWatch},
  engagement::EngagementTracker,
  feed::{FeedController, single_post},
  identity::{IdentityResolver, IdentityStream},
};
use checkin_store_rest::{RealtimeFeed, RestAuth, RestStore};

// ─── Screen ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
  /// The paginated feed list.
  Feed,
  /// One post with its comment thread.
  PostDetail,
}

// ─── Detail view ──────────────────────────────────────────────────────────────

/// State for the open post: its thread, the live comments channel, and
/// the compose line. Dropping it drops the channel subscription.
pub struct DetailView {
  pub post:      Post,
  pub comments:  Vec<Comment>,
  pub compose:   String,
  pub composing: bool,
  pub scroll:    usize,
  watch:         CommentsWatch,
}

// ─── App ──────────────────────────────────────────────────────────────────────

/// Top-level application state.
pub struct App {
  pub screen:      Screen,
  pub identity:    Identity,
  pub feed:        FeedController<RestStore>,
  pub tracker:     Arc<EngagementTracker<RestStore>>,
  pub list_cursor: usize,
  pub detail:      Option<DetailView>,
  /// Set when an opened post turned out to be gone — rendered as the
  /// dedicated not-found view until closed.
  pub not_found:   Option<Uuid>,
  /// The owner's "currently listening" entry, kept live via its own
  /// change channel.
  pub now_playing: Option<NowPlaying>,
  pub status_msg:  String,

  store:           Arc<RestStore>,
  resolver:        IdentityResolver<RestAuth, RestStore>,
  bridge:          RefreshBridge<RealtimeFeed>,
  posts_watch:     Option<TableWatch>,
  np_watch:        Option<TableWatch>,
  identity_events: IdentityStream,
}

impl App {
  pub fn new(
    store: Arc<RestStore>,
    realtime: Arc<RealtimeFeed>,
    resolver: IdentityResolver<RestAuth, RestStore>,
  ) -> Self {
    let tracker = Arc::new(EngagementTracker::new(store.clone()));
    let feed = FeedController::new(store.clone(), tracker.clone(), None);
    let identity_events = resolver.subscribe();

    Self {
      screen: Screen::Feed,
      identity: Identity::Anonymous(resolver.anonymous_token()),
      feed,
      tracker,
      list_cursor: 0,
      detail: None,
      not_found: None,
      now_playing: None,
      status_msg: String::new(),
      store,
      resolver,
      bridge: RefreshBridge::new(realtime),
      posts_watch: None,
      np_watch: None,
      identity_events,
    }
  }

  /// Resolve identity, load the first page, and open the posts
  /// channel. Called once, before the event loop.
  pub async fn mount(&mut self) -> anyhow::Result<()> {
    self.identity = self.resolver.current_identity().await;
    self.reload_feed().await;
    self.refresh_now_playing().await;
    match self.bridge.watch_table(WatchTable::Posts).await {
      Ok(watch) => self.posts_watch = Some(watch),
      Err(e) => {
        // Without the channel the feed still works, it just needs
        // manual refreshes.
        self.status_msg = format!("realtime unavailable: {e}");
      }
    }
    self.np_watch =
      self.bridge.watch_table(WatchTable::NowPlaying).await.ok();
    Ok(())
  }

  async fn refresh_now_playing(&mut self) {
    match self.store.fetch_now_playing().await {
      Ok(entry) => self.now_playing = entry,
      Err(e) => tracing::debug!(error = %e, "now-playing fetch failed"),
    }
  }

  pub fn is_owner(&self) -> bool {
    self.identity.is_owner()
  }

  // ── Event-driven refresh ──────────────────────────────────────────────

  /// Apply pending realtime and auth events. Runs every loop tick,
  /// before drawing.
  pub async fn tick(&mut self) {
    if let Some(identity) = self.identity_events.try_recv() {
      self.identity = identity;
      self.tracker.invalidate_all();
      self.reload_feed().await;
    }

    let dirty =
      self.posts_watch.as_mut().is_some_and(TableWatch::poll_dirty);
    if dirty {
      // Coarse invalidation: any posts change anywhere re-runs the load.
      self.tracker.invalidate_all();
      self.reload_feed().await;
    }

    if self.np_watch.as_mut().is_some_and(TableWatch::poll_dirty) {
      self.refresh_now_playing().await;
    }

    if let Some(detail) = self.detail.as_mut() {
      detail.comments.extend(detail.watch.drain_new());
    }
  }

  async fn reload_feed(&mut self) {
    if let Err(e) = self.feed.load(&self.identity).await {
      self.status_msg = format!("Error: {e}");
    } else {
      self.status_msg.clear();
    }
    let len = self.feed.posts().len();
    if self.list_cursor >= len {
      self.list_cursor = len.saturating_sub(1);
    }
  }

  // ── Key handling ──────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    // Global: Ctrl-C quits from anywhere.
    if key.modifiers.contains(KeyModifiers::CONTROL)
      && key.code == KeyCode::Char('c')
    {
      return Ok(false);
    }

    if self.detail.as_ref().is_some_and(|d| d.composing) {
      return self.handle_compose_key(key).await;
    }

    match self.screen {
      Screen::Feed => self.handle_feed_key(key).await,
      Screen::PostDetail => self.handle_detail_key(key).await,
    }
  }

  async fn handle_feed_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.feed.posts().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.list_cursor = self.list_cursor.saturating_sub(1);
      }

      // Open detail.
      KeyCode::Enter | KeyCode::Right | KeyCode::Char('l') => {
        if let Some(id) = self.cursor_post_id() {
          self.open_detail(id).await;
        }
      }

      // Like under cursor.
      KeyCode::Char(' ') => {
        if let Some(id) = self.cursor_post_id() {
          self.toggle_like(id).await;
        }
      }

      // Next page.
      KeyCode::Char('m') => {
        if self.feed.has_more() {
          if let Err(e) = self.feed.load_more(&self.identity).await {
            self.status_msg = format!("Error: {e}");
          }
        }
      }

      // Cycle the category filter: all → eat → … → life → all.
      KeyCode::Char('c') => {
        let next = next_category(self.feed.category());
        self.feed =
          FeedController::new(self.store.clone(), self.tracker.clone(), next);
        self.list_cursor = 0;
        self.reload_feed().await;
      }

      // Manual refresh.
      KeyCode::Char('r') => {
        self.tracker.invalidate_all();
        self.reload_feed().await;
      }

      _ => {}
    }
    Ok(true)
  }

  async fn handle_detail_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    match key.code {
      KeyCode::Char('q') => return Ok(false),

      // Back to the feed; dropping the view closes its channel.
      KeyCode::Esc | KeyCode::Left | KeyCode::Char('h') => {
        self.detail = None;
        self.not_found = None;
        self.screen = Screen::Feed;
      }

      KeyCode::Down | KeyCode::Char('j') => {
        if let Some(detail) = self.detail.as_mut() {
          if detail.scroll + 1 < detail.comments.len() + 1 {
            detail.scroll += 1;
          }
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        if let Some(detail) = self.detail.as_mut() {
          detail.scroll = detail.scroll.saturating_sub(1);
        }
      }

      KeyCode::Char(' ') => {
        if let Some(id) = self.detail.as_ref().map(|d| d.post.id) {
          self.toggle_like(id).await;
        }
      }

      // Start composing a comment.
      KeyCode::Char('c') => {
        if let Some(detail) = self.detail.as_mut() {
          detail.composing = true;
          detail.compose.clear();
        }
      }

      _ => {}
    }
    Ok(true)
  }

  async fn handle_compose_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    let Some(detail) = self.detail.as_mut() else {
      return Ok(true);
    };
    match key.code {
      KeyCode::Esc => {
        detail.composing = false;
        detail.compose.clear();
      }
      KeyCode::Enter => {
        let content = detail.compose.clone();
        let post_id = detail.post.id;
        match self
          .tracker
          .post_comment(&self.identity, post_id, &content, None)
          .await
        {
          Ok(comment) => {
            if let Some(detail) = self.detail.as_mut() {
              // Shown immediately; the echoing change event is a dup.
              detail.watch.note(comment.id);
              detail.comments.push(comment);
              detail.composing = false;
              detail.compose.clear();
            }
            self.status_msg.clear();
          }
          Err(e) => {
            self.status_msg = format!("Error: {e}");
          }
        }
      }
      KeyCode::Backspace => {
        detail.compose.pop();
      }
      KeyCode::Char(c) => {
        detail.compose.push(c);
      }
      _ => {}
    }
    Ok(true)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  pub fn cursor_post_id(&self) -> Option<Uuid> {
    self.feed.posts().get(self.list_cursor).map(|p| p.id)
  }

  async fn toggle_like(&mut self, post_id: Uuid) {
    match self.tracker.toggle_like(&self.identity, post_id).await {
      Ok(_) => self.status_msg.clear(),
      Err(e) => self.status_msg = format!("Error: {e}"),
    }
  }

  /// Transition to `PostDetail`, loading the post, its thread, and a
  /// comments channel scoped to it.
  async fn open_detail(&mut self, post_id: Uuid) {
    self.status_msg = "Loading…".into();
    let post = match single_post(self.store.as_ref(), post_id).await {
      Ok(post) => post,
      Err(checkin_core::Error::NotFound(id)) => {
        // Deleted since the feed was loaded: dedicated not-found view.
        self.not_found = Some(id);
        self.screen = Screen::PostDetail;
        self.status_msg.clear();
        return;
      }
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        return;
      }
    };

    let comments = match self.tracker.comments(post_id).await {
      Ok(comments) => comments,
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        Vec::new()
      }
    };

    let watch = match self.bridge.watch_comments(post_id, &comments).await {
      Ok(watch) => watch,
      Err(e) => {
        self.status_msg = format!("Error: {e}");
        return;
      }
    };

    if let Err(e) = self.tracker.hydrate(&self.identity, &[post_id]).await {
      tracing::warn!(error = %e, "hydration failed for detail view");
    }

    self.detail = Some(DetailView {
      post,
      comments,
      compose: String::new(),
      composing: false,
      scroll: 0,
      watch,
    });
    self.screen = Screen::PostDetail;
    self.status_msg.clear();
  }
}

// ─── Display helpers ──────────────────────────────────────────────────────────

fn next_category(current: Option<Category>) -> Option<Category> {
  match current {
    None => Category::iter().next(),
    Some(current) => {
      let mut iter = Category::iter().skip_while(|c| *c != current);
      iter.next();
      iter.next()
    }
  }
}

pub fn category_emoji(category: Category) -> &'static str {
  match category {
    Category::Eat => "🍳",
    Category::Sleep => "😴",
    Category::Study => "📚",
    Category::Play => "🎮",
    Category::Life => "⭐",
  }
}

/// Compact relative age, feed style: `just now`, `5m`, `3h`, `2d`.
pub fn relative_time(at: chrono::DateTime<chrono::Utc>) -> String {
  let elapsed = chrono::Utc::now() - at;
  if elapsed.num_minutes() < 1 {
    "just now".to_string()
  } else if elapsed.num_minutes() < 60 {
    format!("{}m", elapsed.num_minutes())
  } else if elapsed.num_hours() < 24 {
    format!("{}h", elapsed.num_hours())
  } else {
    format!("{}d", elapsed.num_days())
  }
}

/// `""`, `1 like`, `12 likes`, `1.2k likes`.
pub fn format_likes(count: u64) -> String {
  match count {
    0 => String::new(),
    1 => "1 like".to_string(),
    n if n >= 1000 => format!("{:.1}k likes", n as f64 / 1000.0),
    n => format!("{n} likes"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn category_cycle_wraps_through_all() {
    let mut current = None;
    let mut seen = Vec::new();
    for _ in 0..Category::iter().count() {
      current = next_category(current);
      seen.push(current.unwrap());
    }
    assert_eq!(seen, Category::iter().collect::<Vec<_>>());
    assert_eq!(next_category(current), None);
  }

  #[test]
  fn like_labels_match_the_feed_style() {
    assert_eq!(format_likes(0), "");
    assert_eq!(format_likes(1), "1 like");
    assert_eq!(format_likes(42), "42 likes");
    assert_eq!(format_likes(1250), "1.2k likes");
  }

  #[test]
  fn relative_times_shorten() {
    let now = chrono::Utc::now();
    assert_eq!(relative_time(now), "just now");
    assert_eq!(relative_time(now - chrono::Duration::minutes(5)), "5m");
    assert_eq!(relative_time(now - chrono::Duration::hours(3)), "3h");
    assert_eq!(relative_time(now - chrono::Duration::days(2)), "2d");
  }
}
