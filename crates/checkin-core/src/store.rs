//! The backend abstractions and supporting query/event types.
//!
//! [`BlogStore`] covers table reads/writes and file upload,
//! [`AuthSessions`] the external auth session, and [`ChangeFeed`] the
//! realtime change stream. They are implemented by the hosted-backend
//! binding (`checkin-store-rest`); higher layers (`checkin-feed`,
//! `checkin-tui`) depend on these abstractions, not on any concrete
//! service.

use std::future::Future;

use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::{
  comment::{Comment, NewComment},
  engagement::{Like, LikeIdentity},
  identity::{AuthUser, Profile, ProfilePatch},
  post::{Category, NewPost, NowPlaying, NowPlayingInput, Post},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`BlogStore::fetch_posts`]. Offset windows, not
/// cursors: concurrent inserts between pages can skip or repeat items,
/// which is accepted for a low-traffic personal blog.
#[derive(Debug, Clone)]
pub struct PostQuery {
  /// Restrict to one category; applied server-side together with the
  /// draft exclusion.
  pub category:       Option<Category>,
  pub offset:         u32,
  pub limit:          u32,
  /// Owner-only views may opt drafts in; every visitor-facing query
  /// leaves this `false`.
  pub include_drafts: bool,
}

impl Default for PostQuery {
  fn default() -> Self {
    Self { category: None, offset: 0, limit: 10, include_drafts: false }
  }
}

impl PostQuery {
  pub fn category(category: Category) -> Self {
    Self { category: Some(category), ..Self::default() }
  }

  pub fn window(mut self, offset: u32, limit: u32) -> Self {
    self.offset = offset;
    self.limit = limit;
    self
  }
}

/// A file destined for object storage.
#[derive(Debug, Clone)]
pub struct MediaUpload {
  /// Target bucket, e.g. "posts" or "avatars".
  pub bucket:       String,
  /// Path within the bucket, including the file name.
  pub path:         String,
  pub content_type: String,
  pub bytes:        Vec<u8>,
}

// ─── Change events ───────────────────────────────────────────────────────────

/// Tables the change feed can watch.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  serde::Serialize,
  serde::Deserialize,
  strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum WatchTable {
  Posts,
  Comments,
  NowPlaying,
}

/// What happened to a watched row.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
  Insert,
  Update,
  Delete,
}

/// What a subscriber wants to hear about: one logical channel per
/// (table, filter) pair.
#[derive(Debug, Clone)]
pub struct ChangeInterest {
  pub table:   WatchTable,
  pub kinds:   Vec<ChangeKind>,
  /// Restrict to rows referencing this post (comments channels).
  pub post_id: Option<Uuid>,
}

impl ChangeInterest {
  /// Every change to a table, unfiltered.
  pub fn table(table: WatchTable) -> Self {
    Self {
      table,
      kinds: vec![ChangeKind::Insert, ChangeKind::Update, ChangeKind::Delete],
      post_id: None,
    }
  }

  /// New comments on one post.
  pub fn comments_for(post_id: Uuid) -> Self {
    Self {
      table: WatchTable::Comments,
      kinds: vec![ChangeKind::Insert],
      post_id: Some(post_id),
    }
  }

  /// Whether an event matches this interest.
  pub fn matches(&self, event: &ChangeEvent) -> bool {
    if event.table != self.table || !self.kinds.contains(&event.kind) {
      return false;
    }
    match self.post_id {
      None => true,
      Some(id) => event
        .record
        .get("post_id")
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse::<Uuid>().ok())
        .is_some_and(|got| got == id),
    }
  }
}

/// An asynchronously delivered notification that a watched row was
/// inserted, updated or deleted. Delivery is at-least-once and
/// unordered; consumers must be idempotent.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ChangeEvent {
  pub table:  WatchTable,
  #[serde(rename = "event")]
  pub kind:   ChangeKind,
  /// The affected row as the backend serialized it. May be empty for
  /// deletes.
  #[serde(default)]
  pub record: serde_json::Value,
}

impl ChangeEvent {
  /// Decode the record as a comment, when this is a comments event.
  pub fn comment(&self) -> Option<Comment> {
    if self.table != WatchTable::Comments {
      return None;
    }
    serde_json::from_value(self.record.clone()).ok()
  }
}

/// A live change-feed channel. Dropping it closes the channel — a
/// correctness requirement, not an optimization: a subscription left
/// open past its view's lifetime leaks.
pub struct Subscription {
  events: mpsc::Receiver<ChangeEvent>,
  closer: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
  pub fn new(
    events: mpsc::Receiver<ChangeEvent>,
    closer: impl FnOnce() + Send + 'static,
  ) -> Self {
    Self { events, closer: Some(Box::new(closer)) }
  }

  /// Wait for the next event; `None` once the channel is closed.
  pub async fn recv(&mut self) -> Option<ChangeEvent> {
    self.events.recv().await
  }

  /// Drain without waiting; used by UI loops on their tick.
  pub fn try_recv(&mut self) -> Option<ChangeEvent> {
    self.events.try_recv().ok()
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(closer) = self.closer.take() {
      closer();
    }
  }
}

// ─── Auth session changes ────────────────────────────────────────────────────

/// Emitted by the auth service whenever the session changes.
#[derive(Debug, Clone)]
pub enum AuthChange {
  SignedIn(AuthUser),
  SignedOut,
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// Abstraction over the hosted backend's tables and object storage.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait BlogStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Posts ─────────────────────────────────────────────────────────────

  /// Fetch posts ordered by creation time descending, windowed by
  /// `query`.
  fn fetch_posts(
    &self,
    query: PostQuery,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  /// Fetch one post by id. `None` if it does not exist.
  fn fetch_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  fn insert_post(
    &self,
    user_id: Uuid,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  fn update_post(
    &self,
    id: Uuid,
    user_id: Uuid,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  /// Delete a post; the backend cascades to its likes and comments.
  fn delete_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Likes ─────────────────────────────────────────────────────────────

  /// All likes for the given posts, in one query.
  fn fetch_likes(
    &self,
    post_ids: Vec<Uuid>,
  ) -> impl Future<Output = Result<Vec<Like>, Self::Error>> + Send + '_;

  /// Insert a like. Returns `false` when the (post, identity) pair
  /// already exists — the store carries a uniqueness invariant on it,
  /// and a conflict means "already liked", not an error.
  fn insert_like(
    &self,
    post_id: Uuid,
    identity: LikeIdentity,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Remove the like keyed by (post, identity). Idempotent.
  fn delete_like(
    &self,
    post_id: Uuid,
    identity: LikeIdentity,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Comments ──────────────────────────────────────────────────────────

  /// All comments for a post, ordered by creation time ascending.
  fn fetch_comments(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Comment>, Self::Error>> + Send + '_;

  fn count_comments(
    &self,
    post_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn insert_comment(
    &self,
    input: NewComment,
  ) -> impl Future<Output = Result<Comment, Self::Error>> + Send + '_;

  // ── Profiles ──────────────────────────────────────────────────────────

  /// Fetch a profile by auth identity. `None` when the row is missing.
  fn fetch_profile(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  fn update_profile(
    &self,
    user_id: Uuid,
    patch: ProfilePatch,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  // ── Object storage ────────────────────────────────────────────────────

  /// Upload a file and return its public URL.
  fn upload(
    &self,
    upload: MediaUpload,
  ) -> impl Future<Output = Result<String, Self::Error>> + Send + '_;

  // ── Now playing ───────────────────────────────────────────────────────

  fn fetch_now_playing(
    &self,
  ) -> impl Future<Output = Result<Option<NowPlaying>, Self::Error>> + Send + '_;

  fn upsert_now_playing(
    &self,
    user_id: Uuid,
    input: NowPlayingInput,
  ) -> impl Future<Output = Result<NowPlaying, Self::Error>> + Send + '_;
}

/// Abstraction over the external auth service's session state.
pub trait AuthSessions: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The currently signed-in user, if any. A failure here must be
  /// treated as "no session" by callers — identity resolution never
  /// blocks rendering.
  fn current_user(
    &self,
  ) -> impl Future<Output = Result<Option<AuthUser>, Self::Error>> + Send + '_;

  /// Subscribe to sign-in / sign-out events.
  fn changes(&self) -> broadcast::Receiver<AuthChange>;
}

/// Abstraction over the realtime change-feed service.
pub trait ChangeFeed: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Open one logical channel for `interest`. The returned
  /// [`Subscription`] must be dropped when the owning view unmounts.
  fn subscribe(
    &self,
    interest: ChangeInterest,
  ) -> impl Future<Output = Result<Subscription, Self::Error>> + Send + '_;
}
