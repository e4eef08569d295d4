//! Behavioral tests for the feed & interaction layer, driven against
//! in-memory implementations of the core traits.

use std::{
  collections::HashMap,
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
};

use chrono::{Duration, Utc};
use tokio::sync::{Notify, broadcast, mpsc};
use uuid::Uuid;

use checkin_core::{
  Error,
  comment::{Comment, NewComment},
  engagement::{Like, LikeIdentity},
  identity::{AuthUser, Identity, Profile, ProfilePatch},
  post::{Category, NewPost, NowPlaying, NowPlayingInput, Post},
  store::{
    AuthChange, AuthSessions, BlogStore, ChangeEvent, ChangeFeed,
    ChangeInterest, ChangeKind, MediaUpload, PostQuery, Subscription,
    WatchTable,
  },
};

use crate::{
  authoring::{AuthoringWorkflow, PostDraft},
  bridge::RefreshBridge,
  engagement::EngagementTracker,
  feed::{FeedController, single_post},
  identity::IdentityResolver,
};

// ─── In-memory backend ───────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("memory backend failure")]
struct MemoryError;

#[derive(Default)]
struct Inner {
  posts:       Vec<Post>,
  likes:       Vec<Like>,
  comments:    Vec<Comment>,
  profiles:    HashMap<Uuid, Profile>,
  now_playing: Option<NowPlaying>,
  seq:         i64,
}

#[derive(Default)]
struct MemoryStore {
  inner:            Mutex<Inner>,
  fail_like_writes: AtomicBool,
  like_gate:        Mutex<Option<Arc<Notify>>>,
}

impl MemoryStore {
  fn seed_post(&self, category: Category, title: &str, is_draft: bool) -> Post {
    let mut inner = self.inner.lock().unwrap();
    inner.seq += 1;
    let created = Utc::now() + Duration::seconds(inner.seq);
    let post = Post {
      id: Uuid::new_v4(),
      user_id: None,
      category,
      title: title.to_string(),
      content: format!("{title} content"),
      hashtags: Vec::new(),
      image_urls: Vec::new(),
      video_urls: Vec::new(),
      weather: None,
      music: None,
      is_draft,
      created_at: created,
      updated_at: created,
    };
    inner.posts.push(post.clone());
    post
  }

  fn seed_like(&self, post_id: Uuid, identity: LikeIdentity) {
    let mut inner = self.inner.lock().unwrap();
    inner.likes.push(Like {
      id: Uuid::new_v4(),
      post_id,
      identity,
      created_at: Utc::now(),
    });
  }

  fn seed_owner(&self, user: &AuthUser) {
    let mut inner = self.inner.lock().unwrap();
    inner.profiles.insert(user.id, Profile {
      id:            user.id,
      username:      Some("owner".into()),
      avatar_url:    None,
      is_blog_owner: true,
      created_at:    Utc::now(),
    });
  }

  fn likes_for(&self, post_id: Uuid) -> usize {
    let inner = self.inner.lock().unwrap();
    inner.likes.iter().filter(|l| l.post_id == post_id).count()
  }

  fn post_count(&self) -> usize {
    self.inner.lock().unwrap().posts.len()
  }

  fn comment_count_sync(&self) -> usize {
    self.inner.lock().unwrap().comments.len()
  }
}

impl BlogStore for MemoryStore {
  type Error = MemoryError;

  async fn fetch_posts(
    &self,
    query: PostQuery,
  ) -> Result<Vec<Post>, MemoryError> {
    let inner = self.inner.lock().unwrap();
    let mut posts: Vec<Post> = inner
      .posts
      .iter()
      .filter(|p| query.include_drafts || !p.is_draft)
      .filter(|p| query.category.is_none_or(|c| p.category == c))
      .cloned()
      .collect();
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(
      posts
        .into_iter()
        .skip(query.offset as usize)
        .take(query.limit as usize)
        .collect(),
    )
  }

  async fn fetch_post(&self, id: Uuid) -> Result<Option<Post>, MemoryError> {
    let inner = self.inner.lock().unwrap();
    Ok(inner.posts.iter().find(|p| p.id == id).cloned())
  }

  async fn insert_post(
    &self,
    user_id: Uuid,
    input: NewPost,
  ) -> Result<Post, MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    inner.seq += 1;
    let created = Utc::now() + Duration::seconds(inner.seq);
    let post = Post {
      id: Uuid::new_v4(),
      user_id: Some(user_id),
      category: input.category,
      title: input.title,
      content: input.content,
      hashtags: input.hashtags,
      image_urls: input.image_urls,
      video_urls: input.video_urls,
      weather: input.weather,
      music: input.music,
      is_draft: input.is_draft,
      created_at: created,
      updated_at: created,
    };
    inner.posts.push(post.clone());
    Ok(post)
  }

  async fn update_post(
    &self,
    id: Uuid,
    user_id: Uuid,
    input: NewPost,
  ) -> Result<Post, MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    let post = inner
      .posts
      .iter_mut()
      .find(|p| p.id == id)
      .ok_or(MemoryError)?;
    post.user_id = Some(user_id);
    post.title = input.title;
    post.content = input.content;
    post.hashtags = input.hashtags;
    post.image_urls = input.image_urls;
    post.video_urls = input.video_urls;
    post.weather = input.weather;
    post.music = input.music;
    post.is_draft = input.is_draft;
    post.updated_at = Utc::now();
    Ok(post.clone())
  }

  async fn delete_post(&self, id: Uuid) -> Result<(), MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    inner.posts.retain(|p| p.id != id);
    // Cascade, as the backing store does.
    inner.likes.retain(|l| l.post_id != id);
    inner.comments.retain(|c| c.post_id != id);
    Ok(())
  }

  async fn fetch_likes(
    &self,
    post_ids: Vec<Uuid>,
  ) -> Result<Vec<Like>, MemoryError> {
    let inner = self.inner.lock().unwrap();
    Ok(
      inner
        .likes
        .iter()
        .filter(|l| post_ids.contains(&l.post_id))
        .cloned()
        .collect(),
    )
  }

  async fn insert_like(
    &self,
    post_id: Uuid,
    identity: LikeIdentity,
  ) -> Result<bool, MemoryError> {
    let gate = self.like_gate.lock().unwrap().clone();
    if let Some(gate) = gate {
      gate.notified().await;
    }
    if self.fail_like_writes.load(Ordering::SeqCst) {
      return Err(MemoryError);
    }
    let mut inner = self.inner.lock().unwrap();
    let exists = inner
      .likes
      .iter()
      .any(|l| l.post_id == post_id && l.identity == identity);
    if exists {
      return Ok(false);
    }
    inner.likes.push(Like {
      id: Uuid::new_v4(),
      post_id,
      identity,
      created_at: Utc::now(),
    });
    Ok(true)
  }

  async fn delete_like(
    &self,
    post_id: Uuid,
    identity: LikeIdentity,
  ) -> Result<(), MemoryError> {
    if self.fail_like_writes.load(Ordering::SeqCst) {
      return Err(MemoryError);
    }
    let mut inner = self.inner.lock().unwrap();
    inner
      .likes
      .retain(|l| !(l.post_id == post_id && l.identity == identity));
    Ok(())
  }

  async fn fetch_comments(
    &self,
    post_id: Uuid,
  ) -> Result<Vec<Comment>, MemoryError> {
    let inner = self.inner.lock().unwrap();
    let mut comments: Vec<Comment> = inner
      .comments
      .iter()
      .filter(|c| c.post_id == post_id)
      .cloned()
      .collect();
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(comments)
  }

  async fn count_comments(&self, post_id: Uuid) -> Result<u64, MemoryError> {
    let inner = self.inner.lock().unwrap();
    Ok(inner.comments.iter().filter(|c| c.post_id == post_id).count() as u64)
  }

  async fn insert_comment(
    &self,
    input: NewComment,
  ) -> Result<Comment, MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    inner.seq += 1;
    let comment = Comment {
      id: Uuid::new_v4(),
      post_id: input.post_id,
      parent_id: input.parent_id,
      user_id: input.user_id,
      author_name: Some(input.author_name),
      content: input.content,
      created_at: Utc::now() + Duration::seconds(inner.seq),
    };
    inner.comments.push(comment.clone());
    Ok(comment)
  }

  async fn fetch_profile(
    &self,
    user_id: Uuid,
  ) -> Result<Option<Profile>, MemoryError> {
    let inner = self.inner.lock().unwrap();
    Ok(inner.profiles.get(&user_id).cloned())
  }

  async fn update_profile(
    &self,
    user_id: Uuid,
    patch: ProfilePatch,
  ) -> Result<Profile, MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    let profile = inner.profiles.get_mut(&user_id).ok_or(MemoryError)?;
    if let Some(username) = patch.username {
      profile.username = Some(username);
    }
    if let Some(avatar_url) = patch.avatar_url {
      profile.avatar_url = Some(avatar_url);
    }
    Ok(profile.clone())
  }

  async fn upload(&self, upload: MediaUpload) -> Result<String, MemoryError> {
    Ok(format!("memory://{}/{}", upload.bucket, upload.path))
  }

  async fn fetch_now_playing(&self) -> Result<Option<NowPlaying>, MemoryError> {
    Ok(self.inner.lock().unwrap().now_playing.clone())
  }

  async fn upsert_now_playing(
    &self,
    user_id: Uuid,
    input: NowPlayingInput,
  ) -> Result<NowPlaying, MemoryError> {
    let mut inner = self.inner.lock().unwrap();
    let entry = NowPlaying {
      id: inner.now_playing.as_ref().map(|n| n.id).unwrap_or_else(Uuid::new_v4),
      user_id,
      track_id: input.track_id,
      kind: input.kind,
      title: input.title,
      artist: input.artist,
      embed_url: input.embed_url,
      updated_at: Utc::now(),
    };
    inner.now_playing = Some(entry.clone());
    Ok(entry)
  }
}

// ─── In-memory auth ──────────────────────────────────────────────────────────

struct MemoryAuth {
  user:    Mutex<Option<AuthUser>>,
  fail:    AtomicBool,
  changes: broadcast::Sender<AuthChange>,
}

impl Default for MemoryAuth {
  fn default() -> Self {
    let (changes, _) = broadcast::channel(16);
    Self { user: Mutex::new(None), fail: AtomicBool::new(false), changes }
  }
}

impl MemoryAuth {
  fn set_user(&self, user: Option<AuthUser>) {
    *self.user.lock().unwrap() = user.clone();
    let _ = self.changes.send(match user {
      Some(user) => AuthChange::SignedIn(user),
      None => AuthChange::SignedOut,
    });
  }
}

impl AuthSessions for MemoryAuth {
  type Error = MemoryError;

  async fn current_user(&self) -> Result<Option<AuthUser>, MemoryError> {
    if self.fail.load(Ordering::SeqCst) {
      return Err(MemoryError);
    }
    Ok(self.user.lock().unwrap().clone())
  }

  fn changes(&self) -> broadcast::Receiver<AuthChange> {
    self.changes.subscribe()
  }
}

// ─── In-memory change feed ───────────────────────────────────────────────────

#[derive(Default)]
struct MemoryFeed {
  channels: Mutex<Vec<(ChangeInterest, mpsc::Sender<ChangeEvent>)>>,
}

impl MemoryFeed {
  fn push(&self, event: ChangeEvent) {
    let channels = self.channels.lock().unwrap();
    for (interest, tx) in channels.iter() {
      if interest.matches(&event) {
        let _ = tx.try_send(event.clone());
      }
    }
  }
}

impl ChangeFeed for MemoryFeed {
  type Error = MemoryError;

  async fn subscribe(
    &self,
    interest: ChangeInterest,
  ) -> Result<Subscription, MemoryError> {
    let (tx, rx) = mpsc::channel(16);
    self.channels.lock().unwrap().push((interest, tx));
    Ok(Subscription::new(rx, || {}))
  }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

struct Harness {
  store:    Arc<MemoryStore>,
  auth:     Arc<MemoryAuth>,
  tracker:  Arc<EngagementTracker<MemoryStore>>,
  resolver: IdentityResolver<MemoryAuth, MemoryStore>,
  _dir:     tempfile::TempDir,
}

fn harness() -> Harness {
  let store = Arc::new(MemoryStore::default());
  let auth = Arc::new(MemoryAuth::default());
  let tracker = Arc::new(EngagementTracker::new(store.clone()));
  let dir = tempfile::tempdir().unwrap();
  let resolver = IdentityResolver::new(
    auth.clone(),
    store.clone(),
    dir.path().join("session"),
  );
  Harness { store, auth, tracker, resolver, _dir: dir }
}

impl Harness {
  fn feed(&self, category: Option<Category>) -> FeedController<MemoryStore> {
    FeedController::new(self.store.clone(), self.tracker.clone(), category)
  }

  fn workflow(&self) -> AuthoringWorkflow<MemoryAuth, MemoryStore> {
    AuthoringWorkflow::new(self.resolver.clone(), self.store.clone())
  }

  fn sign_in_owner(&self) -> AuthUser {
    let user = AuthUser { id: Uuid::new_v4(), email: "owner@example.com".into() };
    self.store.seed_owner(&user);
    self.auth.set_user(Some(user.clone()));
    user
  }

  fn sign_in_visitor(&self) -> AuthUser {
    let user =
      AuthUser { id: Uuid::new_v4(), email: "visitor@example.com".into() };
    self.auth.set_user(Some(user.clone()));
    user
  }
}

fn anonymous() -> Identity {
  Identity::Anonymous("anon_1_testtoken".into())
}

// ─── Feed controller ─────────────────────────────────────────────────────────

#[tokio::test]
async fn category_loads_are_filtered_and_newest_first() {
  let h = harness();
  h.store.seed_post(Category::Eat, "older ramen", false);
  h.store.seed_post(Category::Sleep, "nap", false);
  h.store.seed_post(Category::Eat, "draft pizza", true);
  h.store.seed_post(Category::Eat, "newer sushi", false);

  let mut feed = h.feed(Some(Category::Eat));
  feed.load(&anonymous()).await.unwrap();

  let posts = feed.posts();
  assert_eq!(posts.len(), 2);
  assert!(posts.iter().all(|p| p.category == Category::Eat && !p.is_draft));
  assert_eq!(posts[0].title, "newer sushi");
  assert_eq!(posts[1].title, "older ramen");
}

#[tokio::test]
async fn load_more_pages_without_duplicates() {
  let h = harness();
  for i in 0..25 {
    h.store.seed_post(Category::Life, &format!("post {i}"), false);
  }

  let mut feed = h.feed(None);
  feed.load(&anonymous()).await.unwrap();
  assert_eq!(feed.posts().len(), 10);
  assert!(feed.has_more());

  feed.load_more(&anonymous()).await.unwrap();
  assert_eq!(feed.posts().len(), 20);
  assert!(feed.has_more());

  feed.load_more(&anonymous()).await.unwrap();
  assert_eq!(feed.posts().len(), 25);
  assert!(!feed.has_more());

  let mut ids: Vec<Uuid> = feed.posts().iter().map(|p| p.id).collect();
  ids.sort();
  ids.dedup();
  assert_eq!(ids.len(), 25);
}

#[tokio::test]
async fn recent_posts_are_capped_and_skip_drafts() {
  let h = harness();
  for i in 0..7 {
    h.store.seed_post(Category::Life, &format!("post {i}"), false);
  }
  h.store.seed_post(Category::Life, "secret draft", true);

  let recent =
    crate::feed::recent_posts(h.store.as_ref(), crate::feed::RECENT_LIMIT)
      .await
      .unwrap();
  assert_eq!(recent.len(), 5);
  assert_eq!(recent[0].title, "post 6");
  assert!(recent.iter().all(|p| !p.is_draft));
}

#[tokio::test]
async fn single_post_missing_is_not_found() {
  let h = harness();
  let id = Uuid::new_v4();
  match single_post(h.store.as_ref(), id).await {
    Err(Error::NotFound(missing)) => assert_eq!(missing, id),
    other => panic!("expected NotFound, got {other:?}"),
  }
}

// ─── Engagement: likes ───────────────────────────────────────────────────────

#[tokio::test]
async fn double_toggle_returns_to_baseline() {
  let h = harness();
  let post = h.store.seed_post(Category::Play, "game night", false);
  let me = anonymous();

  h.tracker.hydrate(&me, &[post.id]).await.unwrap();
  let before = h.tracker.like_state(post.id);

  let liked = h.tracker.toggle_like(&me, post.id).await.unwrap();
  assert!(liked.liked);
  assert_eq!(liked.count, before.count + 1);
  assert_eq!(h.store.likes_for(post.id), 1);

  let unliked = h.tracker.toggle_like(&me, post.id).await.unwrap();
  assert_eq!(unliked, before);
  assert_eq!(h.store.likes_for(post.id), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_toggle_is_rejected_not_queued() {
  let h = harness();
  let post = h.store.seed_post(Category::Play, "speedrun", false);
  let me = anonymous();
  h.tracker.hydrate(&me, &[post.id]).await.unwrap();

  // Hold the first toggle's backing write open behind a gate.
  let gate = Arc::new(Notify::new());
  *h.store.like_gate.lock().unwrap() = Some(gate.clone());

  let tracker = h.tracker.clone();
  let me_clone = me.clone();
  let post_id = post.id;
  let first =
    tokio::spawn(async move { tracker.toggle_like(&me_clone, post_id).await });

  // Let the spawned toggle reach its await point.
  tokio::time::sleep(std::time::Duration::from_millis(50)).await;

  match h.tracker.toggle_like(&me, post.id).await {
    Err(Error::ToggleInFlight(id)) => assert_eq!(id, post.id),
    other => panic!("expected ToggleInFlight, got {other:?}"),
  }

  gate.notify_one();
  let state = first.await.unwrap().unwrap();
  assert!(state.liked);
  assert_eq!(h.store.likes_for(post.id), 1);
}

#[tokio::test]
async fn failed_like_write_reconciles_the_optimistic_count() {
  let h = harness();
  let post = h.store.seed_post(Category::Eat, "soup", false);
  let me = anonymous();
  h.tracker.hydrate(&me, &[post.id]).await.unwrap();

  h.store.fail_like_writes.store(true, Ordering::SeqCst);
  match h.tracker.toggle_like(&me, post.id).await {
    Err(Error::RemoteWrite(_)) => {}
    other => panic!("expected RemoteWrite, got {other:?}"),
  }

  // The inverse was re-applied: no phantom like left behind.
  let state = h.tracker.like_state(post.id);
  assert_eq!(state, Default::default());
  assert_eq!(h.store.likes_for(post.id), 0);

  // And the guard was released: the next toggle goes through.
  h.store.fail_like_writes.store(false, Ordering::SeqCst);
  assert!(h.tracker.toggle_like(&me, post.id).await.unwrap().liked);
}

#[tokio::test]
async fn conflicting_insert_counts_as_already_liked() {
  let h = harness();
  let post = h.store.seed_post(Category::Life, "milestone", false);
  let me = anonymous();
  h.tracker.hydrate(&me, &[post.id]).await.unwrap();

  // Another tab recorded the like after our hydration.
  h.store.seed_like(post.id, me.like_identity());

  let state = h.tracker.toggle_like(&me, post.id).await.unwrap();
  assert!(state.liked);
  assert_eq!(h.store.likes_for(post.id), 1);
}

#[tokio::test]
async fn anonymous_and_authenticated_likes_are_independent() {
  let h = harness();
  let post = h.store.seed_post(Category::Study, "rust book", false);
  let anon = anonymous();
  let visitor = Identity::Visitor(AuthUser {
    id:    Uuid::new_v4(),
    email: "visitor@example.com".into(),
  });

  // Anonymous viewer likes the post: 0 → 1.
  let anon_tracker = EngagementTracker::new(h.store.clone());
  anon_tracker.hydrate(&anon, &[post.id]).await.unwrap();
  let state = anon_tracker.toggle_like(&anon, post.id).await.unwrap();
  assert_eq!((state.count, state.liked), (1, true));

  // An authenticated visitor independently likes it: 1 → 2.
  let visitor_tracker = EngagementTracker::new(h.store.clone());
  visitor_tracker.hydrate(&visitor, &[post.id]).await.unwrap();
  let state = visitor_tracker.toggle_like(&visitor, post.id).await.unwrap();
  assert_eq!((state.count, state.liked), (2, true));

  // The anonymous viewer's state is unaffected: still liked, and a
  // re-hydration sees both likes.
  anon_tracker.invalidate(&[post.id]);
  anon_tracker.hydrate(&anon, &[post.id]).await.unwrap();
  let state = anon_tracker.like_state(post.id);
  assert_eq!((state.count, state.liked), (2, true));
}

#[tokio::test]
async fn hydration_is_skipped_until_invalidated() {
  let h = harness();
  let post = h.store.seed_post(Category::Life, "quiet day", false);
  let me = anonymous();

  h.tracker.hydrate(&me, &[post.id]).await.unwrap();
  assert_eq!(h.tracker.like_state(post.id).count, 0);

  // A like lands behind our back; a plain re-hydrate must not re-fetch.
  h.store.seed_like(post.id, LikeIdentity::User(Uuid::new_v4()));
  h.tracker.hydrate(&me, &[post.id]).await.unwrap();
  assert_eq!(h.tracker.like_state(post.id).count, 0);

  // After invalidation it does.
  h.tracker.invalidate(&[post.id]);
  h.tracker.hydrate(&me, &[post.id]).await.unwrap();
  assert_eq!(h.tracker.like_state(post.id).count, 1);
}

// ─── Engagement: comments ────────────────────────────────────────────────────

#[tokio::test]
async fn blank_comments_are_rejected_without_a_write() {
  let h = harness();
  let post = h.store.seed_post(Category::Eat, "bibimbap", false);
  let me = anonymous();

  for blank in ["", "   "] {
    match h.tracker.post_comment(&me, post.id, blank, None).await {
      Err(Error::Validation(_)) => {}
      other => panic!("expected Validation, got {other:?}"),
    }
  }
  assert_eq!(h.store.comment_count_sync(), 0);
}

#[tokio::test]
async fn comment_author_names_resolve_by_identity() {
  let h = harness();
  let post = h.store.seed_post(Category::Eat, "kimchi", false);

  let anon = anonymous();
  let named = h
    .tracker
    .post_comment(&anon, post.id, "looks great", Some(" maya "))
    .await
    .unwrap();
  assert_eq!(named.author_name.as_deref(), Some("maya"));
  assert_eq!(named.user_id, None);

  let nameless =
    h.tracker.post_comment(&anon, post.id, "me too", None).await.unwrap();
  assert_eq!(nameless.author_name.as_deref(), Some("Anonymous"));

  let user = h.sign_in_visitor();
  let visitor = Identity::Visitor(user.clone());
  let authed =
    h.tracker.post_comment(&visitor, post.id, "thanks!", None).await.unwrap();
  assert_eq!(authed.author_name.as_deref(), Some("Blog Owner"));
  assert_eq!(authed.user_id, Some(user.id));

  assert_eq!(h.tracker.comment_count(post.id).await.unwrap(), 3);
  let thread = h.tracker.comments(post.id).await.unwrap();
  assert_eq!(thread.len(), 3);
  assert!(thread.windows(2).all(|w| w[0].created_at <= w[1].created_at));
}

// ─── Identity resolver ───────────────────────────────────────────────────────

#[tokio::test]
async fn anonymous_token_is_stable_across_calls() {
  let h = harness();
  let first = h.resolver.anonymous_token();
  let second = h.resolver.anonymous_token();
  assert!(first.starts_with("anon_"));
  assert_eq!(first, second);
}

#[tokio::test]
async fn identity_resolution_degrades_to_anonymous() {
  let h = harness();

  // No session.
  assert!(matches!(
    h.resolver.current_identity().await,
    Identity::Anonymous(_)
  ));

  // Auth service down.
  h.auth.fail.store(true, Ordering::SeqCst);
  assert!(matches!(
    h.resolver.current_identity().await,
    Identity::Anonymous(_)
  ));
  h.auth.fail.store(false, Ordering::SeqCst);

  // Signed in without a profile row: a plain visitor, never the owner.
  let user = h.sign_in_visitor();
  match h.resolver.current_identity().await {
    Identity::Visitor(got) => assert_eq!(got.id, user.id),
    other => panic!("expected Visitor, got {other:?}"),
  }

  // Owner flag honoured once the profile says so.
  h.store.seed_owner(&user);
  assert!(h.resolver.current_identity().await.is_owner());
}

#[tokio::test]
async fn identity_stream_follows_auth_changes() {
  let h = harness();
  let mut stream = h.resolver.subscribe();

  let user = h.sign_in_owner();
  match stream.recv().await {
    Some(Identity::Owner(got)) => assert_eq!(got.id, user.id),
    other => panic!("expected Owner, got {other:?}"),
  }

  h.auth.set_user(None);
  assert!(matches!(stream.recv().await, Some(Identity::Anonymous(_))));
}

// ─── Authoring workflow ──────────────────────────────────────────────────────

#[tokio::test]
async fn sleep_posts_default_their_title_and_are_retrievable() {
  let h = harness();
  h.sign_in_owner();
  let workflow = h.workflow();

  let post = workflow
    .create_post(NewPost::new(Category::Sleep, "slept 8 hours"), PostDraft::default())
    .await
    .unwrap();
  assert_eq!(post.title, "Sleep Log");

  let mut feed = h.feed(Some(Category::Sleep));
  feed.load(&anonymous()).await.unwrap();
  assert!(feed.posts().iter().any(|p| p.id == post.id));
}

#[tokio::test]
async fn non_owners_cannot_author() {
  let h = harness();
  let workflow = h.workflow();

  // Anonymous.
  match workflow
    .create_post(NewPost::new(Category::Eat, "hi"), PostDraft::default())
    .await
  {
    Err(Error::Authorization(_)) => {}
    other => panic!("expected Authorization, got {other:?}"),
  }

  // Authenticated but not the owner.
  h.sign_in_visitor();
  match workflow
    .create_post(NewPost::new(Category::Eat, "hi"), PostDraft::default())
    .await
  {
    Err(Error::Authorization(_)) => {}
    other => panic!("expected Authorization, got {other:?}"),
  }

  assert_eq!(h.store.post_count(), 0);
}

#[tokio::test]
async fn empty_content_is_rejected_before_any_write() {
  let h = harness();
  h.sign_in_owner();
  let workflow = h.workflow();

  match workflow
    .create_post(NewPost::new(Category::Life, "   "), PostDraft::default())
    .await
  {
    Err(Error::Validation(_)) => {}
    other => panic!("expected Validation, got {other:?}"),
  }
  assert_eq!(h.store.post_count(), 0);
}

#[tokio::test]
async fn attachments_upload_before_the_post_is_written() {
  let h = harness();
  h.sign_in_owner();
  let workflow = h.workflow();

  let draft = PostDraft {
    images: vec![MediaUpload {
      bucket:       "posts".into(),
      path:         "images/1_abc.png".into(),
      content_type: "image/png".into(),
      bytes:        vec![0xde, 0xad],
    }],
    videos: Vec::new(),
  };
  let post = workflow
    .create_post(NewPost::new(Category::Play, "park day"), draft)
    .await
    .unwrap();
  assert_eq!(post.image_urls, vec!["memory://posts/images/1_abc.png"]);
}

#[tokio::test]
async fn delete_cascades_and_update_preserves_identity_of_the_row() {
  let h = harness();
  h.sign_in_owner();
  let workflow = h.workflow();

  let post = workflow
    .create_post(NewPost::new(Category::Eat, "tacos"), PostDraft::default())
    .await
    .unwrap();
  h.store.seed_like(post.id, LikeIdentity::User(Uuid::new_v4()));
  h.tracker
    .post_comment(&anonymous(), post.id, "yum", None)
    .await
    .unwrap();

  let mut edited = NewPost::new(Category::Eat, "tacos, corrected");
  edited.title = "Taco Tuesday".into();
  let updated =
    workflow.update_post(post.id, edited, PostDraft::default()).await.unwrap();
  assert_eq!(updated.id, post.id);
  assert_eq!(updated.title, "Taco Tuesday");

  workflow.delete_post(post.id).await.unwrap();
  assert_eq!(h.store.post_count(), 0);
  assert_eq!(h.store.likes_for(post.id), 0);
  assert_eq!(h.store.comment_count_sync(), 0);
}

#[tokio::test]
async fn now_playing_upsert_is_owner_gated() {
  let h = harness();
  let workflow = h.workflow();

  let input = NowPlayingInput {
    track_id:  "4uLU6hMCjMI75M1A2tKUQC".into(),
    kind:      checkin_core::post::TrackKind::Track,
    title:     "Time".into(),
    artist:    Some("Pink Floyd".into()),
    embed_url: "https://open.spotify.com/embed/track/4uLU6hMCjMI75M1A2tKUQC".into(),
  };

  match workflow.set_now_playing(input.clone()).await {
    Err(Error::Authorization(_)) => {}
    other => panic!("expected Authorization, got {other:?}"),
  }

  let owner = h.sign_in_owner();
  let entry = workflow.set_now_playing(input).await.unwrap();
  assert_eq!(entry.user_id, owner.id);
  assert_eq!(entry.title, "Time");

  // Replacing keeps a single row.
  let replacement = NowPlayingInput {
    track_id:  "37i9dQZF1DX4WY".into(),
    kind:      checkin_core::post::TrackKind::Playlist,
    title:     "Focus".into(),
    artist:    None,
    embed_url: "https://open.spotify.com/embed/playlist/37i9dQZF1DX4WY".into(),
  };
  let replaced = workflow.set_now_playing(replacement).await.unwrap();
  assert_eq!(replaced.id, entry.id);
  assert_eq!(replaced.title, "Focus");
}

// ─── Realtime bridge ─────────────────────────────────────────────────────────

#[tokio::test]
async fn a_posts_insert_event_refreshes_the_mounted_feed() {
  let h = harness();
  h.store.seed_post(Category::Life, "first", false);

  let mut feed = h.feed(None);
  feed.load(&anonymous()).await.unwrap();
  assert_eq!(feed.posts().len(), 1);

  let changes = Arc::new(MemoryFeed::default());
  let bridge = RefreshBridge::new(changes.clone());
  let mut watch = bridge.watch_table(WatchTable::Posts).await.unwrap();

  // A new post lands and its change event arrives.
  let newest = h.store.seed_post(Category::Life, "breaking news", false);
  changes.push(ChangeEvent {
    table:  WatchTable::Posts,
    kind:   ChangeKind::Insert,
    record: serde_json::json!({ "id": newest.id }),
  });

  assert!(watch.poll_dirty());
  feed.load(&anonymous()).await.unwrap();
  assert_eq!(feed.posts()[0].id, newest.id);

  // No further events: nothing to do.
  assert!(!watch.poll_dirty());
}

#[tokio::test]
async fn comment_events_append_once_even_when_delivered_twice() {
  let h = harness();
  let post = h.store.seed_post(Category::Study, "notes", false);
  let existing = h
    .tracker
    .post_comment(&anonymous(), post.id, "first!", None)
    .await
    .unwrap();

  let changes = Arc::new(MemoryFeed::default());
  let bridge = RefreshBridge::new(changes.clone());
  let mut watch =
    bridge.watch_comments(post.id, &[existing.clone()]).await.unwrap();

  let fresh = h
    .tracker
    .post_comment(&anonymous(), post.id, "second", None)
    .await
    .unwrap();
  let event = ChangeEvent {
    table:  WatchTable::Comments,
    kind:   ChangeKind::Insert,
    record: serde_json::to_value(&fresh).unwrap(),
  };

  // At-least-once delivery: the same insert arrives twice, plus a
  // replay of a comment already displayed.
  changes.push(event.clone());
  changes.push(event);
  changes.push(ChangeEvent {
    table:  WatchTable::Comments,
    kind:   ChangeKind::Insert,
    record: serde_json::to_value(&existing).unwrap(),
  });

  let appended = watch.drain_new();
  assert_eq!(appended.len(), 1);
  assert_eq!(appended[0].id, fresh.id);

  // Events for other posts never reach this watch.
  let other = h.store.seed_post(Category::Study, "other", false);
  let stray = h
    .tracker
    .post_comment(&anonymous(), other.id, "elsewhere", None)
    .await
    .unwrap();
  changes.push(ChangeEvent {
    table:  WatchTable::Comments,
    kind:   ChangeKind::Insert,
    record: serde_json::to_value(&stray).unwrap(),
  });
  assert!(watch.drain_new().is_empty());
}

#[tokio::test]
async fn profile_updates_can_carry_an_avatar_upload() {
  let h = harness();
  h.sign_in_owner();
  let workflow = h.workflow();

  let avatar = MediaUpload {
    bucket:       "avatars".into(),
    path:         "1_abc.png".into(),
    content_type: "image/png".into(),
    bytes:        vec![1],
  };
  let profile = workflow
    .update_own_profile(
      ProfilePatch { username: Some("daily".into()), avatar_url: None },
      Some(avatar),
    )
    .await
    .unwrap();
  assert_eq!(profile.username.as_deref(), Some("daily"));
  assert_eq!(profile.avatar_url.as_deref(), Some("memory://avatars/1_abc.png"));
}
