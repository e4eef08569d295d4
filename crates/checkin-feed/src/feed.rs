//! Post Feed Controller — offset-paginated loading with engagement
//! hydration.
//!
//! Pagination is stateless per call (offset = posts held so far), so
//! writes that land between pages can skip or repeat items; accepted
//! for a low-traffic personal blog. Against an unchanged store,
//! `load_more` never appends a post already held — appends are
//! deduplicated by id.

use std::{collections::HashSet, sync::Arc};

use uuid::Uuid;

use checkin_core::{
  Error, Result,
  identity::Identity,
  post::{Category, Post},
  store::{BlogStore, PostQuery},
};

use crate::engagement::EngagementTracker;

/// Posts fetched per page.
pub const PAGE_SIZE: u32 = 10;

/// How many posts the recent-activity rail shows.
pub const RECENT_LIMIT: u32 = 5;

pub struct FeedController<S> {
  store:    Arc<S>,
  tracker:  Arc<EngagementTracker<S>>,
  category: Option<Category>,
  posts:    Vec<Post>,
  has_more: bool,
}

impl<S: BlogStore> FeedController<S> {
  /// A feed over all categories, or over one when `category` is set.
  pub fn new(
    store: Arc<S>,
    tracker: Arc<EngagementTracker<S>>,
    category: Option<Category>,
  ) -> Self {
    Self { store, tracker, category, posts: Vec::new(), has_more: true }
  }

  pub fn posts(&self) -> &[Post] {
    &self.posts
  }

  pub fn has_more(&self) -> bool {
    self.has_more
  }

  pub fn category(&self) -> Option<Category> {
    self.category
  }

  /// (Re)load the first page, replacing the held sequence. On failure
  /// the feed falls back to empty rather than blocking the view, and
  /// the error is returned for an inline message.
  pub async fn load(&mut self, identity: &Identity) -> Result<()> {
    match self.fetch_page(0).await {
      Ok(page) => {
        self.has_more = page.len() as u32 == PAGE_SIZE;
        self.posts = page;
        self.hydrate_new(identity, 0).await;
        Ok(())
      }
      Err(e) => {
        self.posts.clear();
        self.has_more = false;
        Err(e)
      }
    }
  }

  /// Fetch the next offset window and append it, preserving order.
  /// A short page means the feed is exhausted.
  pub async fn load_more(&mut self, identity: &Identity) -> Result<()> {
    let already = self.posts.len();
    let page = self.fetch_page(already as u32).await?;
    self.has_more = page.len() as u32 == PAGE_SIZE;

    // Inserts between pages can shift the window backwards; never
    // append something already held.
    let held: HashSet<Uuid> = self.posts.iter().map(|p| p.id).collect();
    self.posts.extend(page.into_iter().filter(|p| !held.contains(&p.id)));

    self.hydrate_new(identity, already).await;
    Ok(())
  }

  async fn fetch_page(&self, offset: u32) -> Result<Vec<Post>> {
    let query = match self.category {
      Some(category) => PostQuery::category(category),
      None => PostQuery::default(),
    }
    .window(offset, PAGE_SIZE);
    self.store.fetch_posts(query).await.map_err(Error::read)
  }

  /// Hydrate engagement for the posts appended at `from` onwards — and
  /// only those; the tracker skips anything still hydrated.
  async fn hydrate_new(&self, identity: &Identity, from: usize) {
    let ids: Vec<Uuid> = self.posts[from..].iter().map(|p| p.id).collect();
    if ids.is_empty() {
      return;
    }
    if let Err(e) = self.tracker.hydrate(identity, &ids).await {
      tracing::warn!(error = %e, "engagement hydration failed");
    }
  }
}

/// One post by id, for the single-post view. A missing row is
/// [`Error::NotFound`], rendered as the dedicated not-found view.
pub async fn single_post<S: BlogStore>(store: &S, id: Uuid) -> Result<Post> {
  store
    .fetch_post(id)
    .await
    .map_err(Error::read)?
    .ok_or(Error::NotFound(id))
}

/// The latest non-draft posts across all categories, for the
/// recent-activity rail.
pub async fn recent_posts<S: BlogStore>(
  store: &S,
  limit: u32,
) -> Result<Vec<Post>> {
  let query = PostQuery::default().window(0, limit);
  store.fetch_posts(query).await.map_err(Error::read)
}
