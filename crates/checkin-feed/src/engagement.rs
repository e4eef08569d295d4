//! Engagement Tracker — like counts/states and comment threads.
//!
//! Like state is hydrated in batches and cached per post; a post is
//! only re-fetched after an explicit invalidation (driven by realtime
//! events). Toggling is optimistic with a per-post in-flight guard and
//! reconciles by re-applying the inverse if the backing write fails.

use std::{
  collections::{HashMap, HashSet},
  sync::{Arc, Mutex},
};

use uuid::Uuid;

use checkin_core::{
  Error, Result,
  comment::{Comment, NewComment},
  engagement::{Like, LikeState},
  identity::Identity,
  store::BlogStore,
};

// ─── State ───────────────────────────────────────────────────────────────────

#[derive(Default)]
struct EngagementState {
  likes:     HashMap<Uuid, LikeState>,
  hydrated:  HashSet<Uuid>,
  in_flight: HashSet<Uuid>,
}

/// Clears the in-flight mark even when the toggle future is dropped
/// mid-await, so an abandoned toggle cannot wedge its post.
struct InFlightGuard<'a> {
  state:   &'a Mutex<EngagementState>,
  post_id: Uuid,
}

impl Drop for InFlightGuard<'_> {
  fn drop(&mut self) {
    self
      .state
      .lock()
      .expect("engagement lock poisoned")
      .in_flight
      .remove(&self.post_id);
  }
}

// ─── Tracker ─────────────────────────────────────────────────────────────────

pub struct EngagementTracker<S> {
  store: Arc<S>,
  state: Mutex<EngagementState>,
}

impl<S: BlogStore> EngagementTracker<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, state: Mutex::new(EngagementState::default()) }
  }

  // ── Likes ─────────────────────────────────────────────────────────────

  /// Batch-fetch like state for the given posts, skipping any that are
  /// already hydrated. One likes query for the whole set, partitioned
  /// client-side against `identity`.
  pub async fn hydrate(
    &self,
    identity: &Identity,
    post_ids: &[Uuid],
  ) -> Result<()> {
    let missing: Vec<Uuid> = {
      let state = self.state.lock().expect("engagement lock poisoned");
      post_ids
        .iter()
        .copied()
        .filter(|id| !state.hydrated.contains(id))
        .collect()
    };
    if missing.is_empty() {
      return Ok(());
    }

    let likes = self
      .store
      .fetch_likes(missing.clone())
      .await
      .map_err(Error::read)?;

    let viewer = identity.like_identity();
    let mut grouped: HashMap<Uuid, Vec<&Like>> =
      missing.iter().map(|id| (*id, Vec::new())).collect();
    for like in &likes {
      grouped.entry(like.post_id).or_default().push(like);
    }

    let mut state = self.state.lock().expect("engagement lock poisoned");
    for (id, likes) in grouped {
      state.likes.insert(id, LikeState::from_likes(likes, &viewer));
      state.hydrated.insert(id);
    }
    Ok(())
  }

  /// The cached state for one post; zero/unliked when never hydrated.
  pub fn like_state(&self, post_id: Uuid) -> LikeState {
    self
      .state
      .lock()
      .expect("engagement lock poisoned")
      .likes
      .get(&post_id)
      .copied()
      .unwrap_or_default()
  }

  /// Forget hydration for the given posts so the next [`Self::hydrate`]
  /// re-fetches them. Driven by realtime invalidation.
  pub fn invalidate(&self, post_ids: &[Uuid]) {
    let mut state = self.state.lock().expect("engagement lock poisoned");
    for id in post_ids {
      state.hydrated.remove(id);
    }
  }

  pub fn invalidate_all(&self) {
    let mut state = self.state.lock().expect("engagement lock poisoned");
    state.hydrated.clear();
  }

  /// Toggle the current identity's like on a post.
  ///
  /// The local count mutates before the backing write; on write
  /// failure the inverse is re-applied and the error surfaced. While a
  /// toggle is in flight, further toggles for the same post are
  /// rejected with [`Error::ToggleInFlight`].
  pub async fn toggle_like(
    &self,
    identity: &Identity,
    post_id: Uuid,
  ) -> Result<LikeState> {
    let was_liked = {
      let mut state = self.state.lock().expect("engagement lock poisoned");
      if !state.in_flight.insert(post_id) {
        return Err(Error::ToggleInFlight(post_id));
      }
      let entry = state.likes.entry(post_id).or_default();
      let was_liked = entry.liked;
      // Optimistic flip before the write is confirmed.
      entry.liked = !was_liked;
      if was_liked {
        entry.count = entry.count.saturating_sub(1);
      } else {
        entry.count += 1;
      }
      was_liked
    };
    let _guard = InFlightGuard { state: &self.state, post_id };

    let viewer = identity.like_identity();
    let result = if was_liked {
      self.store.delete_like(post_id, viewer).await.map(|()| true)
    } else {
      self.store.insert_like(post_id, viewer).await
    };

    match result {
      Ok(inserted) => {
        if !inserted {
          // Uniqueness conflict: another session already recorded this
          // like. The optimistic count already covers it.
          tracing::debug!(%post_id, "like already existed");
        }
        Ok(self.like_state(post_id))
      }
      Err(e) => {
        // Reconcile: undo the optimistic flip, then surface the error.
        {
          let mut state = self.state.lock().expect("engagement lock poisoned");
          let entry = state.likes.entry(post_id).or_default();
          entry.liked = was_liked;
          if was_liked {
            entry.count += 1;
          } else {
            entry.count = entry.count.saturating_sub(1);
          }
        }
        Err(Error::write(e))
      }
    }
  }

  // ── Comments ──────────────────────────────────────────────────────────

  pub async fn comment_count(&self, post_id: Uuid) -> Result<u64> {
    self.store.count_comments(post_id).await.map_err(Error::read)
  }

  /// The full thread for a post, creation-ascending.
  pub async fn comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
    self.store.fetch_comments(post_id).await.map_err(Error::read)
  }

  /// Submit a comment as the current identity. Content is trimmed and
  /// must be non-empty; the display name resolves to the owner label
  /// for authenticated actors, else the provided name or "Anonymous".
  pub async fn post_comment(
    &self,
    identity: &Identity,
    post_id: Uuid,
    content: &str,
    display_name: Option<&str>,
  ) -> Result<Comment> {
    let content = content.trim();
    if content.is_empty() {
      return Err(Error::Validation("comment cannot be empty".into()));
    }

    let input = NewComment {
      post_id,
      parent_id: None,
      user_id: identity.user().map(|u| u.id),
      author_name: identity.comment_author(display_name),
      content: content.to_string(),
    };
    self.store.insert_comment(input).await.map_err(Error::write)
  }
}
