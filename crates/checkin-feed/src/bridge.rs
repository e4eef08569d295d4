//! Realtime Refresh Bridge — change events turned into view refreshes.
//!
//! Two consumption patterns, matching how the views react:
//!
//! - [`TableWatch`]: any event on the channel marks the view dirty;
//!   the view re-runs its load. Re-fetching is idempotent, so
//!   duplicate or out-of-order delivery is harmless.
//! - [`CommentsWatch`]: insert events for one post's thread are
//!   appended directly to the in-memory list instead of re-fetching.
//!   Appends are deduplicated by comment id, so at-least-once
//!   delivery cannot double a comment.
//!
//! Dropping a watch drops its subscription, which closes the
//! underlying channel — subscriptions must not outlive their view.

use std::{collections::HashSet, sync::Arc};

use uuid::Uuid;

use checkin_core::{
  Error, Result,
  comment::Comment,
  store::{ChangeFeed, ChangeInterest, Subscription, WatchTable},
};

pub struct RefreshBridge<F> {
  feed: Arc<F>,
}

impl<F: ChangeFeed> RefreshBridge<F> {
  pub fn new(feed: Arc<F>) -> Self {
    Self { feed }
  }

  /// Watch every insert/update/delete on a table. The feed view uses
  /// this over `posts` to re-run its load on any change anywhere.
  pub async fn watch_table(&self, table: WatchTable) -> Result<TableWatch> {
    let sub = self
      .feed
      .subscribe(ChangeInterest::table(table))
      .await
      .map_err(Error::read)?;
    Ok(TableWatch { sub })
  }

  /// Watch new comments on one post's thread. `existing` seeds the
  /// dedup set with the comments already displayed.
  pub async fn watch_comments(
    &self,
    post_id: Uuid,
    existing: &[Comment],
  ) -> Result<CommentsWatch> {
    let sub = self
      .feed
      .subscribe(ChangeInterest::comments_for(post_id))
      .await
      .map_err(Error::read)?;
    Ok(CommentsWatch {
      sub,
      seen: existing.iter().map(|c| c.id).collect(),
    })
  }
}

// ─── Table watch ─────────────────────────────────────────────────────────────

/// Coarse invalidation: events are not diffed, they only mark the view
/// dirty.
pub struct TableWatch {
  sub: Subscription,
}

impl TableWatch {
  /// Drain pending events without waiting; `true` when the view should
  /// re-fetch. Collapses event bursts into one refresh.
  pub fn poll_dirty(&mut self) -> bool {
    let mut dirty = false;
    while self.sub.try_recv().is_some() {
      dirty = true;
    }
    dirty
  }

  /// Wait for the next event; `false` once the channel is gone.
  pub async fn changed(&mut self) -> bool {
    self.sub.recv().await.is_some()
  }
}

// ─── Comments watch ──────────────────────────────────────────────────────────

/// Direct append for an open thread, deduplicated by id.
pub struct CommentsWatch {
  sub:  Subscription,
  seen: HashSet<Uuid>,
}

impl CommentsWatch {
  /// Mark a comment as already displayed — used for the caller's own
  /// submissions, whose change events echo back.
  pub fn note(&mut self, id: Uuid) {
    self.seen.insert(id);
  }

  /// Drain pending insert events into the comments to append, in
  /// arrival order, skipping anything already seen.
  pub fn drain_new(&mut self) -> Vec<Comment> {
    let mut fresh = Vec::new();
    while let Some(event) = self.sub.try_recv() {
      let Some(comment) = event.comment() else {
        tracing::debug!("comment event without a decodable record");
        continue;
      };
      if self.seen.insert(comment.id) {
        fresh.push(comment);
      }
    }
    fresh
  }
}
