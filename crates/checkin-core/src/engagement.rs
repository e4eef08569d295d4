//! Like records and the per-post engagement summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Identity axis ───────────────────────────────────────────────────────────

/// Who a like belongs to: an authenticated user or an anonymous
/// session. Exactly one of the two, never both — the tagged union
/// replaces the nullable-column pair the backend stores.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum LikeIdentity {
  User(Uuid),
  Session(String),
}

// ─── Like ────────────────────────────────────────────────────────────────────

/// A single engagement record. Created and destroyed exclusively by
/// the toggle-like operation; at most one per (post, identity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Like {
  pub id:         Uuid,
  pub post_id:    Uuid,
  pub identity:   LikeIdentity,
  pub created_at: DateTime<Utc>,
}

// ─── LikeState ───────────────────────────────────────────────────────────────

/// The engagement summary a view renders for one post: total count
/// plus whether the *current* identity has liked it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LikeState {
  pub count: u64,
  pub liked: bool,
}

impl LikeState {
  /// Fold a batch of likes for one post against the viewing identity.
  pub fn from_likes<'a>(
    likes: impl IntoIterator<Item = &'a Like>,
    viewer: &LikeIdentity,
  ) -> Self {
    let mut state = LikeState::default();
    for like in likes {
      state.count += 1;
      if &like.identity == viewer {
        state.liked = true;
      }
    }
    state
  }
}
