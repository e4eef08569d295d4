//! Comment — a reply to a post.
//!
//! Comments are write-once in this module: never edited, never deleted.
//! `parent_id` models threading in storage but no view renders it; the
//! field is kept as a forward-compatible column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Display name used when an anonymous commenter leaves the name blank.
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
  pub id:          Uuid,
  pub post_id:     Uuid,
  #[serde(default)]
  pub parent_id:   Option<Uuid>,
  #[serde(default)]
  pub user_id:     Option<Uuid>,
  #[serde(default)]
  pub author_name: Option<String>,
  pub content:     String,
  pub created_at:  DateTime<Utc>,
}

/// Input to comment submission. The id and timestamp are set by the
/// store; the engagement tracker resolves `author_name` and `user_id`
/// from the current identity before building this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewComment {
  pub post_id:     Uuid,
  #[serde(default)]
  pub parent_id:   Option<Uuid>,
  #[serde(default)]
  pub user_id:     Option<Uuid>,
  pub author_name: String,
  pub content:     String,
}
