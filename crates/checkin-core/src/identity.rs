//! Identity — who is looking at the blog right now.
//!
//! Three possibilities: the blog owner, an authenticated visitor, or
//! an anonymous visitor carrying a locally persisted session token.
//! The single `is_blog_owner` flag on [`Profile`] is the entire
//! authorization model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{comment::ANONYMOUS_AUTHOR, engagement::LikeIdentity};

/// The fixed label shown for comments by any authenticated user.
pub const OWNER_DISPLAY_NAME: &str = "Blog Owner";

// ─── Auth user ───────────────────────────────────────────────────────────────

/// The external auth service's view of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
  pub id:    Uuid,
  pub email: String,
}

// ─── Profile ─────────────────────────────────────────────────────────────────

/// One row per authenticated user; `id` matches the auth identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
  pub id:            Uuid,
  #[serde(default)]
  pub username:      Option<String>,
  #[serde(default)]
  pub avatar_url:    Option<String>,
  #[serde(default)]
  pub is_blog_owner: bool,
  pub created_at:    DateTime<Utc>,
}

/// Partial profile update (own row only).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfilePatch {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub username:   Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub avatar_url: Option<String>,
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// The resolved actor for the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
  /// The single identity whose profile carries `is_blog_owner`.
  Owner(AuthUser),
  /// Signed in, but not the owner.
  Visitor(AuthUser),
  /// Not signed in; the token scopes this visitor's likes.
  Anonymous(String),
}

impl Identity {
  pub fn is_owner(&self) -> bool {
    matches!(self, Identity::Owner(_))
  }

  /// The authenticated user, if any.
  pub fn user(&self) -> Option<&AuthUser> {
    match self {
      Identity::Owner(user) | Identity::Visitor(user) => Some(user),
      Identity::Anonymous(_) => None,
    }
  }

  /// The axis this identity's likes are keyed by.
  pub fn like_identity(&self) -> LikeIdentity {
    match self {
      Identity::Owner(user) | Identity::Visitor(user) => {
        LikeIdentity::User(user.id)
      }
      Identity::Anonymous(token) => LikeIdentity::Session(token.clone()),
    }
  }

  /// The display name to stamp on a comment: the fixed owner label for
  /// any authenticated actor, else the provided free-text name or
  /// "Anonymous".
  pub fn comment_author(&self, provided: Option<&str>) -> String {
    match self {
      Identity::Owner(_) | Identity::Visitor(_) => OWNER_DISPLAY_NAME.to_string(),
      Identity::Anonymous(_) => {
        let name = provided.map(str::trim).unwrap_or_default();
        if name.is_empty() {
          ANONYMOUS_AUTHOR.to_string()
        } else {
          name.to_string()
        }
      }
    }
  }
}
