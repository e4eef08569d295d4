//! Post — a categorized journal entry, plus its optional attachments.
//!
//! A post carries everything the owner captured at writing time: the
//! entry itself, media URLs, and optional weather / music snapshots.
//! Snapshots are frozen at creation; they are never refreshed from the
//! providers afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Category ────────────────────────────────────────────────────────────────

/// The fixed set of journal categories.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumIter,
  strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
  Eat,
  Sleep,
  Study,
  Play,
  Life,
}

impl Category {
  /// The title used when the author leaves the field empty. Sleep
  /// entries never have a title input at all.
  pub fn default_title(self) -> &'static str {
    match self {
      Category::Sleep => "Sleep Log",
      _ => "Untitled",
    }
  }
}

// ─── Attachments ─────────────────────────────────────────────────────────────

/// Weather captured when the post was written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
  /// Rounded temperature in °C.
  pub temp:      i32,
  pub location:  String,
  /// Display emoji for the condition.
  pub icon:      String,
  pub condition: String,
}

/// Music the author attached to the post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicSnapshot {
  pub title:    String,
  #[serde(default)]
  pub artist:   Option<String>,
  /// Provider name, e.g. "spotify".
  #[serde(default)]
  pub source:   Option<String>,
  /// The provider's identifier for the track.
  #[serde(default)]
  pub track_id: Option<String>,
}

// ─── Post ────────────────────────────────────────────────────────────────────

/// A journal entry as stored by the backend.
///
/// `category` is immutable after creation in normal flow; draft posts
/// are excluded from every visitor-facing query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
  pub id:         Uuid,
  pub user_id:    Option<Uuid>,
  pub category:   Category,
  pub title:      String,
  pub content:    String,
  #[serde(default)]
  pub hashtags:   Vec<String>,
  #[serde(default)]
  pub image_urls: Vec<String>,
  #[serde(default)]
  pub video_urls: Vec<String>,
  #[serde(default)]
  pub weather:    Option<WeatherSnapshot>,
  #[serde(default)]
  pub music:      Option<MusicSnapshot>,
  #[serde(default)]
  pub is_draft:   bool,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

// ─── NewPost ─────────────────────────────────────────────────────────────────

/// Input to post creation and update. Timestamps and the id are set by
/// the store; `user_id` is stamped by the authoring workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPost {
  pub category:   Category,
  /// May be empty; resolved against [`Category::default_title`] before
  /// the write.
  #[serde(default)]
  pub title:      String,
  pub content:    String,
  #[serde(default)]
  pub hashtags:   Vec<String>,
  #[serde(default)]
  pub image_urls: Vec<String>,
  #[serde(default)]
  pub video_urls: Vec<String>,
  #[serde(default)]
  pub weather:    Option<WeatherSnapshot>,
  #[serde(default)]
  pub music:      Option<MusicSnapshot>,
  #[serde(default)]
  pub is_draft:   bool,
}

impl NewPost {
  /// Minimal input for a category and body; everything else default.
  pub fn new(category: Category, content: impl Into<String>) -> Self {
    Self {
      category,
      title: String::new(),
      content: content.into(),
      hashtags: Vec::new(),
      image_urls: Vec::new(),
      video_urls: Vec::new(),
      weather: None,
      music: None,
      is_draft: false,
    }
  }

  /// The title that will actually be written: the author's, or the
  /// category default when the field is blank.
  pub fn resolved_title(&self) -> String {
    let trimmed = self.title.trim();
    if trimmed.is_empty() {
      self.category.default_title().to_string()
    } else {
      trimmed.to_string()
    }
  }
}

/// Split a free-text hashtag line into tags: whitespace-separated,
/// leading `#` stripped, empties dropped.
pub fn parse_hashtags(raw: &str) -> Vec<String> {
  raw
    .split_whitespace()
    .map(|tag| tag.trim_start_matches('#'))
    .filter(|tag| !tag.is_empty())
    .map(str::to_string)
    .collect()
}

// ─── Now playing ─────────────────────────────────────────────────────────────

/// What kind of thing a music link points at.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TrackKind {
  Track,
  Playlist,
  Album,
}

/// The owner's single "currently listening" row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlaying {
  pub id:         Uuid,
  pub user_id:    Uuid,
  pub track_id:   String,
  pub kind:       TrackKind,
  pub title:      String,
  #[serde(default)]
  pub artist:     Option<String>,
  pub embed_url:  String,
  pub updated_at: DateTime<Utc>,
}

/// Input to the now-playing upsert. `user_id` is stamped by the
/// authoring workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NowPlayingInput {
  pub track_id:  String,
  pub kind:      TrackKind,
  pub title:     String,
  #[serde(default)]
  pub artist:    Option<String>,
  pub embed_url: String,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sleep_posts_default_to_sleep_log() {
    let input = NewPost::new(Category::Sleep, "slept 8h");
    assert_eq!(input.resolved_title(), "Sleep Log");
  }

  #[test]
  fn other_categories_default_to_untitled() {
    let input = NewPost::new(Category::Eat, "ramen");
    assert_eq!(input.resolved_title(), "Untitled");
  }

  #[test]
  fn explicit_title_survives_resolution() {
    let mut input = NewPost::new(Category::Play, "beat the boss");
    input.title = "  Game night  ".into();
    assert_eq!(input.resolved_title(), "Game night");
  }

  #[test]
  fn hashtags_split_and_strip() {
    assert_eq!(
      parse_hashtags("#foodie  restaurant #  #yummy"),
      vec!["foodie", "restaurant", "yummy"]
    );
    assert!(parse_hashtags("   ").is_empty());
  }

  #[test]
  fn category_serde_is_lowercase() {
    assert_eq!(serde_json::to_string(&Category::Life).unwrap(), "\"life\"");
    let parsed: Category = serde_json::from_str("\"sleep\"").unwrap();
    assert_eq!(parsed, Category::Sleep);
  }
}
