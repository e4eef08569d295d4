//! [`RestStore`] — the hosted-backend implementation of
//! [`checkin_core::store::BlogStore`].
//!
//! Tables are addressed through the backend's filterable REST surface:
//! `eq.`/`in.` filters, `order=col.direction`, `limit`/`offset`
//! windows, and `Prefer: return=representation` on writes that need
//! the stored row back.

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use checkin_core::{
  comment::{Comment, NewComment},
  engagement::{Like, LikeIdentity},
  identity::{Profile, ProfilePatch},
  post::{
    Category, MusicSnapshot, NewPost, NowPlaying, NowPlayingInput, Post,
    TrackKind, WeatherSnapshot,
  },
  store::{BlogStore, MediaUpload, PostQuery},
};

use crate::{
  client::RestClient,
  error::{Error, Result},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// Table/storage access against the hosted backend.
///
/// Cheap to clone — see [`RestClient`].
#[derive(Clone)]
pub struct RestStore {
  client: RestClient,
}

impl RestStore {
  pub fn new(client: RestClient) -> Self {
    Self { client }
  }
}

// ─── Wire rows ───────────────────────────────────────────────────────────────

/// Post fields as written to the backend. Timestamps default server
/// side on insert; updates touch `updated_at` explicitly.
#[derive(Debug, Serialize)]
struct PostWrite {
  user_id:    Uuid,
  category:   Category,
  title:      String,
  content:    String,
  hashtags:   Vec<String>,
  image_urls: Vec<String>,
  video_urls: Vec<String>,
  weather:    Option<WeatherSnapshot>,
  music:      Option<MusicSnapshot>,
  is_draft:   bool,
  #[serde(skip_serializing_if = "Option::is_none")]
  updated_at: Option<DateTime<Utc>>,
}

impl PostWrite {
  fn from_input(user_id: Uuid, input: NewPost, touch_updated: bool) -> Self {
    Self {
      user_id,
      category: input.category,
      title: input.title,
      content: input.content,
      hashtags: input.hashtags,
      image_urls: input.image_urls,
      video_urls: input.video_urls,
      weather: input.weather,
      music: input.music,
      is_draft: input.is_draft,
      updated_at: touch_updated.then(Utc::now),
    }
  }
}

/// A likes row as the backend stores it: the identity axis is a pair
/// of nullable columns, exactly one of which is set.
#[derive(Debug, Deserialize)]
struct LikeRow {
  id:         Uuid,
  post_id:    Uuid,
  #[serde(default)]
  user_id:    Option<Uuid>,
  #[serde(default)]
  session_id: Option<String>,
  created_at: DateTime<Utc>,
}

impl TryFrom<LikeRow> for Like {
  type Error = Error;

  fn try_from(row: LikeRow) -> Result<Like> {
    let identity = match (row.user_id, row.session_id) {
      (Some(user_id), None) => LikeIdentity::User(user_id),
      (None, Some(token)) => LikeIdentity::Session(token),
      _ => return Err(Error::MalformedLike(row.id)),
    };
    Ok(Like {
      id: row.id,
      post_id: row.post_id,
      identity,
      created_at: row.created_at,
    })
  }
}

#[derive(Debug, Serialize)]
struct LikeWrite {
  post_id:    Uuid,
  #[serde(skip_serializing_if = "Option::is_none")]
  user_id:    Option<Uuid>,
  #[serde(skip_serializing_if = "Option::is_none")]
  session_id: Option<String>,
}

impl LikeWrite {
  fn new(post_id: Uuid, identity: LikeIdentity) -> Self {
    match identity {
      LikeIdentity::User(user_id) => {
        Self { post_id, user_id: Some(user_id), session_id: None }
      }
      LikeIdentity::Session(token) => {
        Self { post_id, user_id: None, session_id: Some(token) }
      }
    }
  }
}

#[derive(Debug, Serialize)]
struct NowPlayingWrite {
  user_id:    Uuid,
  track_id:   String,
  kind:       TrackKind,
  title:      String,
  #[serde(skip_serializing_if = "Option::is_none")]
  artist:     Option<String>,
  embed_url:  String,
  updated_at: DateTime<Utc>,
}

// ─── Filter helpers ──────────────────────────────────────────────────────────

fn eq(value: impl ToString) -> String {
  format!("eq.{}", value.to_string())
}

fn in_filter(ids: &[Uuid]) -> String {
  let joined: Vec<String> = ids.iter().map(Uuid::to_string).collect();
  format!("in.({})", joined.join(","))
}

/// Total from a `Content-Range` header: `0-0/42` or `*/42` → 42.
fn parse_content_range(raw: &str) -> Option<u64> {
  raw.rsplit('/').next()?.parse().ok()
}

/// The filter pair selecting one identity's like on one post.
fn like_filter(identity: &LikeIdentity) -> (&'static str, String) {
  match identity {
    LikeIdentity::User(user_id) => ("user_id", eq(user_id)),
    LikeIdentity::Session(token) => ("session_id", eq(token)),
  }
}

// ─── BlogStore impl ──────────────────────────────────────────────────────────

impl BlogStore for RestStore {
  type Error = Error;

  async fn fetch_posts(&self, query: PostQuery) -> Result<Vec<Post>> {
    let url = self.client.table_url("posts");
    let mut params: Vec<(&str, String)> = vec![
      ("select", "*".into()),
      ("order", "created_at.desc".into()),
      ("limit", query.limit.to_string()),
      ("offset", query.offset.to_string()),
    ];
    if let Some(category) = query.category {
      params.push(("category", eq(category)));
    }
    if !query.include_drafts {
      params.push(("is_draft", eq(false)));
    }

    let response = self.client.get(&url).query(&params).send().await?;
    self.client.handle(response).await
  }

  async fn fetch_post(&self, id: Uuid) -> Result<Option<Post>> {
    let url = self.client.table_url("posts");
    let response = self
      .client
      .get(&url)
      .query(&[("select", "*".to_string()), ("id", eq(id)), ("limit", "1".into())])
      .send()
      .await?;
    let mut rows: Vec<Post> = self.client.handle(response).await?;
    Ok(rows.pop())
  }

  async fn insert_post(&self, user_id: Uuid, input: NewPost) -> Result<Post> {
    let url = self.client.table_url("posts");
    let response = self
      .client
      .post(&url)
      .header("Prefer", "return=representation")
      .json(&PostWrite::from_input(user_id, input, false))
      .send()
      .await?;
    let rows: Vec<Post> = self.client.handle(response).await?;
    rows.into_iter().next().ok_or(Error::EmptyRepresentation)
  }

  async fn update_post(
    &self,
    id: Uuid,
    user_id: Uuid,
    input: NewPost,
  ) -> Result<Post> {
    let url = self.client.table_url("posts");
    let response = self
      .client
      .patch(&url)
      .query(&[("id", eq(id))])
      .header("Prefer", "return=representation")
      .json(&PostWrite::from_input(user_id, input, true))
      .send()
      .await?;
    let rows: Vec<Post> = self.client.handle(response).await?;
    // An empty representation on a filtered update means no such row.
    rows.into_iter().next().ok_or(Error::NotFound)
  }

  async fn delete_post(&self, id: Uuid) -> Result<()> {
    let url = self.client.table_url("posts");
    let response =
      self.client.delete(&url).query(&[("id", eq(id))]).send().await?;
    self.client.expect_success(response).await
  }

  async fn fetch_likes(&self, post_ids: Vec<Uuid>) -> Result<Vec<Like>> {
    if post_ids.is_empty() {
      return Ok(Vec::new());
    }
    let url = self.client.table_url("likes");
    let response = self
      .client
      .get(&url)
      .query(&[("select", "*".to_string()), ("post_id", in_filter(&post_ids))])
      .send()
      .await?;
    let rows: Vec<LikeRow> = self.client.handle(response).await?;
    rows.into_iter().map(Like::try_from).collect()
  }

  async fn insert_like(
    &self,
    post_id: Uuid,
    identity: LikeIdentity,
  ) -> Result<bool> {
    let url = self.client.table_url("likes");
    let response = self
      .client
      .post(&url)
      .json(&LikeWrite::new(post_id, identity))
      .send()
      .await?;
    // The table carries a uniqueness invariant on (post, identity); a
    // conflict means this identity already likes the post.
    if response.status() == StatusCode::CONFLICT {
      return Ok(false);
    }
    self.client.expect_success(response).await?;
    Ok(true)
  }

  async fn delete_like(
    &self,
    post_id: Uuid,
    identity: LikeIdentity,
  ) -> Result<()> {
    let url = self.client.table_url("likes");
    let (column, filter) = like_filter(&identity);
    let response = self
      .client
      .delete(&url)
      .query(&[("post_id", eq(post_id)), (column, filter)])
      .send()
      .await?;
    self.client.expect_success(response).await
  }

  async fn fetch_comments(&self, post_id: Uuid) -> Result<Vec<Comment>> {
    let url = self.client.table_url("comments");
    let response = self
      .client
      .get(&url)
      .query(&[
        ("select", "*".to_string()),
        ("post_id", eq(post_id)),
        ("order", "created_at.asc".into()),
      ])
      .send()
      .await?;
    self.client.handle(response).await
  }

  async fn count_comments(&self, post_id: Uuid) -> Result<u64> {
    let url = self.client.table_url("comments");
    let response = self
      .client
      .get(&url)
      .query(&[("select", "id".to_string()), ("post_id", eq(post_id))])
      .header("Prefer", "count=exact")
      .header("Range-Unit", "items")
      .header("Range", "0-0")
      .send()
      .await?;

    if !response.status().is_success() {
      let status = response.status().as_u16();
      let message = response.text().await.unwrap_or_default();
      return Err(Error::Server { status, message });
    }

    let counted = response
      .headers()
      .get(reqwest::header::CONTENT_RANGE)
      .and_then(|v| v.to_str().ok())
      .and_then(parse_content_range);
    match counted {
      Some(n) => Ok(n),
      // Backends without range counting just get the rows counted here.
      None => {
        let rows: Vec<serde_json::Value> = response.json().await?;
        Ok(rows.len() as u64)
      }
    }
  }

  async fn insert_comment(&self, input: NewComment) -> Result<Comment> {
    let url = self.client.table_url("comments");
    let response = self
      .client
      .post(&url)
      .header("Prefer", "return=representation")
      .json(&input)
      .send()
      .await?;
    let rows: Vec<Comment> = self.client.handle(response).await?;
    rows.into_iter().next().ok_or(Error::EmptyRepresentation)
  }

  async fn fetch_profile(&self, user_id: Uuid) -> Result<Option<Profile>> {
    let url = self.client.table_url("profiles");
    let response = self
      .client
      .get(&url)
      .query(&[
        ("select", "*".to_string()),
        ("id", eq(user_id)),
        ("limit", "1".into()),
      ])
      .send()
      .await?;
    let mut rows: Vec<Profile> = self.client.handle(response).await?;
    Ok(rows.pop())
  }

  async fn update_profile(
    &self,
    user_id: Uuid,
    patch: ProfilePatch,
  ) -> Result<Profile> {
    let url = self.client.table_url("profiles");
    let response = self
      .client
      .patch(&url)
      .query(&[("id", eq(user_id))])
      .header("Prefer", "return=representation")
      .json(&patch)
      .send()
      .await?;
    let rows: Vec<Profile> = self.client.handle(response).await?;
    rows.into_iter().next().ok_or(Error::NotFound)
  }

  async fn upload(&self, upload: MediaUpload) -> Result<String> {
    let url = self.client.storage_url(&upload.bucket, &upload.path);
    let response = self
      .client
      .post(&url)
      .header(reqwest::header::CONTENT_TYPE, upload.content_type)
      .body(upload.bytes)
      .send()
      .await?;
    self.client.expect_success(response).await?;
    Ok(self.client.public_object_url(&upload.bucket, &upload.path))
  }

  async fn fetch_now_playing(&self) -> Result<Option<NowPlaying>> {
    let url = self.client.table_url("now_playing");
    let response = self
      .client
      .get(&url)
      .query(&[("select", "*".to_string()), ("limit", "1".into())])
      .send()
      .await?;
    let mut rows: Vec<NowPlaying> = self.client.handle(response).await?;
    Ok(rows.pop())
  }

  async fn upsert_now_playing(
    &self,
    user_id: Uuid,
    input: NowPlayingInput,
  ) -> Result<NowPlaying> {
    let url = self.client.table_url("now_playing");
    let write = NowPlayingWrite {
      user_id,
      track_id: input.track_id,
      kind: input.kind,
      title: input.title,
      artist: input.artist,
      embed_url: input.embed_url,
      updated_at: Utc::now(),
    };

    // One row per user: update it when present, insert otherwise.
    let existing = self
      .client
      .get(&url)
      .query(&[("select", "id".to_string()), ("user_id", eq(user_id))])
      .send()
      .await?;
    let existing: Vec<serde_json::Value> = self.client.handle(existing).await?;

    let response = if existing.is_empty() {
      self
        .client
        .post(&url)
        .header("Prefer", "return=representation")
        .json(&write)
        .send()
        .await?
    } else {
      self
        .client
        .patch(&url)
        .query(&[("user_id", eq(user_id))])
        .header("Prefer", "return=representation")
        .json(&write)
        .send()
        .await?
    };
    let rows: Vec<NowPlaying> = self.client.handle(response).await?;
    rows.into_iter().next().ok_or(Error::EmptyRepresentation)
  }
}
