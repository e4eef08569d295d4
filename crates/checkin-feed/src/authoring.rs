//! Post Authoring Workflow — owner-gated writes.
//!
//! Every entry point resolves the current identity first and refuses
//! non-owners with [`Error::Authorization`]. The gate is a UX
//! affordance, not the security boundary: requests carry the session's
//! bearer token, and real enforcement belongs to the backing store's
//! access-control layer.

use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use checkin_core::{
  Error, Result,
  identity::{AuthUser, Identity, Profile, ProfilePatch},
  post::{NewPost, NowPlaying, NowPlayingInput, Post},
  store::{AuthSessions, BlogStore, MediaUpload},
};

use crate::identity::IdentityResolver;

/// Decorative "interaction occurred" signal, consumed by UI flourishes
/// (the original bounces an avatar on it). Carries nothing.
#[derive(Debug, Clone, Copy)]
pub struct InteractionPing;

/// A post under composition: the record fields plus files that still
/// need uploading. Upload happens first; the resulting public URLs are
/// appended to the record before it is written.
#[derive(Debug, Default)]
pub struct PostDraft {
  pub images: Vec<MediaUpload>,
  pub videos: Vec<MediaUpload>,
}

pub struct AuthoringWorkflow<A, S> {
  identity:     IdentityResolver<A, S>,
  store:        Arc<S>,
  interactions: broadcast::Sender<InteractionPing>,
}

impl<A, S> AuthoringWorkflow<A, S>
where
  A: AuthSessions,
  S: BlogStore,
{
  pub fn new(identity: IdentityResolver<A, S>, store: Arc<S>) -> Self {
    let (interactions, _) = broadcast::channel(8);
    Self { identity, store, interactions }
  }

  /// Subscribe to the decorative interaction signal.
  pub fn interactions(&self) -> broadcast::Receiver<InteractionPing> {
    self.interactions.subscribe()
  }

  async fn require_owner(&self, action: &'static str) -> Result<AuthUser> {
    match self.identity.current_identity().await {
      Identity::Owner(user) => Ok(user),
      _ => Err(Error::Authorization(action)),
    }
  }

  // ── Posts ─────────────────────────────────────────────────────────────

  /// Create a post. Content is required; an empty title resolves to
  /// the category default. On failure nothing is written and the error
  /// is surfaced so the form can stay open for retry.
  pub async fn create_post(
    &self,
    mut input: NewPost,
    draft: PostDraft,
  ) -> Result<Post> {
    let owner = self.require_owner("create posts").await?;
    validate_content(&input)?;

    self.upload_attachments(&mut input, draft).await?;
    input.title = input.resolved_title();

    let post = self
      .store
      .insert_post(owner.id, input)
      .await
      .map_err(Error::write)?;
    tracing::info!(post = %post.id, category = %post.category, "post created");
    let _ = self.interactions.send(InteractionPing);
    Ok(post)
  }

  /// Edit an existing post. Same validation and upload delegation as
  /// creation; the category is carried over unchanged by callers.
  pub async fn update_post(
    &self,
    id: Uuid,
    mut input: NewPost,
    draft: PostDraft,
  ) -> Result<Post> {
    let owner = self.require_owner("edit posts").await?;
    validate_content(&input)?;

    self.upload_attachments(&mut input, draft).await?;
    input.title = input.resolved_title();

    let post = self
      .store
      .update_post(id, owner.id, input)
      .await
      .map_err(Error::write)?;
    tracing::info!(post = %post.id, "post updated");
    let _ = self.interactions.send(InteractionPing);
    Ok(post)
  }

  /// Delete a post; the backing store cascades to likes and comments.
  /// Callers present an explicit confirmation step before invoking
  /// this — the confirmation itself is a pure UI gate.
  pub async fn delete_post(&self, id: Uuid) -> Result<()> {
    self.require_owner("delete posts").await?;
    self.store.delete_post(id).await.map_err(Error::write)?;
    tracing::info!(post = %id, "post deleted");
    let _ = self.interactions.send(InteractionPing);
    Ok(())
  }

  async fn upload_attachments(
    &self,
    input: &mut NewPost,
    draft: PostDraft,
  ) -> Result<()> {
    for upload in draft.images {
      let url = self.store.upload(upload).await.map_err(Error::write)?;
      input.image_urls.push(url);
    }
    for upload in draft.videos {
      let url = self.store.upload(upload).await.map_err(Error::write)?;
      input.video_urls.push(url);
    }
    Ok(())
  }

  // ── Now playing ───────────────────────────────────────────────────────

  /// Replace the owner's "currently listening" entry.
  pub async fn set_now_playing(
    &self,
    input: NowPlayingInput,
  ) -> Result<NowPlaying> {
    let owner = self.require_owner("set now playing").await?;
    self
      .store
      .upsert_now_playing(owner.id, input)
      .await
      .map_err(Error::write)
  }

  // ── Profile ───────────────────────────────────────────────────────────

  /// Update the signed-in user's own profile row. Any authenticated
  /// user qualifies; anonymous visitors have no row to edit.
  pub async fn update_own_profile(
    &self,
    mut patch: ProfilePatch,
    avatar: Option<MediaUpload>,
  ) -> Result<Profile> {
    let user = match self.identity.current_identity().await {
      Identity::Owner(user) | Identity::Visitor(user) => user,
      Identity::Anonymous(_) => {
        return Err(Error::Authorization("edit a profile"));
      }
    };

    if let Some(upload) = avatar {
      let url = self.store.upload(upload).await.map_err(Error::write)?;
      patch.avatar_url = Some(url);
    }

    self
      .store
      .update_profile(user.id, patch)
      .await
      .map_err(Error::write)
  }
}

fn validate_content(input: &NewPost) -> Result<()> {
  if input.content.trim().is_empty() {
    return Err(Error::Validation("content is required".into()));
  }
  Ok(())
}
