//! Error taxonomy for `checkin-core`.
//!
//! Every backend failure is caught at an operation boundary and folded
//! into one of these user-visible outcomes; nothing here is allowed to
//! escape to a top-level crash handler.

use thiserror::Error;
use uuid::Uuid;

/// Boxed backend error carried as the source of a remote failure.
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The current actor is not allowed to do this (owner-only actions,
  /// or profile edits without a session). Recovered locally by
  /// refusing; never a crash.
  #[error("not authorized to {0}")]
  Authorization(&'static str),

  /// A required field was empty or malformed. The operation is not
  /// attempted.
  #[error("{0}")]
  Validation(String),

  /// A backend query failed. Feed reads fall back to an empty list
  /// rather than blocking the view.
  #[error("reading from the backend failed: {0}")]
  RemoteRead(#[source] BoxedSource),

  /// A backend mutation failed. Surfaced to the user as a dismissable
  /// message.
  #[error("writing to the backend failed: {0}")]
  RemoteWrite(#[source] BoxedSource),

  /// The requested post does not exist (any more).
  #[error("post not found: {0}")]
  NotFound(Uuid),

  /// A like toggle for this post is still in flight; the re-entrant
  /// call is rejected, not queued.
  #[error("a like for post {0} is still being saved")]
  ToggleInFlight(Uuid),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// Fold a backend error into a read failure.
  pub fn read<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Error::RemoteRead(Box::new(e))
  }

  /// Fold a backend error into a write failure.
  pub fn write<E: std::error::Error + Send + Sync + 'static>(e: E) -> Self {
    Error::RemoteWrite(Box::new(e))
  }
}
