//! Error type for `checkin-store-rest`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("websocket error: {0}")]
  Websocket(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// The backend answered with a non-success status.
  #[error("backend returned {status}: {message}")]
  Server { status: u16, message: String },

  #[error("auth error: {0}")]
  Auth(String),

  #[error("resource not found")]
  NotFound,

  /// A write asked for `return=representation` and got nothing back.
  #[error("backend returned an empty representation")]
  EmptyRepresentation,

  /// A likes row with neither or both identity columns set.
  #[error("malformed like row {0}")]
  MalformedLike(uuid::Uuid),

  #[error("not a recognised track link: {0}")]
  TrackLink(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
