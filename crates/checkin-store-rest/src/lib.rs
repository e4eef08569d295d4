//! Hosted-backend binding for checkin.
//!
//! Everything the blog delegates to its backend-as-a-service lives
//! here: REST table access (implements [`checkin_core::store::BlogStore`]),
//! email/password auth sessions, object-storage upload, and the
//! websocket change feed. The two read-only third-party collaborators
//! (weather provider, music oEmbed) are small clients beside them.

pub mod auth;
pub mod client;
pub mod media;
pub mod music;
pub mod realtime;
pub mod store;
pub mod weather;

pub mod error;

pub use auth::RestAuth;
pub use client::{RestClient, RestConfig};
pub use error::{Error, Result};
pub use realtime::{RealtimeConfig, RealtimeFeed};
pub use store::RestStore;
