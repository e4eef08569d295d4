//! The feed & interaction layer: everything between the views and the
//! hosted backend.
//!
//! Components, leaves first:
//!
//! - [`identity::IdentityResolver`] — owner / visitor / anonymous,
//!   plus the persisted anonymous session token.
//! - [`engagement::EngagementTracker`] — like counts and states,
//!   comment threads and submission.
//! - [`feed::FeedController`] — paginated post loading with
//!   engagement hydration.
//! - [`bridge::RefreshBridge`] — realtime change events turned into
//!   view refreshes.
//! - [`authoring::AuthoringWorkflow`] — owner-gated post authoring,
//!   media upload delegation, now-playing and profile upkeep.
//!
//! Every component is generic over the `checkin-core` traits so it can
//! be driven against in-memory fakes in tests.

pub mod authoring;
pub mod bridge;
pub mod engagement;
pub mod feed;
pub mod identity;

pub use checkin_core::{Error, Result};

#[cfg(test)]
mod tests;
