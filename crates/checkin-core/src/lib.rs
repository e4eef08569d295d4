//! Core types and trait definitions for the checkin blog client.
//!
//! This crate is deliberately free of HTTP dependencies. All other
//! crates depend on it; it depends on nothing service-specific. The
//! hosted backend is reached only through the [`store::BlogStore`],
//! [`store::AuthSessions`] and [`store::ChangeFeed`] abstractions.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod comment;
pub mod engagement;
pub mod error;
pub mod identity;
pub mod post;
pub mod store;

pub use error::{Error, Result};
