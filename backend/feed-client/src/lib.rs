//! Client core of a photo-sharing social feed.
//!
//! Persistence, identity and media hosting belong to managed services
//! reached through the traits in [`clients`]. This crate owns the state
//! layered on top of them:
//! - optimistic like toggles reconciled against the remote counter
//! - the shared feed cache with cursor pagination
//! - the auth session and auth-gated navigation
//! - post composition, profile edits and comments

pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod repository;
pub mod services;
pub mod telemetry;

pub use error::{FeedError, FeedResult};
