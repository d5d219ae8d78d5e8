//! Conduit Domain - Entity types for the social-publishing backend
//!
//! Defines the primary entities and their invariants:
//! - Users, articles, follows, favorites, comments
//! - Derived feed entries (materialized, never written by handlers)
//! - Uuid-backed id newtypes and slug derivation

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Article, Comment, Favorite, FeedEntry, Follow, User};
pub use error::DomainError;
pub use id::{ArticleId, CommentId, UserId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
