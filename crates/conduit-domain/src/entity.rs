//! Primary entities of the publishing backend
//!
//! All of these live in the entity store, partitioned by their primary key.
//! `FeedEntry` is the one derived row: it is materialized from the article
//! change log and is never written by a user-facing handler.

use crate::error::DomainError;
use crate::id::{ArticleId, CommentId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Registered user
///
/// Created by registration, mutated by profile update, never hard-deleted.
/// Email and username are unique across the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub username: String,
    /// Credential hash; issuance and verification live outside this core
    pub password_hash: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl User {
    /// Create a new user
    ///
    /// # Errors
    /// Returns `DomainError::EmptyField` when email or username is blank.
    pub fn new(
        email: impl Into<String>,
        username: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let email = email.into();
        let username = username.into();
        if email.trim().is_empty() {
            return Err(DomainError::EmptyField("email"));
        }
        if username.trim().is_empty() {
            return Err(DomainError::EmptyField("username"));
        }
        Ok(Self {
            id: UserId::new(),
            email,
            username,
            password_hash: password_hash.into(),
            bio: None,
            image: None,
        })
    }
}

/// Published article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    /// Unique, derived from the title at creation time
    pub slug: String,
    pub author_id: UserId,
    pub title: String,
    pub description: String,
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub favorites_count: u64,
}

impl Article {
    /// Create a new article; derives the slug from the title
    ///
    /// # Errors
    /// Returns `DomainError::EmptySlug` when the title slugifies to nothing.
    pub fn new(
        author_id: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
        body: impl Into<String>,
        tags: Vec<String>,
    ) -> Result<Self, DomainError> {
        let title = title.into();
        let slug = derive_slug(&title)?;
        let now = Utc::now();
        Ok(Self {
            id: ArticleId::new(),
            slug,
            author_id,
            title,
            description: description.into(),
            body: body.into(),
            tags,
            created_at: now,
            updated_at: now,
            favorites_count: 0,
        })
    }

    /// Apply an update; the slug is not re-derived, it stays stable
    pub fn update(&mut self, title: Option<String>, description: Option<String>, body: Option<String>) {
        if let Some(title) = title {
            self.title = title;
        }
        if let Some(description) = description {
            self.description = description;
        }
        if let Some(body) = body {
            self.body = body;
        }
        self.updated_at = Utc::now();
    }
}

/// Derive a url-safe slug from an article title
///
/// # Errors
/// Returns `DomainError::EmptySlug` for titles with no sluggable characters.
pub fn derive_slug(title: &str) -> Result<String, DomainError> {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        return Err(DomainError::EmptySlug(title.to_string()));
    }
    Ok(slug)
}

/// Follow relationship, unique per (follower, followee) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Follow {
    pub follower: UserId,
    pub followee: UserId,
}

impl Follow {
    /// Create a follow relationship
    ///
    /// # Errors
    /// Returns `DomainError::SelfFollow` when follower == followee.
    pub fn new(follower: UserId, followee: UserId) -> Result<Self, DomainError> {
        if follower == followee {
            return Err(DomainError::SelfFollow(follower));
        }
        Ok(Self { follower, followee })
    }
}

/// Favorite relationship, unique per (user, article) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: UserId,
    pub article_id: ArticleId,
}

/// Comment on an article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub article_id: ArticleId,
    pub author_id: UserId,
    pub body: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Create a new comment
    #[must_use]
    pub fn new(article_id: ArticleId, author_id: UserId, body: impl Into<String>) -> Self {
        Self {
            id: CommentId::new(),
            article_id,
            author_id,
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

/// Materialized feed row
///
/// Primary key is exactly `(user_id, created_at, article_id)`, so re-delivery
/// of the same source event overwrites the row with identical content instead
/// of duplicating it. `created_at` is the article's creation time in unix
/// milliseconds and doubles as the feed sort key (newest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeedEntry {
    pub user_id: UserId,
    pub created_at: i64,
    pub article_id: ArticleId,
    pub author_id: UserId,
}

impl FeedEntry {
    /// The composite primary key of this row
    #[inline]
    #[must_use]
    pub fn key(&self) -> (UserId, i64, ArticleId) {
        (self.user_id, self.created_at, self.article_id)
    }
}
