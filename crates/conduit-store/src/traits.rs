//! Capability traits over the entity store
//!
//! Components hold only the traits their grants cover. Implementations must
//! be safe under concurrent callers; there is no cross-component coordination
//! beyond eventual consistency.

use crate::change::{ChangeRecord, SequenceNumber};
use crate::cursor::PageCursor;
use crate::error::StoreError;
use async_trait::async_trait;
use conduit_domain::{Article, ArticleId, FeedEntry, Follow, UserId};

/// One page of follower ids for a followee
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerPage {
    pub followers: Vec<UserId>,
    /// Present when more pages remain
    pub next: Option<PageCursor>,
}

/// One page of a user's materialized feed, newest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedPage {
    pub entries: Vec<FeedEntry>,
    pub next: Option<PageCursor>,
}

/// Point access to the article collection
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Insert or overwrite an article row; also claims the slug guard row on
    /// first insert. Returns the sequence number of the article mutation.
    async fn put_article(&self, article: &Article) -> Result<SequenceNumber, StoreError>;

    /// Point read by primary key
    async fn article_by_id(&self, id: ArticleId) -> Result<Option<Article>, StoreError>;

    /// Lookup through the slug access path
    async fn article_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError>;

    /// Remove the article row and release its slug guard; a no-op for ids
    /// that are already gone
    async fn remove_article(&self, id: ArticleId) -> Result<(), StoreError>;
}

/// Ordered consumption of the article collection's change log
///
/// Delivery to downstream consumers is at-least-once: a batch whose
/// processing partially fails is re-delivered for the failed items.
#[async_trait]
pub trait ChangeLogSource: Send + Sync {
    /// Take up to `max` records off the log in commit order
    async fn next_batch(&self, max: usize) -> Result<Vec<ChangeRecord>, StoreError>;
}

/// Access to the follow collection
#[async_trait]
pub trait FollowStore: Send + Sync {
    /// Record a follow; the pair is unique, re-follow is a no-op
    async fn follow(&self, follow: Follow) -> Result<(), StoreError>;

    /// Remove a follow if present
    async fn unfollow(&self, follower: UserId, followee: UserId) -> Result<(), StoreError>;

    async fn is_following(&self, follower: UserId, followee: UserId)
        -> Result<bool, StoreError>;

    /// Page through the followers of `followee` via the followee access path
    async fn followers(
        &self,
        followee: UserId,
        limit: usize,
        cursor: Option<PageCursor>,
    ) -> Result<FollowerPage, StoreError>;
}

/// Access to the derived feed collection
///
/// The feed materializer is the sole writer; everything else may only read.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Idempotent batched write: rows are keyed by
    /// `(user_id, created_at, article_id)`, so re-delivery overwrites
    async fn put_feed_entries(&self, entries: &[FeedEntry]) -> Result<(), StoreError>;

    /// Page through a user's feed, newest first
    async fn feed_page(
        &self,
        user_id: UserId,
        limit: usize,
        cursor: Option<PageCursor>,
    ) -> Result<FeedPage, StoreError>;
}
