//! In-memory reference store
//!
//! Backs the worker demo and the integration tests. Mirrors the production
//! store's observable behavior:
//! - every row mutation appends a change record with before/after snapshots
//! - slug guard rows are persisted in the article collection and therefore
//!   appear in the change log
//! - handles are scoped to a component and check the grant table on each call
//!
//! Transient failures can be injected to exercise the retry path.

use crate::change::{ChangeRecord, SequenceNumber, StoreKey};
use crate::cursor::PageCursor;
use crate::error::StoreError;
use crate::traits::{
    ArticleStore, ChangeLogSource, FeedPage, FeedStore, FollowStore, FollowerPage,
};
use async_trait::async_trait;
use conduit_domain::{Article, ArticleId, FeedEntry, Follow, UserId};
use conduit_grants::{AccessMode, Collection, Component, GrantTable};
use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Shared in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Article collection: genuine rows and slug guard rows, by store key
    articles: DashMap<String, serde_json::Value>,
    /// Slug access path: slug -> owning article
    slugs: DashMap<String, ArticleId>,
    /// Follow collection, ordered by (followee, follower) for the fan-out path
    follows: RwLock<BTreeSet<(UserId, UserId)>>,
    /// Derived feed rows keyed by (user, created_at, article)
    feed: RwLock<BTreeMap<(UserId, i64, ArticleId), FeedEntry>>,
    /// Ordered change log of the article collection
    log: Mutex<VecDeque<ChangeRecord>>,
    /// Mutation counter; doubles as the external search version
    sequence: AtomicU64,
    /// Injected transient failures, consumed one per feed batch write
    feed_put_failures: AtomicUsize,
    /// Injected transient failures, consumed one per follower page read
    follower_read_failures: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Scope a handle to one component's grants
    #[must_use]
    pub fn handle(self: &Arc<Self>, component: Component) -> StoreHandle {
        StoreHandle {
            store: Arc::clone(self),
            component,
        }
    }

    /// Fail the next `n` feed batch writes with a transient error
    pub fn inject_feed_put_failures(&self, n: usize) {
        self.feed_put_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` follower page reads with a transient error
    pub fn inject_follower_read_failures(&self, n: usize) {
        self.follower_read_failures.store(n, Ordering::SeqCst);
    }

    /// Number of records currently sitting in the change log
    #[must_use]
    pub fn pending_changes(&self) -> usize {
        self.log.lock().len()
    }

    /// All feed rows for one user, newest first (test observation point)
    #[must_use]
    pub fn feed_rows(&self, user_id: UserId) -> Vec<FeedEntry> {
        let feed = self.feed.read();
        feed.range(user_range(user_id))
            .rev()
            .map(|(_, entry)| *entry)
            .collect()
    }

    fn next_sequence(&self) -> SequenceNumber {
        SequenceNumber(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    fn append(&self, record: ChangeRecord) {
        self.log.lock().push_back(record);
    }

    fn take_injected(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

fn user_range(user_id: UserId) -> (Bound<(UserId, i64, ArticleId)>, Bound<(UserId, i64, ArticleId)>) {
    (
        Bound::Included((user_id, i64::MIN, ArticleId(Uuid::nil()))),
        Bound::Included((user_id, i64::MAX, ArticleId(Uuid::max()))),
    )
}

fn to_snapshot<T: serde::Serialize>(value: &T) -> Result<serde_json::Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Codec(e.to_string()))
}

fn from_snapshot<T: serde::de::DeserializeOwned>(
    value: serde_json::Value,
) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Codec(e.to_string()))
}

/// A store handle scoped to one component
///
/// Every call is checked against the process-wide grant table; an access the
/// component never declared fails before touching any row.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    store: Arc<MemoryStore>,
    component: Component,
}

impl StoreHandle {
    /// The component this handle is scoped to
    #[inline]
    #[must_use]
    pub fn component(&self) -> Component {
        self.component
    }

    fn check(&self, collection: Collection, mode: AccessMode) -> Result<(), StoreError> {
        GrantTable::global().check(self.component, collection, mode)?;
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for StoreHandle {
    async fn put_article(&self, article: &Article) -> Result<SequenceNumber, StoreError> {
        self.check(Collection::Article, AccessMode::Write)?;

        if let Some(owner) = self.store.slugs.get(&article.slug) {
            if *owner != article.id {
                return Err(StoreError::DuplicateSlug(article.slug.clone()));
            }
        }

        let key = StoreKey::article(article.id);
        let after = to_snapshot(article)?;
        let previous = self.store.articles.insert(key.as_str().to_string(), after.clone());

        let sequence = match previous {
            Some(before) => {
                let sequence = self.store.next_sequence();
                self.store
                    .append(ChangeRecord::modify(key, before, after, sequence));
                sequence
            }
            None => {
                // First insert also claims the slug guard row; its mutation
                // lands in the same log as the domain row.
                let guard_key = StoreKey::slug_guard(&article.slug);
                let guard_row = serde_json::json!({
                    "slug": article.slug,
                    "article_id": article.id,
                });
                self.store
                    .articles
                    .insert(guard_key.as_str().to_string(), guard_row.clone());
                self.store.slugs.insert(article.slug.clone(), article.id);
                let guard_sequence = self.store.next_sequence();
                self.store
                    .append(ChangeRecord::insert(guard_key, guard_row, guard_sequence));

                let sequence = self.store.next_sequence();
                self.store.append(ChangeRecord::insert(key, after, sequence));
                sequence
            }
        };
        Ok(sequence)
    }

    async fn article_by_id(&self, id: ArticleId) -> Result<Option<Article>, StoreError> {
        self.check(Collection::Article, AccessMode::Read)?;
        let key = StoreKey::article(id);
        match self.store.articles.get(key.as_str()) {
            Some(row) => Ok(Some(from_snapshot(row.clone())?)),
            None => Ok(None),
        }
    }

    async fn article_by_slug(&self, slug: &str) -> Result<Option<Article>, StoreError> {
        self.check(Collection::Article, AccessMode::Read)?;
        match self.store.slugs.get(slug) {
            Some(id) => self.article_by_id(*id).await,
            None => Ok(None),
        }
    }

    async fn remove_article(&self, id: ArticleId) -> Result<(), StoreError> {
        self.check(Collection::Article, AccessMode::Write)?;
        let key = StoreKey::article(id);
        let Some((_, before)) = self.store.articles.remove(key.as_str()) else {
            debug!(article_id = %id, "remove of absent article is a no-op");
            return Ok(());
        };

        let article: Article = from_snapshot(before.clone())?;
        let sequence = self.store.next_sequence();
        self.store.append(ChangeRecord::remove(key, before, sequence));

        let guard_key = StoreKey::slug_guard(&article.slug);
        if let Some((_, guard_row)) = self.store.articles.remove(guard_key.as_str()) {
            self.store.slugs.remove(&article.slug);
            let guard_sequence = self.store.next_sequence();
            self.store
                .append(ChangeRecord::remove(guard_key, guard_row, guard_sequence));
        }
        Ok(())
    }
}

#[async_trait]
impl ChangeLogSource for StoreHandle {
    async fn next_batch(&self, max: usize) -> Result<Vec<ChangeRecord>, StoreError> {
        self.check(Collection::Article, AccessMode::StreamRead)?;
        let mut log = self.store.log.lock();
        let take = max.min(log.len());
        Ok(log.drain(..take).collect())
    }
}

#[async_trait]
impl FollowStore for StoreHandle {
    async fn follow(&self, follow: Follow) -> Result<(), StoreError> {
        self.check(Collection::Follow, AccessMode::Write)?;
        self.store
            .follows
            .write()
            .insert((follow.followee, follow.follower));
        Ok(())
    }

    async fn unfollow(&self, follower: UserId, followee: UserId) -> Result<(), StoreError> {
        self.check(Collection::Follow, AccessMode::Write)?;
        self.store.follows.write().remove(&(followee, follower));
        Ok(())
    }

    async fn is_following(
        &self,
        follower: UserId,
        followee: UserId,
    ) -> Result<bool, StoreError> {
        self.check(Collection::Follow, AccessMode::Read)?;
        Ok(self.store.follows.read().contains(&(followee, follower)))
    }

    async fn followers(
        &self,
        followee: UserId,
        limit: usize,
        cursor: Option<PageCursor>,
    ) -> Result<FollowerPage, StoreError> {
        self.check(Collection::Follow, AccessMode::Read)?;

        if MemoryStore::take_injected(&self.store.follower_read_failures) {
            return Err(StoreError::Transient("follower read unavailable".into()));
        }

        let start = match cursor {
            Some(cursor) => Bound::Excluded((followee, cursor.decode::<UserId>()?)),
            None => Bound::Included((followee, UserId(Uuid::nil()))),
        };
        let end = Bound::Included((followee, UserId(Uuid::max())));

        let follows = self.store.follows.read();
        let mut followers: Vec<UserId> = follows
            .range((start, end))
            .take(limit + 1)
            .map(|(_, follower)| *follower)
            .collect();

        let next = if followers.len() > limit {
            followers.truncate(limit);
            followers
                .last()
                .copied()
                .map(|last| PageCursor::encode(&last))
                .transpose()?
        } else {
            None
        };
        Ok(FollowerPage { followers, next })
    }
}

#[async_trait]
impl FeedStore for StoreHandle {
    async fn put_feed_entries(&self, entries: &[FeedEntry]) -> Result<(), StoreError> {
        self.check(Collection::Feed, AccessMode::Write)?;

        if MemoryStore::take_injected(&self.store.feed_put_failures) {
            return Err(StoreError::Transient("feed write throttled".into()));
        }

        let mut feed = self.store.feed.write();
        for entry in entries {
            // Overwrite by composite key keeps re-delivery idempotent
            feed.insert(entry.key(), *entry);
        }
        Ok(())
    }

    async fn feed_page(
        &self,
        user_id: UserId,
        limit: usize,
        cursor: Option<PageCursor>,
    ) -> Result<FeedPage, StoreError> {
        self.check(Collection::Feed, AccessMode::Read)?;

        let end = match cursor {
            Some(cursor) => {
                let (created_at, article_id) = cursor.decode::<(i64, ArticleId)>()?;
                Bound::Excluded((user_id, created_at, article_id))
            }
            None => Bound::Included((user_id, i64::MAX, ArticleId(Uuid::max()))),
        };
        let start = Bound::Included((user_id, i64::MIN, ArticleId(Uuid::nil())));

        let feed = self.store.feed.read();
        let mut entries: Vec<FeedEntry> = feed
            .range((start, end))
            .rev()
            .take(limit + 1)
            .map(|(_, entry)| *entry)
            .collect();

        let next = if entries.len() > limit {
            entries.truncate(limit);
            entries
                .last()
                .map(|last| PageCursor::encode(&(last.created_at, last.article_id)))
                .transpose()?
        } else {
            None
        };
        Ok(FeedPage { entries, next })
    }
}
