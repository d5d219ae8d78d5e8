//! Change dispatcher
//!
//! Filters the article collection's change log and routes each record to the
//! synchronizers that consume it:
//! - key-pattern filter: slug guard rows share the log with domain rows and
//!   are dropped here, silently
//! - event-kind filter: inserts go to the feed materializer; inserts,
//!   modifies, and removes all go to the search synchronizer
//!
//! Batches report failures per item so already-applied items are never
//! retried. The dispatcher keeps no state across records; ordering is only
//! per key shard and both synchronizers are safe under arbitrary
//! interleaving of different keys.

use crate::error::PipelineError;
use crate::event::{ArticleCreated, SearchEvent};
use crate::feed::FeedMaterializer;
use crate::search::SearchSynchronizer;
use conduit_store::{ChangeKind, ChangeRecord, SequenceNumber};
use tracing::{debug, warn};

/// Per-item result of one batch dispatch
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub failures: Vec<ItemFailure>,
}

impl BatchOutcome {
    /// Whether every item applied
    #[inline]
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One failed item of a batch
#[derive(Debug)]
pub struct ItemFailure {
    /// Identifies the record within the source batch
    pub sequence: SequenceNumber,
    pub error: PipelineError,
}

/// Routes filtered change records to the synchronizers
pub struct ChangeDispatcher {
    feed: FeedMaterializer,
    search: SearchSynchronizer,
}

impl ChangeDispatcher {
    /// Create a dispatcher over the two synchronizers
    #[must_use]
    pub fn new(feed: FeedMaterializer, search: SearchSynchronizer) -> Self {
        Self { feed, search }
    }

    /// Process one batch of change records, reporting failures per item
    ///
    /// Items that apply are never part of the outcome; re-dispatching only
    /// the failed items is how the retry path avoids reprocessing.
    pub async fn dispatch_batch(&self, records: &[ChangeRecord]) -> BatchOutcome {
        let mut failures = Vec::new();
        for record in records {
            if let Err(error) = self.dispatch_one(record).await {
                warn!(
                    sequence = %record.sequence,
                    %error,
                    retryable = error.is_retryable(),
                    "change record failed to apply"
                );
                failures.push(ItemFailure {
                    sequence: record.sequence,
                    error,
                });
            }
        }
        BatchOutcome { failures }
    }

    async fn dispatch_one(&self, record: &ChangeRecord) -> Result<(), PipelineError> {
        let Some(key) = record.key() else {
            // A record with no key on either side carries nothing to route
            debug!(sequence = %record.sequence, "dropping keyless change record");
            return Ok(());
        };
        if key.is_slug_guard() {
            debug!(sequence = %record.sequence, key = %key, "dropping auxiliary index row");
            return Ok(());
        }

        // Search mirrors every mutation kind; version checks at the sink
        // make replays and reordering safe.
        let search_event = SearchEvent::from_record(record)?;
        self.search.apply(search_event).await?;

        // Only genuine creations fan out to follower feeds.
        if record.kind == ChangeKind::Insert {
            let created = ArticleCreated::from_record(record)?;
            self.feed.fan_out(&created).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conduit_domain::{Article, Follow, UserId};
    use conduit_grants::Component;
    use conduit_index::MemoryIndex;
    use conduit_store::{ArticleStore, ChangeLogSource, FollowStore, MemoryStore};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn dispatcher(store: &Arc<MemoryStore>, index: &Arc<MemoryIndex>) -> ChangeDispatcher {
        let handle = store.handle(Component::FeedMaterializer);
        let feed = FeedMaterializer::new(Arc::new(handle.clone()), Arc::new(handle));
        let search = SearchSynchronizer::new(index.clone());
        ChangeDispatcher::new(feed, search)
    }

    #[tokio::test]
    async fn guard_rows_never_reach_synchronizers() {
        let store = MemoryStore::new();
        let index = Arc::new(MemoryIndex::new());
        let writer = store.handle(Component::ArticleWriter);
        let stream = store.handle(Component::ChangeDispatcher);

        let author = UserId::new();
        let article = Article::new(author, "Guarded", "d", "b", vec![]).unwrap();
        writer.put_article(&article).await.unwrap();

        // Insert produced two records: the guard row and the article
        let batch = stream.next_batch(10).await.unwrap();
        assert_eq!(batch.len(), 2);

        let outcome = dispatcher(&store, &index).dispatch_batch(&batch).await;
        assert!(outcome.is_clean());
        // Only the genuine article row was mirrored
        assert_eq!(index.live_count(), 1);
        assert!(index.document(&article.id.to_string()).is_some());
    }

    #[tokio::test]
    async fn inserts_reach_both_synchronizers_modifies_only_search() {
        let store = MemoryStore::new();
        let index = Arc::new(MemoryIndex::new());
        let writer = store.handle(Component::ArticleWriter);
        let follows = store.handle(Component::FollowWriter);
        let stream = store.handle(Component::ChangeDispatcher);

        let author = UserId::new();
        let follower = UserId::new();
        follows.follow(Follow::new(follower, author).unwrap()).await.unwrap();

        let mut article = Article::new(author, "Both Paths", "d", "b", vec![]).unwrap();
        writer.put_article(&article).await.unwrap();
        article.update(None, None, Some("edited".to_string()));
        writer.put_article(&article).await.unwrap();

        let batch = stream.next_batch(10).await.unwrap();
        let outcome = dispatcher(&store, &index).dispatch_batch(&batch).await;
        assert!(outcome.is_clean());

        // One feed row from the insert; the modify did not fan out again
        assert_eq!(store.feed_rows(follower).len(), 1);
        let doc = index.document(&article.id.to_string()).unwrap();
        assert_eq!(doc["body"], "edited");
    }

    #[tokio::test]
    async fn failures_are_reported_per_item() {
        let store = MemoryStore::new();
        let index = Arc::new(MemoryIndex::new());
        let writer = store.handle(Component::ArticleWriter);
        let stream = store.handle(Component::ChangeDispatcher);

        for i in 0..3 {
            let article =
                Article::new(UserId::new(), format!("Item {i}"), "d", "b", vec![]).unwrap();
            writer.put_article(&article).await.unwrap();
        }
        let batch = stream.next_batch(10).await.unwrap();
        // 3 articles -> 6 records, 3 of them guard rows. Fail one index apply.
        index.inject_apply_failures(1);

        let outcome = dispatcher(&store, &index).dispatch_batch(&batch).await;
        assert_eq!(outcome.failures.len(), 1);
        assert!(outcome.failures[0].error.is_retryable());
        assert_eq!(index.live_count(), 2);
    }

    #[tokio::test]
    async fn remove_flows_through_to_index_delete() {
        let store = MemoryStore::new();
        let index = Arc::new(MemoryIndex::new());
        let writer = store.handle(Component::ArticleWriter);
        let stream = store.handle(Component::ChangeDispatcher);

        let article = Article::new(UserId::new(), "Short Lived", "d", "b", vec![]).unwrap();
        writer.put_article(&article).await.unwrap();
        writer.remove_article(article.id).await.unwrap();

        let batch = stream.next_batch(10).await.unwrap();
        let outcome = dispatcher(&store, &index).dispatch_batch(&batch).await;
        assert!(outcome.is_clean());
        assert!(index.document(&article.id.to_string()).is_none());
        assert_eq!(index.live_count(), 0);
    }
}
