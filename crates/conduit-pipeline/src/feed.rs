//! Feed materializer
//!
//! Fans one "article created" event out to a feed row per current follower of
//! the author. Rows are keyed by `(user_id, created_at, article_id)`, so
//! re-delivery of the same event overwrites identical content; the whole
//! operation is safe to repeat. Followers gained after the article was
//! created never receive the row retroactively - materialization is a
//! forward-only side effect of creation, not a backfill.

use crate::error::PipelineError;
use crate::event::ArticleCreated;
use conduit_domain::FeedEntry;
use conduit_store::{FeedStore, FollowStore};
use std::sync::Arc;
use tracing::debug;

/// Sole writer of the derived feed collection
pub struct FeedMaterializer {
    follows: Arc<dyn FollowStore>,
    feed: Arc<dyn FeedStore>,
    /// Followers fetched per page of the followee access path
    follower_page_size: usize,
    /// Feed rows written per batched store call
    fan_out_batch: usize,
}

impl FeedMaterializer {
    /// Create a materializer over grant-scoped store handles
    #[must_use]
    pub fn new(follows: Arc<dyn FollowStore>, feed: Arc<dyn FeedStore>) -> Self {
        Self {
            follows,
            feed,
            follower_page_size: 100,
            fan_out_batch: 25,
        }
    }

    /// With a custom follower page size
    #[inline]
    #[must_use]
    pub fn with_follower_page_size(mut self, size: usize) -> Self {
        self.follower_page_size = size.max(1);
        self
    }

    /// With a custom write batch size
    #[inline]
    #[must_use]
    pub fn with_fan_out_batch(mut self, size: usize) -> Self {
        self.fan_out_batch = size.max(1);
        self
    }

    /// Materialize one feed row per follower of the event's author
    ///
    /// Zero followers is a no-op, not an error. A follower lookup or batch
    /// write failure surfaces as a retryable error; because every row write
    /// is an idempotent overwrite, re-running the fan-out after a partial
    /// failure converges on the same state.
    ///
    /// # Errors
    /// Propagates transient store failures for the retry path.
    pub async fn fan_out(&self, event: &ArticleCreated) -> Result<(), PipelineError> {
        let mut cursor = None;
        let mut written = 0_usize;

        loop {
            let page = self
                .follows
                .followers(event.author_id, self.follower_page_size, cursor)
                .await?;

            for chunk in page.followers.chunks(self.fan_out_batch) {
                let entries: Vec<FeedEntry> = chunk
                    .iter()
                    .map(|follower| FeedEntry {
                        user_id: *follower,
                        created_at: event.created_at,
                        article_id: event.article_id,
                        author_id: event.author_id,
                    })
                    .collect();
                self.feed.put_feed_entries(&entries).await?;
                written += entries.len();
            }

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(
            article_id = %event.article_id,
            author_id = %event.author_id,
            written,
            "fanned out article to followers"
        );
        Ok(())
    }
}
