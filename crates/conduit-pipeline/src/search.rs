//! Search synchronizer
//!
//! Mirrors article mutations into the search index. The store's sequence
//! number rides along as the document's external version, so the sink
//! rejects any write older than what it already holds. A rejection therefore
//! means a newer state won the race and is reported as success.

use crate::error::PipelineError;
use crate::event::SearchEvent;
use conduit_index::SearchIndex;
use std::sync::Arc;
use tracing::debug;

/// Sole writer of the article search index
pub struct SearchSynchronizer {
    index: Arc<dyn SearchIndex>,
}

impl SearchSynchronizer {
    /// Create a synchronizer over the index write capability
    #[must_use]
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Apply one article mutation to the index
    ///
    /// Insert and modify upsert the document projection; remove deletes it.
    /// A stale-version rejection is success.
    ///
    /// # Errors
    /// Propagates transient index failures for the retry path.
    pub async fn apply(&self, event: SearchEvent) -> Result<(), PipelineError> {
        let article_id = event.article_id;
        let version = event.version;
        match self.index.apply(event.into_index_write()).await {
            Ok(()) => Ok(()),
            Err(err) if err.is_stale() => {
                debug!(
                    article_id = %article_id,
                    version,
                    "stale index write lost to a newer version"
                );
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
