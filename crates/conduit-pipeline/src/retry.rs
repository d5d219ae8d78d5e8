//! Bounded per-item retry driver
//!
//! Wraps the dispatcher's batch processing with the delivery policy: failed
//! items are re-dispatched individually until they apply or the attempt
//! budget runs out, at which point they escalate to the dead-letter sink.
//! Items that already applied are never part of a retry pass, so retries
//! never amplify side effects beyond the idempotent overwrites the
//! synchronizers already perform.

use crate::dead_letter::{DeadLetterEntry, DeadLetterSink};
use crate::dispatcher::ChangeDispatcher;
use crate::error::PipelineError;
use conduit_store::{ChangeRecord, SequenceNumber};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

/// Delivery policy for one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total dispatch attempts per item, the first delivery included
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

impl RetryPolicy {
    /// Policy with a custom attempt budget, floored at one
    #[inline]
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }
}

/// What happened to one batch after the retry loop finished
#[derive(Debug, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Items that applied, on any attempt
    pub applied: usize,
    /// Items that needed more than one attempt and still applied
    pub recovered: usize,
    /// Items escalated to the dead-letter sink
    pub dead_lettered: usize,
}

/// Drive one batch through the dispatcher under the given policy
///
/// Non-retryable failures escalate immediately; retryable failures are
/// re-dispatched until they apply or exhaust `policy.max_attempts`. Each
/// escalated item carries its attempt count and last error.
///
/// # Errors
/// Only the sink itself failing aborts the loop; dispatch failures are
/// handled by the policy and reported, not returned.
pub async fn run_with_retries(
    dispatcher: &ChangeDispatcher,
    records: &[ChangeRecord],
    policy: RetryPolicy,
    dead_letter: &dyn DeadLetterSink,
) -> Result<DeliveryReport, PipelineError> {
    let mut report = DeliveryReport::default();
    let mut pending: Vec<ChangeRecord> = records.to_vec();
    let mut attempt = 0_u32;

    while !pending.is_empty() {
        attempt += 1;
        let outcome = dispatcher.dispatch_batch(&pending).await;

        let mut failed: HashMap<SequenceNumber, PipelineError> = HashMap::new();
        for failure in outcome.failures {
            failed.insert(failure.sequence, failure.error);
        }

        let applied_now = pending.len() - failed.len();
        report.applied += applied_now;
        if attempt > 1 {
            report.recovered += applied_now;
        }

        let mut still_pending = Vec::new();
        for record in pending {
            let Some(error) = failed.remove(&record.sequence) else {
                continue;
            };
            if error.is_retryable() && attempt < policy.max_attempts {
                still_pending.push(record);
            } else {
                report.dead_lettered += 1;
                dead_letter
                    .push(DeadLetterEntry::new(record, attempt, error.to_string()))
                    .await?;
            }
        }

        if !still_pending.is_empty() {
            warn!(
                attempt,
                remaining = still_pending.len(),
                "re-dispatching failed change records"
            );
        }
        pending = still_pending;
    }

    info!(
        applied = report.applied,
        recovered = report.recovered,
        dead_lettered = report.dead_lettered,
        "batch delivery finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dead_letter::MemoryDeadLetter;
    use crate::feed::FeedMaterializer;
    use crate::search::SearchSynchronizer;
    use conduit_domain::{Article, UserId};
    use conduit_grants::Component;
    use conduit_index::MemoryIndex;
    use conduit_store::{ArticleStore, ChangeLogSource, MemoryStore, SequenceNumber, StoreKey};
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct Harness {
        store: Arc<MemoryStore>,
        index: Arc<MemoryIndex>,
        dispatcher: ChangeDispatcher,
        dead_letter: MemoryDeadLetter,
    }

    fn harness() -> Harness {
        let store = MemoryStore::new();
        let index = Arc::new(MemoryIndex::new());
        let handle = store.handle(Component::FeedMaterializer);
        let feed = FeedMaterializer::new(Arc::new(handle.clone()), Arc::new(handle));
        let search = SearchSynchronizer::new(index.clone());
        Harness {
            store,
            index,
            dispatcher: ChangeDispatcher::new(feed, search),
            dead_letter: MemoryDeadLetter::new(),
        }
    }

    async fn seed_articles(h: &Harness, count: usize) -> Vec<ChangeRecord> {
        let writer = h.store.handle(Component::ArticleWriter);
        for i in 0..count {
            let article =
                Article::new(UserId::new(), format!("Retry Case {i}"), "d", "b", vec![])
                    .unwrap();
            writer.put_article(&article).await.unwrap();
        }
        h.store
            .handle(Component::ChangeDispatcher)
            .next_batch(count * 2)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn clean_batch_needs_one_attempt() {
        let h = harness();
        let batch = seed_articles(&h, 3).await;

        let report =
            run_with_retries(&h.dispatcher, &batch, RetryPolicy::default(), &h.dead_letter)
                .await
                .unwrap();

        assert_eq!(report.applied, batch.len());
        assert_eq!(report.recovered, 0);
        assert_eq!(report.dead_lettered, 0);
        assert!(h.dead_letter.is_empty());
        assert_eq!(h.index.live_count(), 3);
    }

    #[tokio::test]
    async fn transient_failure_recovers_on_retry() {
        let h = harness();
        let batch = seed_articles(&h, 2).await;
        h.index.inject_apply_failures(1);

        let report =
            run_with_retries(&h.dispatcher, &batch, RetryPolicy::default(), &h.dead_letter)
                .await
                .unwrap();

        assert_eq!(report.applied, batch.len());
        assert_eq!(report.recovered, 1);
        assert_eq!(report.dead_lettered, 0);
        assert_eq!(h.index.live_count(), 2);
    }

    #[tokio::test]
    async fn exhausted_item_escalates_with_attempt_count() {
        let h = harness();
        let batch = seed_articles(&h, 1).await;
        // Enough injected failures to outlast the budget
        h.index.inject_apply_failures(10);

        let policy = RetryPolicy::with_max_attempts(3);
        let report = run_with_retries(&h.dispatcher, &batch, policy, &h.dead_letter)
            .await
            .unwrap();

        // The guard row applied (it is dropped by the filter); the article
        // exhausted its three attempts.
        assert_eq!(report.dead_lettered, 1);
        let entries = h.dead_letter.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].attempts, 3);
        assert_eq!(h.index.live_count(), 0);
    }

    #[tokio::test]
    async fn malformed_record_escalates_without_retry() {
        let h = harness();
        let record = ChangeRecord::insert(
            StoreKey::article(conduit_domain::ArticleId::new()),
            serde_json::json!({"not": "an article"}),
            SequenceNumber(1),
        );

        let report = run_with_retries(
            &h.dispatcher,
            std::slice::from_ref(&record),
            RetryPolicy::default(),
            &h.dead_letter,
        )
        .await
        .unwrap();

        assert_eq!(report.dead_lettered, 1);
        let entries = h.dead_letter.entries();
        assert_eq!(entries[0].attempts, 1);
        assert!(entries[0].reason.contains("malformed"));
    }

    #[tokio::test]
    async fn only_failed_items_are_redispatched() {
        let h = harness();
        let batch = seed_articles(&h, 3).await;
        h.index.inject_apply_failures(1);

        run_with_retries(&h.dispatcher, &batch, RetryPolicy::default(), &h.dead_letter)
            .await
            .unwrap();

        // Each article was applied exactly once despite the retry pass
        assert_eq!(h.index.live_count(), 3);
        assert_eq!(h.index.apply_calls(), batch.len() / 2 + 1);
    }
}
