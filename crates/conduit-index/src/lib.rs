//! Conduit Index - search-index capability interface
//!
//! The search engine is an external system; this crate defines the write
//! surface the pipeline produces to. Writes carry an external version and the
//! sink only accepts a write whose version strictly exceeds the stored one.
//! That comparison, not source ordering, is what makes out-of-order delivery
//! safe: the last writer wins at the sink.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// What to do with the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexAction {
    Upsert,
    Delete,
}

/// One versioned write against the index
///
/// `fields` is the projection the query surface owns; this core only passes
/// it through. Required on upsert, ignored on delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexWrite {
    pub doc_id: String,
    /// External version; must strictly exceed the stored version to apply
    pub version: u64,
    pub action: IndexAction,
    pub fields: Option<serde_json::Value>,
}

/// Index sink failures
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The stored version is equal or newer; a stale write lost the race.
    /// Callers treat this as success: a newer state already won.
    #[error("version conflict on {doc_id}: stored {stored}, got {got}")]
    VersionConflict {
        doc_id: String,
        stored: u64,
        got: u64,
    },

    /// Upsert without document fields
    #[error("upsert of {0} carries no fields")]
    MissingFields(String),

    /// Index unavailable; safe to retry
    #[error("transient index failure: {0}")]
    Transient(String),
}

impl IndexError {
    /// Whether the write may be retried as-is
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the failure means a newer write already won
    #[inline]
    #[must_use]
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}

/// Write capability over the search index
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Apply one versioned write
    async fn apply(&self, write: IndexWrite) -> Result<(), IndexError>;
}

/// Stored state of one document slot
#[derive(Debug, Clone)]
enum Slot {
    Live {
        version: u64,
        fields: serde_json::Value,
    },
    /// Deleted documents keep their version so a stale upsert arriving after
    /// a newer delete is still rejected
    Tombstone { version: u64 },
}

impl Slot {
    fn version(&self) -> u64 {
        match self {
            Slot::Live { version, .. } | Slot::Tombstone { version } => *version,
        }
    }
}

/// In-memory versioned index for the worker demo and tests
#[derive(Debug, Default)]
pub struct MemoryIndex {
    docs: DashMap<String, Slot>,
    /// Injected transient failures, consumed one per apply
    apply_failures: AtomicUsize,
    apply_calls: AtomicUsize,
}

impl MemoryIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` applies with a transient error
    pub fn inject_apply_failures(&self, n: usize) {
        self.apply_failures.store(n, Ordering::SeqCst);
    }

    /// Current fields of a live document
    #[must_use]
    pub fn document(&self, doc_id: &str) -> Option<serde_json::Value> {
        match self.docs.get(doc_id).map(|slot| slot.clone()) {
            Some(Slot::Live { fields, .. }) => Some(fields),
            _ => None,
        }
    }

    /// Current stored version, live or tombstoned
    #[must_use]
    pub fn version(&self, doc_id: &str) -> Option<u64> {
        self.docs.get(doc_id).map(|slot| slot.version())
    }

    /// Total applies attempted, injected failures included
    #[must_use]
    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// Number of live documents
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.docs
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Live { .. }))
            .count()
    }
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn apply(&self, write: IndexWrite) -> Result<(), IndexError> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        if self
            .apply_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(IndexError::Transient("index unavailable".into()));
        }

        let mut slot = self.docs.entry(write.doc_id.clone()).or_insert(Slot::Tombstone { version: 0 });
        let stored = slot.version();
        if write.version <= stored {
            return Err(IndexError::VersionConflict {
                doc_id: write.doc_id,
                stored,
                got: write.version,
            });
        }

        match write.action {
            IndexAction::Upsert => {
                let fields = write
                    .fields
                    .ok_or_else(|| IndexError::MissingFields(write.doc_id.clone()))?;
                *slot = Slot::Live {
                    version: write.version,
                    fields,
                };
            }
            IndexAction::Delete => {
                *slot = Slot::Tombstone {
                    version: write.version,
                };
            }
        }
        debug!(doc_id = %write.doc_id, version = write.version, "applied index write");
        Ok(())
    }
}
