//! Pipeline error taxonomy
//!
//! Expected conditions (no followers, stale index version) are not errors and
//! never reach this type. What remains is either retryable or a record that
//! cannot be interpreted at all.

use crate::dead_letter::DeadLetterError;
use conduit_index::IndexError;
use conduit_store::StoreError;

/// Failures while processing a change record
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Store read/write failed
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Index write failed (stale conflicts are filtered before this point)
    #[error("index failure: {0}")]
    Index(#[from] IndexError),

    /// A record that passed the dispatcher's filters but cannot be decoded
    #[error("malformed change record at sequence {sequence}: {reason}")]
    MalformedRecord { sequence: u64, reason: String },

    /// The terminal sink itself refused an escalated record
    #[error(transparent)]
    DeadLetter(#[from] DeadLetterError),
}

impl PipelineError {
    /// Whether the failed item should be retried rather than escalated
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_transient(),
            Self::Index(e) => e.is_transient(),
            Self::MalformedRecord { .. } | Self::DeadLetter(_) => false,
        }
    }
}
