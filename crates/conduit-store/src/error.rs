//! Store error taxonomy
//!
//! Transient failures are the only retryable class; everything else is a
//! caller bug or an expected domain condition.

use conduit_grants::GrantError;

/// Failures surfaced by store implementations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Store unavailable or throttled; safe to retry
    #[error("transient store failure: {0}")]
    Transient(String),

    /// Slug already claimed by another article
    #[error("slug {0:?} already taken")]
    DuplicateSlug(String),

    /// Row not found where one was required
    #[error("not found: {0}")]
    NotFound(String),

    /// Access outside the component's declared grants
    #[error(transparent)]
    Grant(#[from] GrantError),

    /// Pagination cursor failed to decode
    #[error("invalid page cursor: {0}")]
    Cursor(String),

    /// Row snapshot failed to serialize or deserialize
    #[error("snapshot codec failure: {0}")]
    Codec(String),
}

impl StoreError {
    /// Whether the operation may be retried as-is
    #[inline]
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(StoreError::Transient("throttled".into()).is_transient());
        assert!(!StoreError::DuplicateSlug("a-slug".into()).is_transient());
        assert!(!StoreError::Cursor("bad".into()).is_transient());
    }
}
