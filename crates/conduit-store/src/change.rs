//! Change-log records
//!
//! The store appends one record per row-level mutation, in commit order per
//! key shard. Auxiliary slug guard rows live in the same collection and show
//! up in the same log; consumers filter them by key pattern.

use conduit_domain::ArticleId;
use serde::{Deserialize, Serialize};

/// Key prefix of the synthetic rows that guard slug uniqueness
pub const SLUG_GUARD_PREFIX: &str = "slug#";

/// Monotonically increasing mutation counter, assigned per collection
///
/// Doubles as the external document version at the search sink: later
/// mutations of the same row always carry a larger sequence number.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SequenceNumber(pub u64);

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Primary key of a row in the article collection
///
/// Genuine article rows are keyed by the article id; slug guard rows are
/// keyed `slug#{slug}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreKey(String);

impl StoreKey {
    /// Key of a genuine article row
    #[must_use]
    pub fn article(id: ArticleId) -> Self {
        Self(id.to_string())
    }

    /// Key of the synthetic row claiming a slug
    #[must_use]
    pub fn slug_guard(slug: &str) -> Self {
        Self(format!("{SLUG_GUARD_PREFIX}{slug}"))
    }

    /// Whether this key names a slug guard row rather than a domain row
    #[inline]
    #[must_use]
    pub fn is_slug_guard(&self) -> bool {
        self.0.starts_with(SLUG_GUARD_PREFIX)
    }

    /// Parse the article id out of a genuine article key
    #[must_use]
    pub fn as_article_id(&self) -> Option<ArticleId> {
        if self.is_slug_guard() {
            return None;
        }
        ArticleId::parse(&self.0).ok()
    }

    /// Raw key string
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Row-level mutation kind
///
/// Closed set with exhaustive matching; there is no "unrecognized kind" case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChangeKind {
    Insert,
    Modify,
    Remove,
}

/// One entry of the article collection's change log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub kind: ChangeKind,
    /// Key before the mutation; absent on insert
    pub key_before: Option<StoreKey>,
    /// Key after the mutation; absent on remove
    pub key_after: Option<StoreKey>,
    /// Row snapshot before the mutation; absent on insert
    pub before: Option<serde_json::Value>,
    /// Row snapshot after the mutation; absent on remove
    pub after: Option<serde_json::Value>,
    pub sequence: SequenceNumber,
}

impl ChangeRecord {
    /// Record an insert
    #[must_use]
    pub fn insert(key: StoreKey, after: serde_json::Value, sequence: SequenceNumber) -> Self {
        Self {
            kind: ChangeKind::Insert,
            key_before: None,
            key_after: Some(key),
            before: None,
            after: Some(after),
            sequence,
        }
    }

    /// Record a modify
    #[must_use]
    pub fn modify(
        key: StoreKey,
        before: serde_json::Value,
        after: serde_json::Value,
        sequence: SequenceNumber,
    ) -> Self {
        Self {
            kind: ChangeKind::Modify,
            key_before: Some(key.clone()),
            key_after: Some(key),
            before: Some(before),
            after: Some(after),
            sequence,
        }
    }

    /// Record a remove
    #[must_use]
    pub fn remove(key: StoreKey, before: serde_json::Value, sequence: SequenceNumber) -> Self {
        Self {
            kind: ChangeKind::Remove,
            key_before: Some(key),
            key_after: None,
            before: Some(before),
            after: None,
            sequence,
        }
    }

    /// The key this record is about, whichever side carries it
    #[must_use]
    pub fn key(&self) -> Option<&StoreKey> {
        self.key_after.as_ref().or(self.key_before.as_ref())
    }

    /// The row snapshot relevant to the mutation kind
    #[must_use]
    pub fn snapshot(&self) -> Option<&serde_json::Value> {
        match self.kind {
            ChangeKind::Insert | ChangeKind::Modify => self.after.as_ref(),
            ChangeKind::Remove => self.before.as_ref(),
        }
    }
}
