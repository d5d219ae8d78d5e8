//! Conduit Grants - static least-privilege access matrix
//!
//! Every component declares up front which collections it touches and how.
//! The table is derived mechanically from those declarations, loaded once per
//! process, and checked on every scoped store or index call. A component
//! reaching for an undeclared collection is a wiring bug and surfaces as
//! `GrantError::NotGranted` at startup or in integration tests, never as a
//! silent runtime behavior.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A component that reads or writes store collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// Change-log consumer that filters and routes article mutations
    ChangeDispatcher,
    /// Fan-out writer of derived feed rows
    FeedMaterializer,
    /// Mirror of article mutations into the search index
    SearchSynchronizer,
    /// Request-path handlers for the feed read surface
    FeedReader,
    /// Request-path handlers that own primary article rows
    ArticleWriter,
    /// Request-path handlers that own follow rows
    FollowWriter,
}

impl Component {
    /// All known components
    pub const ALL: [Component; 6] = [
        Component::ChangeDispatcher,
        Component::FeedMaterializer,
        Component::SearchSynchronizer,
        Component::FeedReader,
        Component::ArticleWriter,
        Component::FollowWriter,
    ];

    /// The accesses this component needs, derived from its declared
    /// dependencies rather than hand-maintained per call site
    #[must_use]
    pub fn declared_grants(self) -> &'static [Grant] {
        match self {
            Component::ChangeDispatcher => &[Grant {
                collection: Collection::Article,
                mode: AccessMode::StreamRead,
            }],
            Component::FeedMaterializer => &[
                Grant {
                    collection: Collection::Article,
                    mode: AccessMode::StreamRead,
                },
                Grant {
                    collection: Collection::Follow,
                    mode: AccessMode::Read,
                },
                Grant {
                    collection: Collection::Feed,
                    mode: AccessMode::Write,
                },
            ],
            Component::SearchSynchronizer => &[
                Grant {
                    collection: Collection::Article,
                    mode: AccessMode::StreamRead,
                },
                Grant {
                    collection: Collection::SearchIndex,
                    mode: AccessMode::Write,
                },
            ],
            Component::FeedReader => &[Grant {
                collection: Collection::Feed,
                mode: AccessMode::Read,
            }],
            Component::ArticleWriter => &[Grant {
                collection: Collection::Article,
                mode: AccessMode::ReadWrite,
            }],
            Component::FollowWriter => &[Grant {
                collection: Collection::Follow,
                mode: AccessMode::ReadWrite,
            }],
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Component::ChangeDispatcher => "change-dispatcher",
            Component::FeedMaterializer => "feed-materializer",
            Component::SearchSynchronizer => "search-synchronizer",
            Component::FeedReader => "feed-reader",
            Component::ArticleWriter => "article-writer",
            Component::FollowWriter => "follow-writer",
        };
        write!(f, "{name}")
    }
}

/// A store collection or external sink that access is granted to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    User,
    Article,
    Follow,
    Favorite,
    Comment,
    Feed,
    SearchIndex,
}

/// How a component is allowed to touch a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMode {
    /// Point reads and queries
    Read,
    /// Point writes and deletes
    Write,
    /// Both
    ReadWrite,
    /// Consuming the collection's ordered change log
    StreamRead,
}

impl AccessMode {
    /// Whether a grant of `self` satisfies a request for `requested`
    ///
    /// `ReadWrite` covers `Read` and `Write`; `StreamRead` is distinct and
    /// only satisfied by itself.
    #[inline]
    #[must_use]
    pub fn satisfies(self, requested: AccessMode) -> bool {
        match (self, requested) {
            (a, b) if a == b => true,
            (AccessMode::ReadWrite, AccessMode::Read | AccessMode::Write) => true,
            _ => false,
        }
    }
}

/// A single cell of the access matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grant {
    pub collection: Collection,
    pub mode: AccessMode,
}

/// Access denied or table misconfigured
#[derive(Debug, Clone, thiserror::Error)]
pub enum GrantError {
    /// The component never declared this access
    #[error("{component} is not granted {mode:?} on {collection:?}")]
    NotGranted {
        component: Component,
        collection: Collection,
        mode: AccessMode,
    },
}

/// The process-wide access matrix, derived from component declarations
#[derive(Debug)]
pub struct GrantTable {
    entries: Vec<(Component, Grant)>,
}

impl GrantTable {
    /// Build the table from every component's declaration
    #[must_use]
    pub fn builtin() -> Self {
        let entries = Component::ALL
            .iter()
            .flat_map(|component| {
                component
                    .declared_grants()
                    .iter()
                    .map(|grant| (*component, *grant))
            })
            .collect();
        Self { entries }
    }

    /// The shared table, loaded once at process start
    #[must_use]
    pub fn global() -> &'static GrantTable {
        static TABLE: Lazy<GrantTable> = Lazy::new(GrantTable::builtin);
        &TABLE
    }

    /// Check a single access against the matrix
    ///
    /// # Errors
    /// `GrantError::NotGranted` when no declared grant satisfies the request.
    pub fn check(
        &self,
        component: Component,
        collection: Collection,
        mode: AccessMode,
    ) -> Result<(), GrantError> {
        let granted = self.entries.iter().any(|(c, grant)| {
            *c == component && grant.collection == collection && grant.mode.satisfies(mode)
        });
        if granted {
            Ok(())
        } else {
            Err(GrantError::NotGranted {
                component,
                collection,
                mode,
            })
        }
    }

    /// All grants held by one component
    #[must_use]
    pub fn grants_for(&self, component: Component) -> Vec<Grant> {
        self.entries
            .iter()
            .filter(|(c, _)| *c == component)
            .map(|(_, grant)| *grant)
            .collect()
    }
}
